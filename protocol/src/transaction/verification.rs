//! Verification of finalized transactions received from outside.
//!
//! [`verify_transaction`] runs the checks cheapest first:
//!
//! 1. **Structure**: the same rules `validate()` enforces on drafts.
//! 2. **Id**: the stored id must equal the recomputed one.
//! 3. **Signatures**: every input must carry a signature that verifies
//!    over the transaction digest against the public key of whoever owns
//!    the spent output.
//!
//! Ownership lives outside this crate. The caller supplies it as a lookup
//! from input to public key, typically backed by its identity store or UTXO
//! index. An input whose owner is unknown fails verification.

use super::builder::Transaction;
use super::error::TransactionError;
use super::types::Input;
use crate::crypto::keys::{PublicKey, Signature};
use crate::crypto::signatures::verify;

/// Verifies id integrity, structure and per-input signatures.
///
/// `owner_key` maps an input to the public key allowed to spend the output
/// it references.
///
/// # Errors
///
/// Returns the first failing check. Signature failures name the offending
/// input index.
pub fn verify_transaction<F>(tx: &Transaction, owner_key: F) -> Result<(), TransactionError>
where
    F: Fn(&Input) -> Option<PublicKey>,
{
    let report = tx.validate();
    if !report.valid {
        return Err(TransactionError::Validation {
            errors: report.errors,
        });
    }

    verify_id(tx)?;

    let digest = tx.digest()?;

    for (index, input) in tx.inputs().iter().enumerate() {
        let sig_hex = input
            .signature
            .as_deref()
            .ok_or(TransactionError::MissingSignature { index })?;

        let signature =
            Signature::from_hex(sig_hex).map_err(|e| TransactionError::MalformedSignature {
                index,
                reason: e.to_string(),
            })?;

        let public_key = owner_key(input).ok_or_else(|| TransactionError::UnknownOwner {
            index,
            source_tx_id: input.source_tx_id.clone(),
            output_index: input.output_index,
        })?;

        if !verify(&public_key, &digest, &signature) {
            tracing::debug!(tx = %tx.id(), index, "input signature rejected");
            return Err(TransactionError::InvalidSignature { index });
        }
    }

    Ok(())
}

/// Checks only that the stored id matches the transaction's content.
pub fn verify_id(tx: &Transaction) -> Result<(), TransactionError> {
    let expected = tx.compute_id()?;
    if tx.id() != expected {
        return Err(TransactionError::IdMismatch {
            expected,
            actual: tx.id().to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::Keypair;
    use crate::transaction::builder::TransactionBuilder;

    fn alice() -> Keypair {
        Keypair::from_seed(&[1u8; 32])
    }

    fn signed_by(kp: &Keypair) -> Transaction {
        TransactionBuilder::new()
            .set_timestamp(1_700_000_000_000)
            .add_input("aa", 0, 60)
            .add_input("bb", 1, 50)
            .add_output("B", 80)
            .unwrap()
            .add_output("A", 29)
            .unwrap()
            .set_fee(1)
            .unwrap()
            .sign(kp, None)
            .unwrap()
            .finalize()
            .unwrap()
    }

    fn tamper(tx: &Transaction, f: impl FnOnce(&mut serde_json::Value)) -> Transaction {
        let mut value = serde_json::to_value(tx).unwrap();
        f(&mut value);
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn valid_transaction_passes() {
        let kp = alice();
        let tx = signed_by(&kp);
        let pk = kp.public_key();
        assert!(verify_transaction(&tx, |_| Some(pk)).is_ok());
    }

    #[test]
    fn tampered_amount_breaks_id() {
        let kp = alice();
        let tx = tamper(&signed_by(&kp), |v| v["outputs"][0]["amount"] = 79.into());
        let pk = kp.public_key();
        assert!(matches!(
            verify_transaction(&tx, |_| Some(pk)),
            Err(TransactionError::IdMismatch { .. })
        ));
    }

    #[test]
    fn tampered_amount_with_recomputed_id_breaks_signature() {
        let kp = alice();
        let original = signed_by(&kp);
        let forged = tamper(&original, |v| v["outputs"][0]["amount"] = 79.into());
        let forged_id = forged.compute_id().unwrap();
        let forged = tamper(&forged, |v| v["id"] = forged_id.into());

        let pk = kp.public_key();
        assert!(matches!(
            verify_transaction(&forged, |_| Some(pk)),
            Err(TransactionError::InvalidSignature { index: 0 })
        ));
    }

    #[test]
    fn wrong_owner_rejected() {
        let tx = signed_by(&alice());
        let mallory = Keypair::from_seed(&[9u8; 32]).public_key();
        assert!(matches!(
            verify_transaction(&tx, |_| Some(mallory)),
            Err(TransactionError::InvalidSignature { index: 0 })
        ));
    }

    #[test]
    fn each_input_checked_against_its_own_owner() {
        let kp = alice();
        let tx = signed_by(&kp);
        let pk = kp.public_key();
        let mallory = Keypair::from_seed(&[9u8; 32]).public_key();
        let result = verify_transaction(&tx, |input| {
            if input.source_tx_id == "bb" {
                Some(mallory)
            } else {
                Some(pk)
            }
        });
        assert!(matches!(
            result,
            Err(TransactionError::InvalidSignature { index: 1 })
        ));
    }

    #[test]
    fn unknown_owner_rejected() {
        let tx = signed_by(&alice());
        assert!(matches!(
            verify_transaction(&tx, |_| None),
            Err(TransactionError::UnknownOwner { index: 0, .. })
        ));
    }

    #[test]
    fn unsigned_input_rejected() {
        let kp = alice();
        let tx = TransactionBuilder::new()
            .add_input("aa", 0, 10)
            .add_input("bb", 0, 10)
            .add_output("B", 5)
            .unwrap()
            .sign(&kp, Some(0))
            .unwrap()
            .finalize()
            .unwrap();
        let pk = kp.public_key();
        assert!(matches!(
            verify_transaction(&tx, |_| Some(pk)),
            Err(TransactionError::MissingSignature { index: 1 })
        ));
    }

    #[test]
    fn malformed_signature_rejected() {
        let kp = alice();
        let tx = tamper(&signed_by(&kp), |v| {
            v["inputs"][0]["signature"] = "zz-not-hex".into()
        });
        let pk = kp.public_key();
        assert!(matches!(
            verify_transaction(&tx, |_| Some(pk)),
            Err(TransactionError::MalformedSignature { index: 0, .. })
        ));
    }

    #[test]
    fn structurally_invalid_transaction_rejected() {
        let kp = alice();
        let tx = tamper(&signed_by(&kp), |v| {
            v["outputs"][0]["amount"] = 500.into();
        });
        let fixed_id = tx.compute_id().unwrap();
        let tx = tamper(&tx, |v| v["id"] = fixed_id.into());
        let pk = kp.public_key();
        assert!(matches!(
            verify_transaction(&tx, |_| Some(pk)),
            Err(TransactionError::Validation { .. })
        ));
    }

    #[test]
    fn received_outputs_checked_like_drafts() {
        let kp = alice();
        let tx = tamper(&signed_by(&kp), |v| {
            v["outputs"][0]["address"] = "0x0".into();
            v["outputs"][1]["amount"] = 0.into();
        });
        let fixed_id = tx.compute_id().unwrap();
        let tx = tamper(&tx, |v| v["id"] = fixed_id.into());

        let report = tx.validate();
        assert!(!report.valid);
        assert_eq!(
            report
                .errors
                .iter()
                .filter_map(|issue| match issue {
                    crate::transaction::ValidationIssue::InvalidOutput { index, .. } => Some(*index),
                    _ => None,
                })
                .collect::<Vec<_>>(),
            vec![0, 1]
        );

        let pk = kp.public_key();
        assert!(matches!(
            verify_transaction(&tx, |_| Some(pk)),
            Err(TransactionError::Validation { .. })
        ));
    }
}
