//! End-to-end tests for the transaction pipeline.
//!
//! Pool → selection → builder → signing → finalize → wire JSON → verify,
//! plus the ledger-level properties every participant relies on: ids are
//! reproducible across machines, value is conserved, and state checkpoints
//! undo exactly.

use std::collections::HashMap;

use serde_json::json;

use strat_protocol::crypto::{Keypair, PublicKey};
use strat_protocol::storage::{StateStore, StateView};
use strat_protocol::transaction::{
    create_transfer, verify_transaction, Transaction, TransactionBuilder, TransactionError,
    Utxo, ValidationIssue,
};
use strat_protocol::utxo::{largest_first, owned_by, select_utxos};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Identity collaborator stand-in: address → public key, plus the UTXO set
/// so an input can be mapped back to the address that owns it.
struct Ledger {
    keys: HashMap<String, PublicKey>,
    utxos: Vec<Utxo>,
}

impl Ledger {
    fn owner_key(&self, input: &strat_protocol::transaction::Input) -> Option<PublicKey> {
        self.utxos
            .iter()
            .find(|u| u.tx_id == input.source_tx_id && u.index == input.output_index)
            .and_then(|u| self.keys.get(&u.address).copied())
    }
}

fn alice() -> Keypair {
    Keypair::from_seed(&[0xA1; 32])
}

fn bob() -> Keypair {
    Keypair::from_seed(&[0xB0; 32])
}

fn ledger() -> Ledger {
    Ledger {
        keys: HashMap::from([
            ("A".to_string(), alice().public_key()),
            ("B".to_string(), bob().public_key()),
        ]),
        utxos: vec![
            Utxo::new("genesis", 0, "A", 60),
            Utxo::new("genesis", 1, "A", 50),
            Utxo::new("genesis", 2, "B", 500),
        ],
    }
}

// ---------------------------------------------------------------------------
// Transfer lifecycle
// ---------------------------------------------------------------------------

#[test]
fn transfer_roundtrips_through_wire_and_verifies() {
    let ledger = ledger();
    let pool = owned_by(&ledger.utxos, "A");
    let tx = create_transfer("A", "B", 80, &pool, &alice(), Some(1)).unwrap();

    assert_eq!(tx.inputs().len(), 2);
    assert_eq!(tx.outputs()[0].amount, 80);
    assert_eq!(tx.outputs()[1].address, "A");
    assert_eq!(tx.outputs()[1].amount, 29);

    let wire = tx.to_json().unwrap();
    let received = Transaction::from_json(&wire).unwrap();
    assert_eq!(received, tx);
    assert!(verify_transaction(&received, |i| ledger.owner_key(i)).is_ok());
}

#[test]
fn spending_someone_elses_output_fails_verification() {
    let ledger = ledger();
    // Alice tries to spend Bob's output with her own key.
    let tx = create_transfer("A", "C", 100, &owned_by(&ledger.utxos, "B"), &alice(), None)
        .unwrap();

    assert!(matches!(
        verify_transaction(&tx, |i| ledger.owner_key(i)),
        Err(TransactionError::InvalidSignature { index: 0 })
    ));
}

#[test]
fn unknown_output_has_no_owner() {
    let ledger = ledger();
    let pool = vec![Utxo::new("nowhere", 7, "A", 100)];
    let tx = create_transfer("A", "B", 10, &pool, &alice(), None).unwrap();

    assert!(matches!(
        verify_transaction(&tx, |i| ledger.owner_key(i)),
        Err(TransactionError::UnknownOwner { output_index: 7, .. })
    ));
}

#[test]
fn insufficient_pool_reports_shortfall() {
    let pool = vec![Utxo::new("t1", 0, "A", 10), Utxo::new("t2", 0, "A", 10)];
    match create_transfer("A", "B", 50, &pool, &alice(), Some(0)) {
        Err(TransactionError::InsufficientFunds {
            available,
            required,
        }) => assert_eq!((available, required), (20, 50)),
        other => panic!("expected InsufficientFunds, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Ledger properties
// ---------------------------------------------------------------------------

#[test]
fn identical_drafts_hash_identically() {
    let build = || {
        TransactionBuilder::new()
            .set_timestamp(1_760_000_000_000)
            .add_input("t1", 0, 60)
            .add_output("B", 59)
            .unwrap()
            .set_fee(1)
            .unwrap()
            .set_payload(json!({"memo": "rent", "period": {"month": 10, "year": 2026}}))
            .finalize()
            .unwrap()
    };

    let a = build();
    let b = build();
    assert_eq!(a.id(), b.id());
    assert_eq!(a.canonical_bytes().unwrap(), b.canonical_bytes().unwrap());
}

#[test]
fn finalized_transactions_conserve_value() {
    let pool = largest_first(&ledger().utxos);
    for amount in [1u64, 49, 80, 109, 300, 599] {
        let selection = select_utxos(&pool, amount, 1).unwrap();
        let tx = create_transfer("A", "B", amount, &pool, &alice(), Some(1)).unwrap();

        let inputs = tx.input_total().unwrap();
        let outputs = tx.output_total().unwrap();
        assert!(inputs >= outputs + tx.fee());
        assert_eq!(inputs, selection.total);
        assert_eq!(inputs - outputs - tx.fee(), 0, "change must return to sender");
    }
}

#[test]
fn invalid_draft_lists_every_problem() {
    let report = TransactionBuilder::new()
        .add_input("t1", 0, 5)
        .add_input("t1", 0, 5)
        .add_output("B", 20)
        .unwrap()
        .validate();

    assert!(!report.valid);
    assert_eq!(report.errors.len(), 2);
    assert!(report.errors.contains(&ValidationIssue::InsufficientInputs {
        inputs: 10,
        required: 20
    }));
    assert!(matches!(
        report.errors[0],
        ValidationIssue::DuplicateInput { output_index: 0, .. }
    ));
}

#[test]
fn checkpoint_rollback_restores_prior_state() {
    let store = StateStore::new();
    store.put("c1", "balance:X", json!(100)).unwrap();
    let root = store.root_hash().unwrap();

    let mut cp = store.checkpoint("c1").unwrap();
    cp.put("balance:X", json!(60)).unwrap();
    cp.put("balance:Y", json!(40)).unwrap();
    store.rollback(cp);

    assert_eq!(store.get("c1", "balance:X"), Some(json!(100)));
    assert_eq!(store.get("c1", "balance:Y"), None);
    assert_eq!(store.root_hash().unwrap(), root);
}
