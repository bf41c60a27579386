//! # Canonical Codec
//!
//! Deterministic byte encoding for everything that gets hashed or signed.
//! Two logically equal values always produce identical bytes, no matter how
//! they were constructed:
//!
//! - Integers are fixed-width 8-byte little-endian. No floats, ever.
//! - Strings and byte slices are `u32` length-prefixed.
//! - JSON objects are written with keys sorted bytewise, so insertion order
//!   never leaks into a transaction id.
//! - Every JSON value carries a one-byte type tag so `"1"` and `1` differ.
//!
//! JSON/serde output is intentionally not used for hashing: field order and
//! number formatting are not guaranteed across serializers.

use serde_json::Value;
use thiserror::Error;

use crate::transaction::types::{Input, Output, TransactionKind};

/// Errors raised while producing canonical bytes.
///
/// These are caller bugs (the payload has a shape we refuse to hash), so
/// they are surfaced and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// A JSON number that is not representable as a 64-bit integer.
    #[error("unsupported number in canonical payload: {0} (only 64-bit integers are allowed)")]
    UnsupportedNumber(String),

    /// A string, byte slice or collection longer than `u32::MAX`.
    #[error("value too long for canonical encoding: {0} elements")]
    LengthOverflow(usize),
}

// Type tags for JSON values.
const TAG_NULL: u8 = 0x00;
const TAG_FALSE: u8 = 0x01;
const TAG_TRUE: u8 = 0x02;
const TAG_UINT: u8 = 0x03;
const TAG_INT: u8 = 0x04;
const TAG_STRING: u8 = 0x05;
const TAG_ARRAY: u8 = 0x06;
const TAG_OBJECT: u8 = 0x07;

// Presence flags for optional fields.
const ABSENT: u8 = 0x00;
const PRESENT: u8 = 0x01;

/// Append-only canonical byte writer.
#[derive(Debug, Default, Clone)]
pub struct CanonicalEncoder {
    buf: Vec<u8>,
}

impl CanonicalEncoder {
    /// Creates an empty encoder.
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(256),
        }
    }

    pub fn put_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn put_u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn put_i64(&mut self, value: i64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Writes a `u32` little-endian length prefix.
    pub fn put_len(&mut self, len: usize) -> Result<&mut Self, EncodingError> {
        let len32 = u32::try_from(len).map_err(|_| EncodingError::LengthOverflow(len))?;
        self.buf.extend_from_slice(&len32.to_le_bytes());
        Ok(self)
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self, EncodingError> {
        self.put_len(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(self)
    }

    pub fn put_str(&mut self, s: &str) -> Result<&mut Self, EncodingError> {
        self.put_bytes(s.as_bytes())
    }

    /// Writes a JSON value with sorted object keys and tagged integers.
    pub fn put_value(&mut self, value: &Value) -> Result<&mut Self, EncodingError> {
        match value {
            Value::Null => {
                self.put_u8(TAG_NULL);
            }
            Value::Bool(false) => {
                self.put_u8(TAG_FALSE);
            }
            Value::Bool(true) => {
                self.put_u8(TAG_TRUE);
            }
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    self.put_u8(TAG_UINT).put_u64(u);
                } else if let Some(i) = n.as_i64() {
                    self.put_u8(TAG_INT).put_i64(i);
                } else {
                    return Err(EncodingError::UnsupportedNumber(n.to_string()));
                }
            }
            Value::String(s) => {
                self.put_u8(TAG_STRING).put_str(s)?;
            }
            Value::Array(items) => {
                self.put_u8(TAG_ARRAY).put_len(items.len())?;
                for item in items {
                    self.put_value(item)?;
                }
            }
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort_unstable_by(|a, b| a.as_bytes().cmp(b.as_bytes()));

                self.put_u8(TAG_OBJECT).put_len(keys.len())?;
                for key in keys {
                    self.put_str(key)?;
                    // The key came from this map, so the lookup cannot miss.
                    if let Some(v) = map.get(key) {
                        self.put_value(v)?;
                    }
                }
            }
        }
        Ok(self)
    }

    /// Writes an optional JSON value behind a presence flag.
    pub fn put_optional_value(&mut self, value: Option<&Value>) -> Result<&mut Self, EncodingError> {
        match value {
            Some(v) => {
                self.put_u8(PRESENT).put_value(v)?;
            }
            None => {
                self.put_u8(ABSENT);
            }
        }
        Ok(self)
    }

    /// Consumes the encoder and returns the bytes.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Canonical bytes of a single JSON value.
pub fn encode_value(value: &Value) -> Result<Vec<u8>, EncodingError> {
    let mut enc = CanonicalEncoder::new();
    enc.put_value(value)?;
    Ok(enc.finish())
}

/// Canonical bytes of a transaction's hashed fields.
///
/// Field order is fixed: kind, inputs, outputs, payload, fee, timestamp.
/// Input signatures and the id itself are never part of the encoding.
pub fn encode_transaction(
    kind: TransactionKind,
    inputs: &[Input],
    outputs: &[Output],
    payload: Option<&Value>,
    fee: u64,
    timestamp: u64,
) -> Result<Vec<u8>, EncodingError> {
    let mut enc = CanonicalEncoder::new();

    enc.put_str(kind.as_str())?;

    enc.put_len(inputs.len())?;
    for input in inputs {
        enc.put_str(&input.source_tx_id)?
            .put_u64(u64::from(input.output_index))
            .put_u64(input.amount);
    }

    enc.put_len(outputs.len())?;
    for output in outputs {
        enc.put_str(&output.address)?.put_u64(output.amount);
    }

    enc.put_optional_value(payload)?;
    enc.put_u64(fee).put_u64(timestamp);

    Ok(enc.finish())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    #[test]
    fn object_key_order_does_not_matter() {
        let mut a = Map::new();
        a.insert("method".into(), json!("transfer"));
        a.insert("amount".into(), json!(40));
        a.insert("to".into(), json!("Y"));

        let mut b = Map::new();
        b.insert("to".into(), json!("Y"));
        b.insert("amount".into(), json!(40));
        b.insert("method".into(), json!("transfer"));

        assert_eq!(
            encode_value(&Value::Object(a)).unwrap(),
            encode_value(&Value::Object(b)).unwrap()
        );
    }

    #[test]
    fn nested_objects_are_sorted_too() {
        let a = json!({"outer": {"z": 1, "a": [ {"y": 2, "b": 3} ]}});
        let b = json!({"outer": {"a": [ {"b": 3, "y": 2} ], "z": 1}});
        assert_eq!(encode_value(&a).unwrap(), encode_value(&b).unwrap());
    }

    #[test]
    fn floats_are_rejected() {
        let err = encode_value(&json!({"amount": 1.5})).unwrap_err();
        assert!(matches!(err, EncodingError::UnsupportedNumber(_)));
    }

    #[test]
    fn type_tags_keep_string_and_number_apart() {
        assert_ne!(
            encode_value(&json!("1")).unwrap(),
            encode_value(&json!(1)).unwrap()
        );
        assert_ne!(
            encode_value(&json!(null)).unwrap(),
            encode_value(&json!(false)).unwrap()
        );
    }

    #[test]
    fn negative_integers_are_fixed_width() {
        let bytes = encode_value(&json!(-5)).unwrap();
        assert_eq!(bytes.len(), 1 + 8);
        assert_eq!(bytes[0], TAG_INT);
    }

    #[test]
    fn length_prefix_prevents_concatenation_ambiguity() {
        let a = encode_value(&json!(["ab", "c"])).unwrap();
        let b = encode_value(&json!(["a", "bc"])).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn transaction_encoding_depends_on_every_field() {
        let inputs = vec![Input::new("aa", 0, 60)];
        let outputs = vec![Output::new("B", 59)];
        let base = encode_transaction(TransactionKind::Standard, &inputs, &outputs, None, 1, 7)
            .unwrap();

        let other_fee =
            encode_transaction(TransactionKind::Standard, &inputs, &outputs, None, 2, 7).unwrap();
        let other_kind =
            encode_transaction(TransactionKind::ContractCall, &inputs, &outputs, None, 1, 7)
                .unwrap();
        let with_payload = encode_transaction(
            TransactionKind::Standard,
            &inputs,
            &outputs,
            Some(&json!(null)),
            1,
            7,
        )
        .unwrap();

        assert_ne!(base, other_fee);
        assert_ne!(base, other_kind);
        assert_ne!(base, with_payload);
    }

    #[test]
    fn signatures_are_not_encoded() {
        let mut signed = Input::new("aa", 0, 60);
        signed.signature = Some("ff".repeat(64));
        let unsigned = Input::new("aa", 0, 60);
        let outputs = vec![Output::new("B", 59)];

        let a = encode_transaction(TransactionKind::Standard, &[signed], &outputs, None, 1, 7)
            .unwrap();
        let b = encode_transaction(TransactionKind::Standard, &[unsigned], &outputs, None, 1, 7)
            .unwrap();
        assert_eq!(a, b);
    }
}
