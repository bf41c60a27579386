//! # Cryptographic Primitives
//!
//! Hashing and signatures for transactions and contract state. Boring,
//! well-audited choices only:
//!
//! - **SHA-256** for transaction ids and signing digests.
//! - **BLAKE3** for contract addresses and state roots (keyed derive mode
//!   gives us domain separation for free).
//! - **Ed25519** for input signatures. The signature is checked against a
//!   public key; nothing is ever re-derived from a private key at verify
//!   time.
//!
//! Everything here is a thin wrapper over `sha2`, `blake3` and
//! `ed25519-dalek`. Nothing in this module touches the clock, the disk or
//! global state.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{blake3_hash, domain_separated_hash, merkle_root, sha256, sha256_array};
pub use keys::{Keypair, PublicKey, Signature};
pub use signatures::{sign, verify};
