//! # Digital Signatures
//!
//! `sign(keypair, digest)` and `verify(public_key, digest, signature)` over
//! transaction digests. Every input of a transaction signs the same 32-byte
//! SHA-256 digest of its canonical encoding; verification always goes
//! through the owner's *public* key.
//!
//! Strict Ed25519 verification from `ed25519-dalek` is used throughout.

use super::keys::{Keypair, PublicKey, Signature};

/// Sign a digest. Deterministic: same key and digest, same signature.
///
/// # Example
///
/// ```
/// use strat_protocol::crypto::{sha256_array, sign, verify, Keypair};
///
/// let keypair = Keypair::generate();
/// let digest = sha256_array(b"canonical transaction bytes");
/// let signature = sign(&keypair, &digest);
///
/// assert!(verify(&keypair.public_key(), &digest, &signature));
/// ```
pub fn sign(keypair: &Keypair, digest: &[u8]) -> Signature {
    keypair.sign(digest)
}

/// Verify a signature over `digest` against `public_key`.
pub fn verify(public_key: &PublicKey, digest: &[u8], signature: &Signature) -> bool {
    public_key.verify(digest, signature)
}
