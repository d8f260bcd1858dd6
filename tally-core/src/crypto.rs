//! Cryptographic operations for the ledger
//!
//! This module provides:
//! - Ed25519 key pair generation, signing, and verification
//! - SHA-256 hashing for transactions and journal entries
//! - HMAC-SHA256 for per-transaction and whole-trail integrity
//! - Constant-time comparison for hash and MAC material
//!
//! Secret material lives in [`SecretBytes`], which is overwritten with
//! zeros before its backing storage is freed.

use crate::{Error, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

/// Opaque secret byte buffer, zeroed on drop.
///
/// Used for HMAC keys and KDF-derived keys. Never logged, never serialized.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    /// Wrap secret bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Borrow the secret
    pub fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBytes(***)")
    }
}

/// Ed25519 key pair for transaction signing
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let signing_key = SigningKey::from_bytes(&rand::random::<[u8; 32]>());
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Create from seed (32 bytes), deterministic
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Create from a 64-char hex seed
    pub fn from_hex(hex_seed: &str) -> Result<Self> {
        let bytes = hex::decode(hex_seed.trim())
            .map_err(|e| Error::InvalidKeyFormat(format!("bad hex: {}", e)))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidKeyFormat("seed must be 32 bytes".to_string()))?;
        Ok(Self::from_seed(&seed))
    }

    /// Public key bytes
    pub fn public_key(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Secret seed bytes; handle with care
    pub fn secret_seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Sign a message, producing a 64-byte detached signature
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Verify a signature made by this key pair
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> Result<()> {
        let sig = Signature::from_bytes(signature);
        self.verifying_key
            .verify(message, &sig)
            .map_err(|e| Error::SignatureInvalid(e.to_string()))
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(self.public_key()))
            .finish_non_exhaustive()
    }
}

/// Verify a detached signature with a raw public key
pub fn verify_signature(message: &[u8], signature: &[u8; 64], public_key: &[u8; 32]) -> bool {
    let sig = Signature::from_bytes(signature);
    let verifying_key = match VerifyingKey::from_bytes(public_key) {
        Ok(key) => key,
        Err(_) => return false,
    };
    verifying_key.verify(message, &sig).is_ok()
}

/// SHA-256 of arbitrary bytes
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// HMAC-SHA256 of `data` under `key`
pub fn hmac_sha256(key: &SecretBytes, data: &[u8]) -> [u8; 32] {
    let mut mac =
        HmacSha256::new_from_slice(key.expose()).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Constant-time equality for hash and MAC material
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let keypair = KeyPair::generate();
        assert_eq!(keypair.public_key().len(), 32);
    }

    #[test]
    fn test_keypair_from_seed_deterministic() {
        let seed = [42u8; 32];
        let keypair1 = KeyPair::from_seed(&seed);
        let keypair2 = KeyPair::from_seed(&seed);
        assert_eq!(keypair1.public_key(), keypair2.public_key());
    }

    #[test]
    fn test_sign_and_verify() {
        let keypair = KeyPair::generate();
        let message = b"test message";

        let signature = keypair.sign(message);
        assert!(keypair.verify(message, &signature).is_ok());
        assert!(keypair.verify(b"wrong message", &signature).is_err());
    }

    #[test]
    fn test_verify_with_raw_public_key() {
        let keypair = KeyPair::generate();
        let message = b"test message";
        let signature = keypair.sign(message);

        assert!(verify_signature(message, &signature, &keypair.public_key()));

        let other = KeyPair::generate();
        assert!(!verify_signature(message, &signature, &other.public_key()));
    }

    #[test]
    fn test_from_hex_round_trip() {
        let keypair = KeyPair::generate();
        let hex_seed = hex::encode(keypair.secret_seed());
        let restored = KeyPair::from_hex(&hex_seed).unwrap();
        assert_eq!(keypair.public_key(), restored.public_key());
    }

    #[test]
    fn test_from_hex_rejects_short_seed() {
        assert!(KeyPair::from_hex("abcd").is_err());
        assert!(KeyPair::from_hex("not hex at all").is_err());
    }

    #[test]
    fn test_hash_bytes() {
        let h1 = hash_bytes(b"data");
        let h2 = hash_bytes(b"data");
        let h3 = hash_bytes(b"other");
        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_hmac_keyed() {
        let k1 = SecretBytes::new(b"key-one".to_vec());
        let k2 = SecretBytes::new(b"key-two".to_vec());
        let m1 = hmac_sha256(&k1, b"payload");
        let m2 = hmac_sha256(&k2, b"payload");
        assert_ne!(m1, m2);
        assert!(constant_time_eq(&m1, &hmac_sha256(&k1, b"payload")));
    }

    #[test]
    fn test_constant_time_eq_lengths() {
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"abc", b"abc"));
    }
}
