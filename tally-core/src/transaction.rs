//! Transactions
//!
//! A transaction is the canonical record of one value movement. It is
//! immutable after creation except for the two authentication fields
//! (`signature`, `integrity_hmac`), which cover the canonical signing
//! preimage and are attached by the holder of the relevant key.
//!
//! The signing preimage is the stable byte string
//! `"{timestamp}|{amount}|{currency}|{from}|{to}|{memo_or_empty}|{nonce_hex}"`
//! and is the only input to hashing, signing, and MAC computation. The
//! canonical JSON form is used for journal hashing and persistence; field
//! order is the struct declaration order and never changes.

use crate::crypto::{self, KeyPair, SecretBytes};
use crate::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Canonical record of a value movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Short hex digest derived from (timestamp, source, sink, amount)
    pub id: String,

    /// Seconds since epoch
    pub timestamp: i64,

    /// Amount in the asset's smallest unit
    pub amount: i64,

    /// Asset id
    pub currency: String,

    /// Source account name
    pub from_account: String,

    /// Destination account name
    pub to_account: String,

    /// Optional free text
    pub memo: Option<String>,

    /// 12 random bytes as 24 lowercase hex chars; makes otherwise-identical
    /// transactions distinct
    pub nonce: String,

    /// Detached Ed25519 signature over the signing preimage (128 hex chars)
    pub signature: Option<String>,

    /// HMAC-SHA256 of the signing preimage under a signer-chosen key
    /// (64 hex chars)
    pub integrity_hmac: Option<String>,

    /// Id of a transaction that must already be processed
    pub depends_on: Option<String>,
}

impl Transaction {
    /// Create a transaction timestamped now, with a fresh random nonce
    pub fn new(
        amount: i64,
        currency: impl Into<String>,
        from_account: impl Into<String>,
        to_account: impl Into<String>,
        memo: Option<String>,
    ) -> Self {
        let timestamp = Utc::now().timestamp();
        let from_account = from_account.into();
        let to_account = to_account.into();
        let id = derive_id(timestamp, &from_account, &to_account, amount);
        let nonce = hex::encode(rand::random::<[u8; 12]>());

        Self {
            id,
            timestamp,
            amount,
            currency: currency.into(),
            from_account,
            to_account,
            memo,
            nonce,
            signature: None,
            integrity_hmac: None,
            depends_on: None,
        }
    }

    /// Declare a dependency on a prior transaction id
    pub fn with_depends_on(mut self, id: impl Into<String>) -> Self {
        self.depends_on = Some(id.into());
        self
    }

    /// Canonical signing preimage, stable and bit-exact
    pub fn signing_preimage(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}",
            self.timestamp,
            self.amount,
            self.currency,
            self.from_account,
            self.to_account,
            self.memo.as_deref().unwrap_or(""),
            self.nonce,
        )
    }

    /// Canonical JSON line used for journal hashing and persistence
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).expect("transaction serialization cannot fail")
    }

    /// Parse a canonical JSON line back into a transaction
    pub fn from_canonical(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|e| Error::MalformedRecord {
            line: 0,
            reason: e.to_string(),
        })
    }

    /// SHA-256 of the canonical signing preimage; the Merkle leaf for this
    /// transaction. The preimage, not the JSON bytes, is hashed, so two
    /// reformatted files hash identically.
    pub fn hash(&self) -> [u8; 32] {
        crypto::hash_bytes(self.signing_preimage().as_bytes())
    }

    /// Sign the preimage, replacing any existing signature
    pub fn sign(&mut self, keypair: &KeyPair) {
        let signature = keypair.sign(self.signing_preimage().as_bytes());
        self.signature = Some(hex::encode(signature));
    }

    /// Verify the attached signature against a raw public key
    pub fn verify_signature(&self, public_key: &[u8; 32]) -> Result<()> {
        let sig_hex = self
            .signature
            .as_deref()
            .ok_or_else(|| Error::SignatureInvalid("transaction is unsigned".to_string()))?;
        let bytes = hex::decode(sig_hex)
            .map_err(|e| Error::InvalidKeyFormat(format!("bad signature hex: {}", e)))?;
        let signature: [u8; 64] = bytes
            .try_into()
            .map_err(|_| Error::InvalidKeyFormat("signature must be 64 bytes".to_string()))?;

        if crypto::verify_signature(self.signing_preimage().as_bytes(), &signature, public_key) {
            Ok(())
        } else {
            Err(Error::SignatureInvalid(self.id.clone()))
        }
    }

    /// Attach an HMAC-SHA256 of the preimage under `key`
    pub fn attach_hmac(&mut self, key: &SecretBytes) {
        let mac = crypto::hmac_sha256(key, self.signing_preimage().as_bytes());
        self.integrity_hmac = Some(hex::encode(mac));
    }

    /// Verify the attached HMAC in constant time
    pub fn verify_hmac(&self, key: &SecretBytes) -> Result<()> {
        let mac_hex = self
            .integrity_hmac
            .as_deref()
            .ok_or_else(|| Error::HmacInvalid("transaction carries no HMAC".to_string()))?;
        let stored = hex::decode(mac_hex)
            .map_err(|e| Error::InvalidKeyFormat(format!("bad HMAC hex: {}", e)))?;
        let computed = crypto::hmac_sha256(key, self.signing_preimage().as_bytes());

        if crypto::constant_time_eq(&stored, &computed) {
            Ok(())
        } else {
            Err(Error::HmacInvalid(self.id.clone()))
        }
    }
}

/// First 8 bytes of SHA-256 over the identity tuple, lowercase hex
fn derive_id(timestamp: i64, from: &str, to: &str, amount: i64) -> String {
    let material = format!("{}{}{}{}", timestamp, from, to, amount);
    hex::encode(&crypto::hash_bytes(material.as_bytes())[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transaction {
        Transaction::new(50_000, "USD", "alice", "bob", Some("Payment".to_string()))
    }

    #[test]
    fn test_id_shape() {
        let tx = sample();
        assert_eq!(tx.id.len(), 16);
        assert!(tx.id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_nonce_makes_transactions_distinct() {
        let a = sample();
        let b = sample();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_signing_preimage_layout() {
        let tx = sample();
        let preimage = tx.signing_preimage();
        let parts: Vec<&str> = preimage.split('|').collect();
        assert_eq!(parts.len(), 7);
        assert_eq!(parts[1], "50000");
        assert_eq!(parts[2], "USD");
        assert_eq!(parts[3], "alice");
        assert_eq!(parts[4], "bob");
        assert_eq!(parts[5], "Payment");
        assert_eq!(parts[6], tx.nonce);
    }

    #[test]
    fn test_preimage_empty_memo() {
        let tx = Transaction::new(1, "USD", "a", "b", None);
        assert!(tx.signing_preimage().contains("|a|b||"));
    }

    #[test]
    fn test_canonical_round_trip() {
        let mut tx = sample();
        tx.depends_on = Some("deadbeefdeadbeef".to_string());
        let line = tx.canonical_json();
        let parsed = Transaction::from_canonical(&line).unwrap();
        assert_eq!(parsed, tx);
    }

    #[test]
    fn test_canonical_rejects_garbage() {
        assert!(Transaction::from_canonical("{not json").is_err());
        assert!(Transaction::from_canonical("{}").is_err());
    }

    #[test]
    fn test_sign_and_verify() {
        let keypair = KeyPair::generate();
        let mut tx = sample();
        tx.sign(&keypair);

        assert_eq!(tx.signature.as_ref().unwrap().len(), 128);
        assert!(tx.verify_signature(&keypair.public_key()).is_ok());

        let other = KeyPair::generate();
        assert!(tx.verify_signature(&other.public_key()).is_err());
    }

    #[test]
    fn test_verify_unsigned_fails() {
        let keypair = KeyPair::generate();
        let tx = sample();
        assert!(matches!(
            tx.verify_signature(&keypair.public_key()),
            Err(Error::SignatureInvalid(_))
        ));
    }

    #[test]
    fn test_signature_covers_amount() {
        let keypair = KeyPair::generate();
        let mut tx = sample();
        tx.sign(&keypair);
        tx.amount += 1;
        assert!(tx.verify_signature(&keypair.public_key()).is_err());
    }

    #[test]
    fn test_hmac_round_trip() {
        let key = SecretBytes::new(b"audit-key".to_vec());
        let mut tx = sample();
        tx.attach_hmac(&key);

        assert_eq!(tx.integrity_hmac.as_ref().unwrap().len(), 64);
        assert!(tx.verify_hmac(&key).is_ok());

        let wrong = SecretBytes::new(b"other-key".to_vec());
        assert!(tx.verify_hmac(&wrong).is_err());
    }

    #[test]
    fn test_hash_ignores_json_reformatting() {
        let tx = sample();
        let line = tx.canonical_json();
        // A reformatted file still parses to the same transaction, which
        // re-canonicalizes to the same bytes and the same hash.
        let reformatted = line.replace(",\"", ", \"");
        let parsed = Transaction::from_canonical(&reformatted).unwrap();
        assert_eq!(parsed.hash(), tx.hash());
    }
}
