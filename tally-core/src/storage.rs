//! Encrypted persistence
//!
//! Authenticated symmetric encryption (AES-256-GCM) over arbitrary blobs,
//! keyed either directly (caller supplies 32 bytes) or by password through
//! Argon2id. The on-disk form is base64 of `salt ‖ ciphertext`, where the
//! 16-byte salt is present iff the key was password-derived and the
//! ciphertext itself starts with the 12-byte AEAD nonce. Loading detects a
//! salt-present envelope by length: 16 bytes or more reads as salted,
//! anything shorter as direct-key.
//!
//! KDF parameters are pinned with the format: Argon2id, 19 MiB memory,
//! 2 passes, 1 lane, 32-byte output. Changing them breaks old files.
//!
//! Any decryption failure surfaces [`Error::AuthenticationFailed`] without
//! distinguishing a wrong password from tampered ciphertext. Derived keys
//! are zeroized on drop.

use crate::crypto::SecretBytes;
use crate::{Error, Result};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::path::{Path, PathBuf};

/// Salt length for password-derived keys
pub const SALT_LEN: usize = 16;

/// AES-GCM nonce length
pub const NONCE_LEN: usize = 12;

/// Symmetric key length
pub const KEY_LEN: usize = 32;

// Argon2id cost parameters, fixed for the format.
const KDF_MEMORY_KIB: u32 = 19_456;
const KDF_PASSES: u32 = 2;
const KDF_LANES: u32 = 1;

/// Derive a 32-byte key from a password and salt (Argon2id)
pub fn derive_key(password: &str, salt: &[u8; SALT_LEN]) -> Result<SecretBytes> {
    let params = Params::new(KDF_MEMORY_KIB, KDF_PASSES, KDF_LANES, Some(KEY_LEN))
        .map_err(|e| Error::InvalidKeyFormat(format!("bad KDF parameters: {}", e)))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = vec![0u8; KEY_LEN];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| Error::InvalidKeyFormat(format!("key derivation failed: {}", e)))?;
    Ok(SecretBytes::new(key))
}

/// Encrypted envelope: optional salt plus nonce-prefixed ciphertext
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    /// Present iff the key was password-derived
    pub salt: Option<[u8; SALT_LEN]>,

    /// `nonce(12) ‖ AEAD ciphertext`
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Raw envelope bytes: `salt ‖ ciphertext`
    pub fn envelope_bytes(&self) -> Vec<u8> {
        let mut envelope = Vec::with_capacity(
            self.salt.map(|_| SALT_LEN).unwrap_or(0) + self.ciphertext.len(),
        );
        if let Some(salt) = self.salt {
            envelope.extend_from_slice(&salt);
        }
        envelope.extend_from_slice(&self.ciphertext);
        envelope
    }

    /// Base64 of `salt ‖ ciphertext`
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.envelope_bytes())
    }

    /// Decode a base64 envelope. An envelope of 16 bytes or more is read
    /// as salt-present; anything shorter is treated as direct-key (no
    /// salt). Direct-key consumers use [`EncryptedData::envelope_bytes`],
    /// which rejoins whatever this split off.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let envelope = BASE64.decode(encoded.trim()).map_err(|e| Error::MalformedRecord {
            line: 0,
            reason: format!("invalid base64 envelope: {}", e),
        })?;

        if envelope.len() < SALT_LEN {
            return Ok(Self {
                salt: None,
                ciphertext: envelope,
            });
        }

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&envelope[..SALT_LEN]);
        Ok(Self {
            salt: Some(salt),
            ciphertext: envelope[SALT_LEN..].to_vec(),
        })
    }
}

/// AEAD envelope over a fixed 32-byte key
#[derive(Debug)]
pub struct EncryptedStorage {
    key: SecretBytes,
}

impl EncryptedStorage {
    /// Use a directly supplied key; no salt enters the envelope
    pub fn with_key(key: [u8; KEY_LEN]) -> Self {
        Self {
            key: SecretBytes::new(key.to_vec()),
        }
    }

    /// Derive the key from a password and an existing salt
    pub fn from_password(password: &str, salt: &[u8; SALT_LEN]) -> Result<Self> {
        Ok(Self {
            key: derive_key(password, salt)?,
        })
    }

    /// Encrypt a blob; output is `nonce ‖ AEAD ciphertext`
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.expose()));
        let nonce_bytes = rand::random::<[u8; NONCE_LEN]>();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let sealed = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| Error::AuthenticationFailed)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Decrypt `nonce ‖ AEAD ciphertext`
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < NONCE_LEN {
            return Err(Error::AuthenticationFailed);
        }
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.expose()));
        let nonce = Nonce::from_slice(&data[..NONCE_LEN]);

        cipher
            .decrypt(nonce, &data[NONCE_LEN..])
            .map_err(|_| Error::AuthenticationFailed)
    }

    /// Password mode: fresh random salt per call, salt carried in the
    /// envelope
    pub fn encrypt_with_password(password: &str, plaintext: &[u8]) -> Result<EncryptedData> {
        let salt = rand::random::<[u8; SALT_LEN]>();
        let storage = Self::from_password(password, &salt)?;
        Ok(EncryptedData {
            salt: Some(salt),
            ciphertext: storage.encrypt(plaintext)?,
        })
    }

    /// Open a password-mode envelope
    pub fn decrypt_with_password(password: &str, data: &EncryptedData) -> Result<Vec<u8>> {
        let salt = data.salt.ok_or(Error::AuthenticationFailed)?;
        let storage = Self::from_password(password, &salt)?;
        storage.decrypt(&data.ciphertext)
    }
}

/// A password-protected file of `base64(salt ‖ ciphertext)`
#[derive(Debug, Clone)]
pub struct SecureFile {
    path: PathBuf,
}

impl SecureFile {
    /// Bind to a path; nothing is touched until read or write
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Seal `plaintext` under `password` and write the envelope
    pub fn write(&self, password: &str, plaintext: &[u8]) -> Result<()> {
        let sealed = EncryptedStorage::encrypt_with_password(password, plaintext)?;
        std::fs::write(&self.path, sealed.to_base64())?;
        Ok(())
    }

    /// Read and open the envelope
    pub fn read(&self, password: &str) -> Result<Vec<u8>> {
        let encoded = std::fs::read_to_string(&self.path)?;
        let sealed = EncryptedData::from_base64(&encoded)?;
        EncryptedStorage::decrypt_with_password(password, &sealed)
    }

    /// Direct-key variant of [`SecureFile::write`]; no salt in the envelope
    pub fn write_with_key(&self, key: [u8; KEY_LEN], plaintext: &[u8]) -> Result<()> {
        let storage = EncryptedStorage::with_key(key);
        let sealed = EncryptedData {
            salt: None,
            ciphertext: storage.encrypt(plaintext)?,
        };
        std::fs::write(&self.path, sealed.to_base64())?;
        Ok(())
    }

    /// Direct-key variant of [`SecureFile::read`]
    pub fn read_with_key(&self, key: [u8; KEY_LEN]) -> Result<Vec<u8>> {
        let encoded = std::fs::read_to_string(&self.path)?;
        let sealed = EncryptedData::from_base64(&encoded)?;
        // A direct-key envelope carries no salt, so the whole envelope is
        // the nonce-prefixed ciphertext
        EncryptedStorage::with_key(key).decrypt(&sealed.envelope_bytes())
    }
}
