//! Append-only hash-chained journal
//!
//! Every appended transaction becomes a [`JournalEntry`] whose hash covers
//! the canonical transaction JSON, the entry's sequence number, and the
//! predecessor's hash. Modifying any entry invalidates every later hash.
//!
//! Two persistence formats exist:
//!
//! - **Plaintext JSONL**: one canonical JSON object per line. Loading
//!   replays lines through `append`, re-deriving the chain; the file itself
//!   is replayable but not tamper-evident.
//! - **Encrypted**: the whole canonical stream sealed in one authenticated
//!   envelope (see [`crate::storage`]). This is the attested artifact.

use crate::crypto;
use crate::merkle::MerkleTree;
use crate::storage::SecureFile;
use crate::transaction::Transaction;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One link of the hash chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// The journal's own copy of the transaction
    pub transaction: Transaction,

    /// Hex hash of the previous entry; absent for the first
    pub prev_hash: Option<String>,

    /// `SHA256(canonical_json ‖ le64(sequence) ‖ prev_hash_or_empty)`, hex
    pub hash: String,

    /// 0-based position in the journal
    pub sequence: u64,
}

impl JournalEntry {
    fn compute_hash(canonical_json: &str, sequence: u64, prev_hash: Option<&str>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(canonical_json.as_bytes());
        hasher.update(sequence.to_le_bytes());
        hasher.update(prev_hash.unwrap_or("").as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Ordered, append-only sequence of journal entries
#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
    path: Option<PathBuf>,
}

impl Journal {
    /// In-memory journal
    pub fn new() -> Self {
        Self::default()
    }

    /// Journal that streams every appended transaction to `path` as a
    /// canonical JSON line
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            entries: Vec::new(),
            path: Some(path.into()),
        }
    }

    /// Adopt externally supplied entries, e.g. a journal received for
    /// verification. The entries are taken as-is; run
    /// [`Journal::verify_integrity`] to judge them.
    pub fn from_entries(entries: Vec<JournalEntry>) -> Self {
        Self {
            entries,
            path: None,
        }
    }

    /// Append a transaction. The journal owns its own clone.
    pub fn append(&mut self, tx: &Transaction) -> Result<&JournalEntry> {
        let transaction = tx.clone();
        let canonical = transaction.canonical_json();
        let sequence = self.entries.len() as u64;
        let prev_hash = self.entries.last().map(|entry| entry.hash.clone());
        let hash = JournalEntry::compute_hash(&canonical, sequence, prev_hash.as_deref());

        if let Some(path) = &self.path {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "{}", canonical)?;
        }

        tracing::debug!(tx = %transaction.id, sequence, "journal append");
        self.entries.push(JournalEntry {
            transaction,
            prev_hash,
            hash,
            sequence,
        });
        Ok(self.entries.last().expect("just pushed"))
    }

    /// Entry at `sequence`
    pub fn get(&self, sequence: u64) -> Option<&JournalEntry> {
        self.entries.get(sequence as usize)
    }

    /// First entry whose transaction carries `id`
    pub fn get_by_id(&self, id: &str) -> Option<&JournalEntry> {
        self.entries.iter().find(|entry| entry.transaction.id == id)
    }

    /// Entries touching `account` as source or destination
    pub fn by_account(&self, account: &str) -> Vec<&JournalEntry> {
        self.entries
            .iter()
            .filter(|entry| {
                entry.transaction.from_account == account
                    || entry.transaction.to_account == account
            })
            .collect()
    }

    /// All entries in order
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been appended
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hash of the newest entry
    pub fn last_hash(&self) -> Option<&str> {
        self.entries.last().map(|entry| entry.hash.as_str())
    }

    /// Verify every entry's hash, its sequence number, and its link to the
    /// predecessor. Hash comparisons are constant-time.
    pub fn verify_integrity(&self) -> Result<()> {
        let mut prev: Option<&str> = None;
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.sequence != i as u64 {
                return Err(Error::IntegrityBroken {
                    sequence: entry.sequence,
                    reason: format!("sequence out of order, expected {}", i),
                });
            }

            let expected_link = prev.unwrap_or("");
            let stored_link = entry.prev_hash.as_deref().unwrap_or("");
            if !crypto::constant_time_eq(stored_link.as_bytes(), expected_link.as_bytes()) {
                return Err(Error::IntegrityBroken {
                    sequence: entry.sequence,
                    reason: "hash chain link mismatch".to_string(),
                });
            }

            let recomputed = JournalEntry::compute_hash(
                &entry.transaction.canonical_json(),
                entry.sequence,
                entry.prev_hash.as_deref(),
            );
            if !crypto::constant_time_eq(recomputed.as_bytes(), entry.hash.as_bytes()) {
                return Err(Error::IntegrityBroken {
                    sequence: entry.sequence,
                    reason: "entry hash mismatch".to_string(),
                });
            }

            prev = Some(entry.hash.as_str());
        }
        Ok(())
    }

    /// Write the canonical transaction stream as JSONL
    pub fn save_plain(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.transaction.canonical_json());
            out.push('\n');
        }
        std::fs::write(path, out)?;
        Ok(())
    }

    /// Load a plaintext JSONL journal, replaying every line through
    /// `append`. Empty lines are skipped; a trailing malformed line (a
    /// partial write) is ignored, interior garbage is an error.
    pub fn load_plain(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let mut journal = Self::replay(&content)?;
        journal.path = Some(path.as_ref().to_path_buf());
        Ok(journal)
    }

    /// Merkle tree over every journaled transaction, for batch attestation
    pub fn merkle_tree(&self) -> MerkleTree {
        MerkleTree::from_leaves(
            self.entries
                .iter()
                .map(|entry| entry.transaction.hash())
                .collect(),
        )
    }

    fn canonical_stream(&self) -> String {
        let mut stream = String::new();
        for entry in &self.entries {
            stream.push_str(&entry.transaction.canonical_json());
            stream.push('\n');
        }
        stream
    }

    /// Seal the canonical stream into one authenticated envelope
    pub fn save_encrypted(&self, path: impl AsRef<Path>, password: &str) -> Result<()> {
        SecureFile::new(path).write(password, self.canonical_stream().as_bytes())?;
        tracing::info!(entries = self.entries.len(), "journal sealed");
        Ok(())
    }

    /// Seal the canonical stream under a directly supplied key; the
    /// envelope carries no salt
    pub fn save_encrypted_with_key(&self, path: impl AsRef<Path>, key: [u8; 32]) -> Result<()> {
        SecureFile::new(path).write_with_key(key, self.canonical_stream().as_bytes())?;
        tracing::info!(entries = self.entries.len(), "journal sealed");
        Ok(())
    }

    /// Open a journal sealed with [`Journal::save_encrypted_with_key`]
    pub fn load_encrypted_with_key(path: impl AsRef<Path>, key: [u8; 32]) -> Result<Self> {
        let plaintext = SecureFile::new(path).read_with_key(key)?;
        let content = String::from_utf8(plaintext).map_err(|e| Error::MalformedRecord {
            line: 0,
            reason: format!("journal stream is not UTF-8: {}", e),
        })?;
        Self::replay(&content)
    }

    /// Open an encrypted journal; fails with `AuthenticationFailed` on a
    /// wrong password or tampered ciphertext
    pub fn load_encrypted(path: impl AsRef<Path>, password: &str) -> Result<Self> {
        let plaintext = SecureFile::new(path).read(password)?;
        let content = String::from_utf8(plaintext).map_err(|e| Error::MalformedRecord {
            line: 0,
            reason: format!("journal stream is not UTF-8: {}", e),
        })?;
        Self::replay(&content)
    }

    fn replay(content: &str) -> Result<Self> {
        let lines: Vec<(usize, &str)> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .collect();

        let mut journal = Self::new();
        for (position, &(line_number, line)) in lines.iter().enumerate() {
            match Transaction::from_canonical(line) {
                Ok(tx) => {
                    journal.append(&tx)?;
                }
                Err(_) if position == lines.len() - 1 => {
                    // Torn tail from a crashed append; drop it.
                    tracing::warn!(line = line_number + 1, "ignoring trailing partial record");
                }
                Err(err) => {
                    return Err(Error::MalformedRecord {
                        line: line_number + 1,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(journal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(amount: i64) -> Transaction {
        Transaction::new(amount, "USD", "alice", "bob", None)
    }

    #[test]
    fn test_append_links_chain() {
        let mut journal = Journal::new();
        journal.append(&tx(1)).unwrap();
        journal.append(&tx(2)).unwrap();
        journal.append(&tx(3)).unwrap();

        let entries = journal.entries();
        assert_eq!(entries[0].prev_hash, None);
        assert_eq!(entries[1].prev_hash.as_deref(), Some(entries[0].hash.as_str()));
        assert_eq!(entries[2].prev_hash.as_deref(), Some(entries[1].hash.as_str()));
        assert_eq!(entries[2].sequence, 2);
        assert!(journal.verify_integrity().is_ok());
    }

    #[test]
    fn test_tampered_amount_detected() {
        let mut journal = Journal::new();
        journal.append(&tx(1)).unwrap();
        journal.append(&tx(2)).unwrap();

        journal.entries[1].transaction.amount += 1;
        assert!(journal.verify_integrity().is_err());
    }

    #[test]
    fn test_tampered_sequence_detected() {
        let mut journal = Journal::new();
        journal.append(&tx(1)).unwrap();
        journal.append(&tx(2)).unwrap();

        journal.entries[1].sequence = 7;
        assert!(matches!(
            journal.verify_integrity(),
            Err(Error::IntegrityBroken { .. })
        ));
    }

    #[test]
    fn test_relinked_chain_detected() {
        let mut journal = Journal::new();
        journal.append(&tx(1)).unwrap();
        journal.append(&tx(2)).unwrap();
        journal.append(&tx(3)).unwrap();

        // Splice out the middle entry and renumber
        journal.entries.remove(1);
        journal.entries[1].sequence = 1;
        assert!(journal.verify_integrity().is_err());
    }

    #[test]
    fn test_lookup() {
        let mut journal = Journal::new();
        let a = tx(10);
        let b = Transaction::new(20, "USD", "carol", "bob", None);
        journal.append(&a).unwrap();
        journal.append(&b).unwrap();

        assert_eq!(journal.get(0).unwrap().transaction.id, a.id);
        assert_eq!(journal.get_by_id(&b.id).unwrap().sequence, 1);
        assert!(journal.get(5).is_none());

        assert_eq!(journal.by_account("alice").len(), 1);
        assert_eq!(journal.by_account("bob").len(), 2);
        assert!(journal.by_account("mallory").is_empty());
    }

    #[test]
    fn test_plaintext_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");

        let mut journal = Journal::new();
        for amount in [1, 2, 3] {
            journal.append(&tx(amount)).unwrap();
        }
        journal.save_plain(&path).unwrap();

        let loaded = Journal::load_plain(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert!(loaded.verify_integrity().is_ok());
        assert_eq!(loaded.entries()[2].hash, journal.entries()[2].hash);
    }

    #[test]
    fn test_configured_path_streams_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");

        let mut journal = Journal::with_path(&path);
        journal.append(&tx(1)).unwrap();
        journal.append(&tx(2)).unwrap();

        let reloaded = Journal::load_plain(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.last_hash(), journal.last_hash());
    }

    #[test]
    fn test_load_ignores_blank_and_torn_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");

        let a = tx(1);
        let b = tx(2);
        let content = format!(
            "{}\n\n{}\n{{\"id\":\"torn",
            a.canonical_json(),
            b.canonical_json()
        );
        std::fs::write(&path, content).unwrap();

        let journal = Journal::load_plain(&path).unwrap();
        assert_eq!(journal.len(), 2);
    }

    #[test]
    fn test_load_rejects_interior_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");

        let content = format!("not json\n{}\n", tx(1).canonical_json());
        std::fs::write(&path, content).unwrap();

        assert!(matches!(
            Journal::load_plain(&path),
            Err(Error::MalformedRecord { line: 1, .. })
        ));
    }

    #[test]
    fn test_merkle_attestation() {
        let mut journal = Journal::new();
        for amount in [1, 2, 3, 4, 5] {
            journal.append(&tx(amount)).unwrap();
        }

        let tree = journal.merkle_tree();
        assert_eq!(tree.len(), 5);
        let root = tree.root();

        let target = &journal.entries()[3].transaction;
        let proof = tree.proof_for(&target.hash()).unwrap();
        assert!(proof.verify(&root));
    }

    #[test]
    fn test_encrypted_with_key_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.sealed");
        let key = [5u8; 32];

        let mut journal = Journal::new();
        journal.append(&tx(9)).unwrap();
        journal.save_encrypted_with_key(&path, key).unwrap();

        let loaded = Journal::load_encrypted_with_key(&path, key).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(Journal::load_encrypted_with_key(&path, [6u8; 32]).is_err());
    }

    #[test]
    fn test_encrypted_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.sealed");

        let mut journal = Journal::new();
        for amount in [5, 6, 7] {
            journal.append(&tx(amount)).unwrap();
        }
        journal.save_encrypted(&path, "pw").unwrap();

        let loaded = Journal::load_encrypted(&path, "pw").unwrap();
        assert_eq!(loaded.len(), 3);
        assert!(loaded.verify_integrity().is_ok());

        assert!(matches!(
            Journal::load_encrypted(&path, "wrong"),
            Err(Error::AuthenticationFailed)
        ));
    }
}
