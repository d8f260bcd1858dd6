//! Tally ledger core
//!
//! Embeddable double-entry ledger engine for financial and crypto-accounting
//! workloads: exact fixed-point amounts, typed accounts, a hash-chained
//! journal, Merkle batch attestation, a replay-based auditor, and
//! authenticated encrypted persistence.
//!
//! # Architecture
//!
//! - **Exact arithmetic**: money is i64 at scale 10^8; floats never touch
//!   the money path
//! - **Double entry**: every movement credits a source and debits a
//!   destination under account-type sign rules
//! - **Append-only journal**: each entry's hash covers its predecessor;
//!   modifying any entry invalidates all later hashes
//! - **Single writer**: the engine is synchronous and single-threaded;
//!   callers wanting shared access wrap a [`Ledger`] in their own lock
//!
//! # Invariants
//!
//! - Conservation: Σ(asset) = Σ(liability) + Σ(equity) + Σ(revenue) − Σ(expense)
//! - Deterministic replay: the same journal always rebuilds the same state
//! - Rollback symmetry: apply-then-rollback restores every touched balance

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    unused_qualifications
)]

pub mod account;
pub mod asset;
pub mod audit;
pub mod config;
pub mod contract;
pub mod crypto;
pub mod error;
pub mod fixed;
pub mod journal;
pub mod ledger;
pub mod merkle;
pub mod storage;
pub mod transaction;

// Re-exports
pub use account::{Account, AccountType};
pub use asset::{Asset, AssetKind, AssetPolicy, AssetRegistry, ExchangeRateTable};
pub use audit::{
    AuditEntry, AuditEventKind, AuditProofChain, AuditReport, Auditor, BalanceDiscrepancy,
};
pub use config::{Config, GasConfig};
pub use contract::ContractEvent;
pub use crypto::{KeyPair, SecretBytes};
pub use error::{Error, Result};
pub use fixed::FixedPoint;
pub use journal::{Journal, JournalEntry};
pub use ledger::{Ledger, TrialBalanceRow};
pub use merkle::{MerkleProof, MerkleTree};
pub use storage::{EncryptedData, EncryptedStorage, SecureFile};
pub use transaction::Transaction;
