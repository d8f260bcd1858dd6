//! Error types for the ledger engine

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    // Validation
    /// Account already exists
    #[error("Account already exists: {0}")]
    AccountExists(String),

    /// Account missing on a direct lookup
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Source account missing
    #[error("Source account not found: {0}")]
    FromAccountNotFound(String),

    /// Destination account missing
    #[error("Destination account not found: {0}")]
    ToAccountNotFound(String),

    /// Account holds a different asset than the transaction moves
    #[error("Currency mismatch: account {account} holds {held}, transaction moves {moved}")]
    CurrencyMismatch {
        /// Offending account name
        account: String,
        /// Asset the account holds
        held: String,
        /// Asset the transaction moves
        moved: String,
    },

    /// Asset id already registered
    #[error("Asset already exists: {0}")]
    AssetExists(String),

    /// Asset not registered
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// Asset is frozen
    #[error("Asset is frozen: {0}")]
    AssetFrozen(String),

    /// Amount exceeds the per-transaction cap
    #[error("Transaction amount {amount} exceeds limit {limit} for asset {asset}")]
    TransactionAmountTooLarge {
        /// Asset id
        asset: String,
        /// Requested amount (smallest units)
        amount: i64,
        /// Configured cap (smallest units)
        limit: i64,
    },

    /// Declared dependency has not been processed
    #[error("Dependency not found: transaction {0} has not been processed")]
    DependencyNotFound(String),

    // Integrity
    /// Journal hash chain or sequence numbering broken
    #[error("Integrity broken at sequence {sequence}: {reason}")]
    IntegrityBroken {
        /// Sequence number of the offending entry
        sequence: u64,
        /// What failed to verify
        reason: String,
    },

    /// Transaction id seen twice
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),

    /// Transaction references an unknown account
    #[error("Orphan transaction: {0}")]
    OrphanTransaction(String),

    /// Recomputed balance disagrees with the live ledger
    #[error("Balance discrepancy on {account}: expected {expected}, actual {actual}")]
    BalanceDiscrepancy {
        /// Account name
        account: String,
        /// Replayed balance
        expected: i64,
        /// Live ledger balance
        actual: i64,
    },

    // Crypto
    /// Ed25519 signature failed to verify
    #[error("Signature verification failed: {0}")]
    SignatureInvalid(String),

    /// Per-transaction HMAC failed to verify
    #[error("HMAC verification failed: {0}")]
    HmacInvalid(String),

    /// AEAD tag mismatch (wrong password, wrong key, or tampered ciphertext)
    #[error("Authentication failed: ciphertext rejected")]
    AuthenticationFailed,

    /// Key material is not well-formed
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    // Numeric
    /// Division by zero on the fixed-point path
    #[error("Division by zero")]
    DivisionByZero,

    /// Fixed-point arithmetic overflowed i64
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    /// Amount string could not be parsed
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    // Storage
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted record could not be decoded
    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord {
        /// 1-based line number
        line: usize,
        /// Decode failure
        reason: String,
    },

    // Rollback
    /// No snapshot exists for the transaction id
    #[error("Snapshot not found for transaction: {0}")]
    SnapshotNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::MalformedRecord {
            line: 0,
            reason: err.to_string(),
        }
    }
}
