//! Configuration for the ledger engine

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for journals and key files
    pub data_dir: PathBuf,

    /// Journal file to stream appends to; `None` keeps the journal
    /// in memory only
    pub journal_path: Option<PathBuf>,

    /// Hex-encoded whole-trail audit HMAC key
    pub audit_key_hex: Option<String>,

    /// Gas billing for contract executions; `None` disables billing
    pub gas: Option<GasConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            journal_path: None,
            audit_key_hex: None,
            gas: None,
        }
    }
}

/// Gas billing accounts for the contract hook surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasConfig {
    /// Account debited for consumed gas
    pub payer_account: String,

    /// Account credited with consumed gas
    pub pool_account: String,

    /// Asset gas is billed in
    pub asset: String,

    /// Smallest units charged per gas unit
    pub gas_price: i64,
}

impl Config {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("failed to parse config: {}", e)))
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(dir) = std::env::var("TALLY_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("TALLY_JOURNAL_PATH") {
            config.journal_path = Some(PathBuf::from(path));
        }
        if let Ok(key) = std::env::var("TALLY_AUDIT_KEY") {
            config.audit_key_hex = Some(key);
        }

        config
    }
}
