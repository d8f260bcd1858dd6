//! On-disk ledger state for the CLI
//!
//! Account and asset definitions live in `accounts.json`; balances are
//! never stored, they are rebuilt by replaying `journal.jsonl` on open.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tally_core::{
    Asset, AssetKind, AccountType, Error, Journal, Ledger, Result,
};

/// Persisted definitions (no balances)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    /// Registered assets
    pub assets: Vec<Asset>,
    /// Account definitions
    pub accounts: Vec<AccountDef>,
}

/// One persisted account definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDef {
    /// Account name
    pub name: String,
    /// Accounting classification
    pub account_type: AccountType,
    /// Asset id
    pub currency: String,
}

/// CLI state directory
#[derive(Debug, Clone)]
pub struct Store {
    data_dir: PathBuf,
}

impl Store {
    /// Bind to a data directory, creating it if needed
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    fn state_path(&self) -> PathBuf {
        self.data_dir.join("accounts.json")
    }

    /// Path of the plaintext journal
    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join("journal.jsonl")
    }

    /// Read the persisted definitions
    pub fn state(&self) -> Result<StoreState> {
        let path = self.state_path();
        if !path.exists() {
            return Ok(StoreState::default());
        }
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| Error::MalformedRecord {
            line: 0,
            reason: format!("{}: {}", path.display(), e),
        })
    }

    /// Write the definitions back
    pub fn save_state(&self, state: &StoreState) -> Result<()> {
        let json = serde_json::to_string_pretty(state).map_err(Error::from)?;
        std::fs::write(self.state_path(), json)?;
        Ok(())
    }

    /// Rebuild the live ledger and journal: register assets, create
    /// accounts, then replay every journal transaction in order
    pub fn load(&self) -> Result<(Ledger, Journal)> {
        let state = self.state()?;

        let mut ledger = Ledger::new();
        for asset in &state.assets {
            ledger.register_asset(asset.clone())?;
        }
        for def in &state.accounts {
            ledger.create_account(&def.name, def.account_type, &def.currency)?;
        }

        let journal_path = self.journal_path();
        let journal = if journal_path.exists() {
            let journal = Journal::load_plain(&journal_path)?;
            for entry in journal.entries() {
                ledger.process_transaction(&entry.transaction)?;
            }
            journal
        } else {
            Journal::with_path(&journal_path)
        };

        Ok((ledger, journal))
    }

    /// Add an account definition, registering its currency on first use
    pub fn add_account(&self, name: &str, account_type: AccountType, currency: &str) -> Result<()> {
        let mut state = self.state()?;

        if state.accounts.iter().any(|def| def.name == name) {
            return Err(Error::AccountExists(name.to_string()));
        }
        if !state.assets.iter().any(|asset| asset.id == currency) {
            state
                .assets
                .push(Asset::new(currency, AssetKind::Native, currency, currency, 2)?);
        }
        state.accounts.push(AccountDef {
            name: name.to_string(),
            account_type,
            currency: currency.to_string(),
        });

        self.save_state(&state)
    }
}
