//! The accounting kernel
//!
//! A [`Ledger`] owns the accounts, the asset registry, the set of processed
//! transaction ids, and the rollback snapshots for in-flight transactions.
//! It is a single-threaded synchronous engine: every call either completes
//! or fails with a typed error before returning, and no state mutates on a
//! validation failure.
//!
//! Processing a transaction credits the source and debits the destination
//! under the account-type sign rules, so the double-entry equation
//!
//! ```text
//! Σ(asset) = Σ(liability) + Σ(equity) + Σ(revenue) − Σ(expense)
//! ```
//!
//! holds at every quiescent moment.

use crate::account::{Account, AccountType};
use crate::asset::{Asset, AssetRegistry};
use crate::audit::{AuditEventKind, AuditProofChain};
use crate::config::GasConfig;
use crate::transaction::Transaction;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Captured prior balance of one account touched by a pending transaction
#[derive(Debug, Clone, PartialEq, Eq)]
struct AccountSnapshot {
    name: String,
    balance: i64,
}

/// One row of a trial balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    /// Account name
    pub name: String,
    /// Accounting classification
    pub account_type: AccountType,
    /// Balance in smallest units
    pub balance: i64,
    /// Asset id
    pub currency: String,
}

/// In-memory double-entry ledger
#[derive(Debug, Default)]
pub struct Ledger {
    pub(crate) accounts: HashMap<String, Account>,
    pub(crate) registry: AssetRegistry,
    processed: HashSet<String>,
    snapshots: HashMap<String, Vec<AccountSnapshot>>,
    pub(crate) proof_chain: AuditProofChain,
    pub(crate) gas: Option<GasConfig>,
}

impl Ledger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable gas billing for contract executions
    pub fn with_gas(mut self, gas: GasConfig) -> Self {
        self.gas = Some(gas);
        self
    }

    // --- assets -----------------------------------------------------------

    /// Register an asset and record the event
    pub fn register_asset(&mut self, asset: Asset) -> Result<()> {
        let id = asset.id.clone();
        self.registry.register(asset)?;
        self.proof_chain
            .record(AuditEventKind::AssetRegistered, format!("asset={}", id));
        Ok(())
    }

    /// Read access to the asset registry
    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    /// Mutable access to the asset registry (freeze, limits)
    pub fn registry_mut(&mut self) -> &mut AssetRegistry {
        &mut self.registry
    }

    // --- accounts ---------------------------------------------------------

    /// Create an account holding a registered asset
    pub fn create_account(
        &mut self,
        name: impl Into<String>,
        account_type: AccountType,
        currency: impl Into<String>,
    ) -> Result<()> {
        let name = name.into();
        let currency = currency.into();

        if self.accounts.contains_key(&name) {
            return Err(Error::AccountExists(name));
        }
        if !self.registry.contains(&currency) {
            return Err(Error::AssetNotFound(currency));
        }

        tracing::info!(account = %name, kind = %account_type, %currency, "account created");
        self.proof_chain.record(
            AuditEventKind::AccountCreated,
            format!("account={} type={}", name, account_type),
        );
        self.accounts
            .insert(name.clone(), Account::new(name, account_type, currency));
        Ok(())
    }

    /// Look up an account
    pub fn account(&self, name: &str) -> Option<&Account> {
        self.accounts.get(name)
    }

    /// All accounts, sorted by name
    pub fn accounts(&self) -> Vec<&Account> {
        let mut all: Vec<&Account> = self.accounts.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Current balance of an account
    pub fn balance(&self, name: &str) -> Result<i64> {
        self.accounts
            .get(name)
            .map(|account| account.balance)
            .ok_or_else(|| Error::AccountNotFound(name.to_string()))
    }

    /// Fund an account directly (a debit under its type's sign rule),
    /// outside transaction processing
    pub fn deposit(&mut self, name: &str, amount: i64) -> Result<()> {
        let account = self
            .accounts
            .get_mut(name)
            .ok_or_else(|| Error::AccountNotFound(name.to_string()))?;
        account.debit(amount)?;
        self.proof_chain.record(
            AuditEventKind::BalanceUpdated,
            format!("account={} amount={}", name, amount),
        );
        Ok(())
    }

    // --- transaction processing -------------------------------------------

    /// True if the transaction id has been applied
    pub fn is_processed(&self, id: &str) -> bool {
        self.processed.contains(id)
    }

    /// Apply a transaction.
    ///
    /// Validation order: dependency, asset policy, account existence and
    /// currency. Nothing mutates until every check passes.
    pub fn process_transaction(&mut self, tx: &Transaction) -> Result<()> {
        if let Some(dependency) = &tx.depends_on {
            if !self.processed.contains(dependency) {
                return Err(Error::DependencyNotFound(dependency.clone()));
            }
        }

        self.registry.validate_transaction(&tx.currency, tx.amount)?;

        let (new_from, new_to) = self.movement_balances(tx)?;
        if tx.from_account == tx.to_account {
            if let Some(account) = self.accounts.get_mut(&tx.to_account) {
                account.balance = new_to;
            }
        } else {
            if let Some(account) = self.accounts.get_mut(&tx.from_account) {
                account.balance = new_from;
            }
            if let Some(account) = self.accounts.get_mut(&tx.to_account) {
                account.balance = new_to;
            }
        }

        self.processed.insert(tx.id.clone());
        tracing::info!(tx = %tx.id, amount = tx.amount, currency = %tx.currency, "transaction processed");
        self.proof_chain.record(
            AuditEventKind::TransactionProcessed,
            format!("tx={} amount={}", tx.id, tx.amount),
        );
        Ok(())
    }

    /// Post-movement balances: credit the source, debit the destination.
    /// Pure computation; nothing is written.
    fn movement_balances(&self, tx: &Transaction) -> Result<(i64, i64)> {
        let from = self
            .accounts
            .get(&tx.from_account)
            .ok_or_else(|| Error::FromAccountNotFound(tx.from_account.clone()))?;
        if from.currency != tx.currency {
            return Err(Error::CurrencyMismatch {
                account: from.name.clone(),
                held: from.currency.clone(),
                moved: tx.currency.clone(),
            });
        }

        let to = self
            .accounts
            .get(&tx.to_account)
            .ok_or_else(|| Error::ToAccountNotFound(tx.to_account.clone()))?;
        if to.currency != tx.currency {
            return Err(Error::CurrencyMismatch {
                account: to.name.clone(),
                held: to.currency.clone(),
                moved: tx.currency.clone(),
            });
        }

        let new_from = balance_after(from.account_type, from.balance, tx.amount, Side::Credit)?;
        // A self-transfer debits the already-credited balance
        let to_base = if tx.from_account == tx.to_account {
            new_from
        } else {
            to.balance
        };
        let new_to = balance_after(to.account_type, to_base, tx.amount, Side::Debit)?;
        Ok((new_from, new_to))
    }

    /// Apply a transaction with a rollback snapshot of the affected
    /// accounts. On failure the snapshot is restored and the original error
    /// returned; on success the snapshot stays until [`Ledger::commit`] or
    /// [`Ledger::rollback`].
    pub fn process_with_rollback(&mut self, tx: &Transaction) -> Result<()> {
        let mut snapshot = Vec::with_capacity(2);
        if let Some(account) = self.accounts.get(&tx.from_account) {
            snapshot.push(AccountSnapshot {
                name: account.name.clone(),
                balance: account.balance,
            });
        }
        if tx.to_account != tx.from_account {
            if let Some(account) = self.accounts.get(&tx.to_account) {
                snapshot.push(AccountSnapshot {
                    name: account.name.clone(),
                    balance: account.balance,
                });
            }
        }
        self.snapshots.insert(tx.id.clone(), snapshot);

        match self.process_transaction(tx) {
            Ok(()) => Ok(()),
            Err(err) => {
                if let Some(snapshot) = self.snapshots.remove(&tx.id) {
                    self.restore(&snapshot);
                }
                Err(err)
            }
        }
    }

    /// Drop the snapshot for a successfully applied transaction
    pub fn commit(&mut self, tx_id: &str) -> Result<()> {
        self.snapshots
            .remove(tx_id)
            .map(|_| ())
            .ok_or_else(|| Error::SnapshotNotFound(tx_id.to_string()))
    }

    /// Undo a transaction applied through [`Ledger::process_with_rollback`]:
    /// restore every snapshotted balance and remove the id from the
    /// processed set
    pub fn rollback(&mut self, tx_id: &str) -> Result<()> {
        let snapshot = self
            .snapshots
            .remove(tx_id)
            .ok_or_else(|| Error::SnapshotNotFound(tx_id.to_string()))?;
        self.restore(&snapshot);
        self.processed.remove(tx_id);

        tracing::warn!(tx = %tx_id, "transaction rolled back");
        self.proof_chain.record(
            AuditEventKind::TransactionRolledBack,
            format!("tx={}", tx_id),
        );
        Ok(())
    }

    fn restore(&mut self, snapshot: &[AccountSnapshot]) {
        for captured in snapshot {
            if let Some(account) = self.accounts.get_mut(&captured.name) {
                account.balance = captured.balance;
            }
        }
    }

    // --- reporting --------------------------------------------------------

    /// The accounting correctness gate:
    /// `Σ(asset) = Σ(liability) + Σ(equity) + Σ(revenue) − Σ(expense)`
    pub fn verify_double_entry(&self) -> bool {
        let mut sums: HashMap<AccountType, i128> = HashMap::new();
        for account in self.accounts.values() {
            *sums.entry(account.account_type).or_insert(0) += account.balance as i128;
        }
        let total = |t: AccountType| sums.get(&t).copied().unwrap_or(0);

        total(AccountType::Asset)
            == total(AccountType::Liability) + total(AccountType::Equity)
                + total(AccountType::Revenue)
                - total(AccountType::Expense)
    }

    /// Enumerate all accounts as trial-balance rows, sorted by name
    pub fn trial_balance(&self) -> Vec<TrialBalanceRow> {
        let mut rows: Vec<TrialBalanceRow> = self
            .accounts
            .values()
            .map(|account| TrialBalanceRow {
                name: account.name.clone(),
                account_type: account.account_type,
                balance: account.balance,
                currency: account.currency.clone(),
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    /// Record an operator checkpoint and return the proof-chain tip hash
    pub fn checkpoint(&mut self) -> String {
        let data = format!(
            "accounts={} processed={}",
            self.accounts.len(),
            self.processed.len()
        );
        self.proof_chain
            .record(AuditEventKind::SystemCheckpoint, data)
            .hash
            .clone()
    }

    /// The operational event chain
    pub fn proof_chain(&self) -> &AuditProofChain {
        &self.proof_chain
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Debit,
    Credit,
}

/// Balance after applying one side of a movement under the type's sign rule
fn balance_after(account_type: AccountType, balance: i64, amount: i64, side: Side) -> Result<i64> {
    let increases = (side == Side::Debit) == account_type.debit_increases();
    let result = if increases {
        balance.checked_add(amount)
    } else {
        balance.checked_sub(amount)
    };
    result.ok_or_else(|| Error::Overflow(format!("balance update by {}", amount)))
}
