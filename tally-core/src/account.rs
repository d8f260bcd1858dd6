//! Accounts and debit/credit rules
//!
//! Accounts follow standard accounting conventions: the account type
//! determines whether a debit raises or lowers the balance.

use crate::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Accounting classification of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Resources held by the system
    Asset,
    /// Obligations owed to others
    Liability,
    /// Owner's stake
    Equity,
    /// Income earned
    Revenue,
    /// Costs incurred
    Expense,
}

impl AccountType {
    /// True if a debit increases the balance for this type.
    ///
    /// Assets and expenses grow on debit; liabilities, equity, and revenue
    /// grow on credit.
    pub fn debit_increases(&self) -> bool {
        matches!(self, AccountType::Asset | AccountType::Expense)
    }

    /// Parse from the lowercase tag used on the CLI surface
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asset" => Some(AccountType::Asset),
            "liability" => Some(AccountType::Liability),
            "equity" => Some(AccountType::Equity),
            "revenue" => Some(AccountType::Revenue),
            "expense" => Some(AccountType::Expense),
            _ => None,
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Revenue => "revenue",
            AccountType::Expense => "expense",
        };
        write!(f, "{}", tag)
    }
}

/// Named, typed holder of a balance in one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account name
    pub name: String,

    /// Asset the balance is denominated in
    pub currency: String,

    /// Creation timestamp (seconds since epoch)
    pub created_at: i64,

    /// Accounting classification
    pub account_type: AccountType,

    /// Balance in the asset's smallest unit; sign follows the type's
    /// normal-balance convention
    pub balance: i64,
}

impl Account {
    /// Create an account with zero balance
    pub fn new(
        name: impl Into<String>,
        account_type: AccountType,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            currency: currency.into(),
            created_at: Utc::now().timestamp(),
            account_type,
            balance: 0,
        }
    }

    /// Apply a debit of `amount` smallest units
    pub fn debit(&mut self, amount: i64) -> Result<()> {
        self.balance = if self.account_type.debit_increases() {
            self.balance.checked_add(amount)
        } else {
            self.balance.checked_sub(amount)
        }
        .ok_or_else(|| Error::Overflow(format!("debit {} on {}", amount, self.name)))?;
        Ok(())
    }

    /// Apply a credit of `amount` smallest units (inverse of debit)
    pub fn credit(&mut self, amount: i64) -> Result<()> {
        self.balance = if self.account_type.debit_increases() {
            self.balance.checked_sub(amount)
        } else {
            self.balance.checked_add(amount)
        }
        .ok_or_else(|| Error::Overflow(format!("credit {} on {}", amount, self.name)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debit_increases_asset() {
        let mut account = Account::new("cash", AccountType::Asset, "USD");
        account.debit(100).unwrap();
        assert_eq!(account.balance, 100);
        account.credit(30).unwrap();
        assert_eq!(account.balance, 70);
    }

    #[test]
    fn test_debit_decreases_liability() {
        let mut account = Account::new("loans", AccountType::Liability, "USD");
        account.credit(500).unwrap();
        assert_eq!(account.balance, 500);
        account.debit(200).unwrap();
        assert_eq!(account.balance, 300);
    }

    #[test]
    fn test_sign_conventions() {
        assert!(AccountType::Asset.debit_increases());
        assert!(AccountType::Expense.debit_increases());
        assert!(!AccountType::Liability.debit_increases());
        assert!(!AccountType::Equity.debit_increases());
        assert!(!AccountType::Revenue.debit_increases());
    }

    #[test]
    fn test_parse_type() {
        assert_eq!(AccountType::parse("asset"), Some(AccountType::Asset));
        assert_eq!(AccountType::parse("REVENUE"), Some(AccountType::Revenue));
        assert_eq!(AccountType::parse("piggybank"), None);
    }

    #[test]
    fn test_debit_overflow_is_error() {
        let mut account = Account::new("cash", AccountType::Asset, "USD");
        account.balance = i64::MAX;
        assert!(account.debit(1).is_err());
        // Balance untouched on failure
        assert_eq!(account.balance, i64::MAX);
    }
}
