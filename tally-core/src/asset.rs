//! Assets and the asset registry
//!
//! An asset identifies a currency or token and carries the per-asset policy
//! the ledger enforces before applying a transaction: freeze state and the
//! per-transaction amount cap. The registry is the single source of truth
//! for which assets exist.

use crate::fixed::{FixedPoint, SCALE};
use crate::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Asset classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// Chain- or system-native unit of value
    Native,
    /// Issued fungible token
    Token,
    /// Non-fungible token
    NonFungible,
    /// Synthetic / derivative instrument
    Synthetic,
    /// Fiat-pegged stable asset
    Stable,
}

/// Per-asset policy enforced at transaction validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPolicy {
    /// Maximum amount (smallest units) a single transaction may move
    pub max_transaction_amount: Option<i64>,

    /// Daily aggregate limit; informational, not enforced by the kernel
    pub daily_limit: Option<i64>,

    /// Frozen assets reject all transactions
    pub frozen: bool,

    /// Transfers require out-of-band approval
    pub requires_approval: bool,

    /// Only whitelisted accounts may hold the asset
    pub whitelist_only: bool,
}

/// A registered currency or token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Short unique id, e.g. "USD", "BTC"
    pub id: String,

    /// Classification
    pub kind: AssetKind,

    /// Human symbol, e.g. "$"
    pub symbol: String,

    /// Human name
    pub name: String,

    /// Fractional digits of the smallest unit, 0..=18
    pub decimals: u8,

    /// Total supply in smallest units, if capped
    pub total_supply: Option<i64>,

    /// Issuing entity
    pub issuer: Option<String>,

    /// Creation timestamp (seconds since epoch)
    pub created_at: i64,

    /// Enforcement policy
    pub policy: AssetPolicy,
}

impl Asset {
    /// Create an asset with default (permissive) policy
    pub fn new(
        id: impl Into<String>,
        kind: AssetKind,
        symbol: impl Into<String>,
        name: impl Into<String>,
        decimals: u8,
    ) -> Result<Self> {
        if decimals > 18 {
            return Err(Error::Config(format!(
                "asset decimals must be in 0..=18, got {}",
                decimals
            )));
        }
        Ok(Self {
            id: id.into(),
            kind,
            symbol: symbol.into(),
            name: name.into(),
            decimals,
            total_supply: None,
            issuer: None,
            created_at: Utc::now().timestamp(),
            policy: AssetPolicy::default(),
        })
    }

    /// Set the per-transaction amount cap
    pub fn with_transaction_limit(mut self, limit: i64) -> Self {
        self.policy.max_transaction_amount = Some(limit);
        self
    }

    /// Set the issuer
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }
}

/// Exchange rate between two assets at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// Units of the target asset per unit of the source asset
    pub rate: FixedPoint,

    /// When the rate was quoted (seconds since epoch)
    pub quoted_at: i64,
}

/// Advisory conversion table. No transaction ever crosses assets; this
/// exists for reporting only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangeRateTable {
    rates: HashMap<String, ExchangeRate>,
}

impl ExchangeRateTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    fn key(from: &str, to: &str) -> String {
        format!("{}/{}", from, to)
    }

    /// Quote a rate for the (from, to) pair
    pub fn set_rate(&mut self, from: &str, to: &str, rate: FixedPoint) {
        self.rates.insert(
            Self::key(from, to),
            ExchangeRate {
                rate,
                quoted_at: Utc::now().timestamp(),
            },
        );
    }

    /// Look up the quoted rate
    pub fn get_rate(&self, from: &str, to: &str) -> Option<ExchangeRate> {
        self.rates.get(&Self::key(from, to)).copied()
    }

    /// Convert `amount` smallest units of `from` into smallest units of
    /// `to`, flooring the result. Advisory only.
    pub fn convert(&self, amount: i64, from: &str, to: &str) -> Result<i64> {
        let quote = self
            .get_rate(from, to)
            .ok_or_else(|| Error::AssetNotFound(format!("no rate for {}/{}", from, to)))?;
        let wide = (amount as i128 * quote.rate.raw() as i128).div_euclid(SCALE as i128);
        i64::try_from(wide).map_err(|_| Error::Overflow(format!("{} {} -> {}", amount, from, to)))
    }
}

/// Registry of known assets, keyed by id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetRegistry {
    assets: HashMap<String, Asset>,
}

impl AssetRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new asset. Fails if the id is already taken.
    pub fn register(&mut self, asset: Asset) -> Result<()> {
        if self.assets.contains_key(&asset.id) {
            return Err(Error::AssetExists(asset.id));
        }
        tracing::info!(asset = %asset.id, kind = ?asset.kind, "asset registered");
        self.assets.insert(asset.id.clone(), asset);
        Ok(())
    }

    /// Look up an asset by id
    pub fn get(&self, id: &str) -> Option<&Asset> {
        self.assets.get(id)
    }

    /// True if the id is registered
    pub fn contains(&self, id: &str) -> bool {
        self.assets.contains_key(id)
    }

    /// All registered asset ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.assets.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Freeze an asset: all transactions in it are rejected
    pub fn freeze(&mut self, id: &str) -> Result<()> {
        let asset = self
            .assets
            .get_mut(id)
            .ok_or_else(|| Error::AssetNotFound(id.to_string()))?;
        asset.policy.frozen = true;
        tracing::warn!(asset = %id, "asset frozen");
        Ok(())
    }

    /// Lift a freeze
    pub fn unfreeze(&mut self, id: &str) -> Result<()> {
        let asset = self
            .assets
            .get_mut(id)
            .ok_or_else(|| Error::AssetNotFound(id.to_string()))?;
        asset.policy.frozen = false;
        tracing::info!(asset = %id, "asset unfrozen");
        Ok(())
    }

    /// Set or replace the per-transaction amount cap
    pub fn set_transaction_limit(&mut self, id: &str, limit: i64) -> Result<()> {
        let asset = self
            .assets
            .get_mut(id)
            .ok_or_else(|| Error::AssetNotFound(id.to_string()))?;
        asset.policy.max_transaction_amount = Some(limit);
        Ok(())
    }

    /// Validate a transaction amount against the asset's policy.
    ///
    /// Rejection order: unknown asset, frozen asset, amount over the cap.
    pub fn validate_transaction(&self, id: &str, amount: i64) -> Result<()> {
        let asset = self
            .assets
            .get(id)
            .ok_or_else(|| Error::AssetNotFound(id.to_string()))?;

        if asset.policy.frozen {
            return Err(Error::AssetFrozen(id.to_string()));
        }

        if let Some(limit) = asset.policy.max_transaction_amount {
            if amount.abs() > limit {
                return Err(Error::TransactionAmountTooLarge {
                    asset: id.to_string(),
                    amount,
                    limit,
                });
            }
        }

        Ok(())
    }
}
