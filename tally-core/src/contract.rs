//! Contract hook surface
//!
//! The ledger does not interpret contract code, keep contract storage, or
//! schedule execution; an external engine does all of that and reports
//! back through these hooks. The ledger's role is value accounting (gas
//! billing) and attestation (state-change events on the proof chain).

use crate::audit::AuditEventKind;
use crate::ledger::Ledger;
use crate::transaction::Transaction;
use crate::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Ledger-facing record of one contract execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEvent {
    /// Contract address (opaque to the ledger)
    pub address: String,

    /// Gas units consumed
    pub gas_used: u64,

    /// Whether the execution succeeded
    pub success: bool,

    /// Seconds since epoch
    pub timestamp: i64,

    /// Id of the gas-billing transaction, when billing is configured
    pub gas_transaction_id: Option<String>,
}

impl Ledger {
    /// Report a contract execution.
    ///
    /// Always returns the event; when gas billing is configured the
    /// returned transaction has already been applied (payer debited of
    /// `gas_used * gas_price`, gas pool credited) and should be appended
    /// to the journal by the caller. Gas is billed whether or not the
    /// execution succeeded.
    pub fn record_contract_execution(
        &mut self,
        address: &str,
        gas_used: u64,
        success: bool,
    ) -> Result<(ContractEvent, Option<Transaction>)> {
        let gas_tx = match self.gas.clone() {
            Some(gas) if gas_used > 0 => {
                let amount = (gas_used as i128)
                    .checked_mul(gas.gas_price as i128)
                    .and_then(|wide| i64::try_from(wide).ok())
                    .ok_or_else(|| {
                        Error::Overflow(format!("gas bill for {} units", gas_used))
                    })?;

                let tx = Transaction::new(
                    amount,
                    gas.asset,
                    gas.payer_account,
                    gas.pool_account,
                    Some(format!("gas:{}", address)),
                );
                self.process_transaction(&tx)?;
                Some(tx)
            }
            _ => None,
        };

        tracing::debug!(
            contract = %address,
            gas_used,
            success,
            billed = gas_tx.is_some(),
            "contract execution recorded"
        );

        let event = ContractEvent {
            address: address.to_string(),
            gas_used,
            success,
            timestamp: Utc::now().timestamp(),
            gas_transaction_id: gas_tx.as_ref().map(|tx| tx.id.clone()),
        };
        Ok((event, gas_tx))
    }

    /// Attest a contract state-root change on the proof chain
    pub fn record_state_change(&mut self, address: &str, state_hash: &[u8; 32]) {
        self.proof_chain.record(
            AuditEventKind::StateChanged,
            format!("contract={} state={}", address, hex::encode(state_hash)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountType;
    use crate::asset::{Asset, AssetKind};
    use crate::config::GasConfig;

    fn gas_ledger() -> Ledger {
        let mut ledger = Ledger::new().with_gas(GasConfig {
            payer_account: "deployer".to_string(),
            pool_account: "gas-pool".to_string(),
            asset: "GAS".to_string(),
            gas_price: 10,
        });
        ledger
            .register_asset(Asset::new("GAS", AssetKind::Native, "g", "Gas", 8).unwrap())
            .unwrap();
        ledger
            .create_account("deployer", AccountType::Asset, "GAS")
            .unwrap();
        ledger
            .create_account("gas-pool", AccountType::Asset, "GAS")
            .unwrap();
        ledger.deposit("deployer", 1_000_000).unwrap();
        ledger
    }

    #[test]
    fn test_execution_bills_gas() {
        let mut ledger = gas_ledger();

        let (event, tx) = ledger
            .record_contract_execution("0xcafe", 2_500, true)
            .unwrap();

        let tx = tx.unwrap();
        assert_eq!(tx.amount, 25_000);
        assert_eq!(event.gas_transaction_id.as_deref(), Some(tx.id.as_str()));
        assert_eq!(ledger.balance("deployer").unwrap(), 975_000);
        assert_eq!(ledger.balance("gas-pool").unwrap(), 25_000);
        assert!(ledger.verify_double_entry());
    }

    #[test]
    fn test_failed_execution_still_billed() {
        let mut ledger = gas_ledger();
        let (event, tx) = ledger
            .record_contract_execution("0xcafe", 100, false)
            .unwrap();
        assert!(!event.success);
        assert!(tx.is_some());
        assert_eq!(ledger.balance("gas-pool").unwrap(), 1_000);
    }

    #[test]
    fn test_zero_gas_emits_event_only() {
        let mut ledger = gas_ledger();
        let (event, tx) = ledger.record_contract_execution("0xcafe", 0, true).unwrap();
        assert!(tx.is_none());
        assert!(event.gas_transaction_id.is_none());
        assert_eq!(ledger.balance("gas-pool").unwrap(), 0);
    }

    #[test]
    fn test_unconfigured_billing_emits_event_only() {
        let mut ledger = Ledger::new();
        let (event, tx) = ledger
            .record_contract_execution("0xcafe", 9_000, true)
            .unwrap();
        assert!(tx.is_none());
        assert_eq!(event.gas_used, 9_000);
    }

    #[test]
    fn test_state_change_hits_proof_chain() {
        let mut ledger = Ledger::new();
        let before = ledger.proof_chain().len();
        ledger.record_state_change("0xcafe", &[0xab; 32]);

        let entries = ledger.proof_chain().entries();
        assert_eq!(entries.len(), before + 1);
        let last = entries.last().unwrap();
        assert_eq!(last.event_type, AuditEventKind::StateChanged);
        assert!(last.data.contains("0xcafe"));
        assert!(ledger.proof_chain().verify_chain().is_ok());
    }
}
