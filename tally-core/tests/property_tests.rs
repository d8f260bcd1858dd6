//! Property-based tests for engine invariants
//!
//! These use proptest to verify the quantified invariants:
//! - Canonical round-trip: parse(canonical(tx)) == tx
//! - Journal integrity: any appended sequence verifies
//! - Double entry: conservation holds after any successful run
//! - Rollback symmetry: apply-then-rollback is the identity
//! - Merkle completeness: every leaf proves against the root
//! - Encrypted persistence: right password round-trips, wrong one fails
//! - Asset policy: freeze gates validation until unfreeze
//! - Fixed-point text: to_string(from_string(s)) is the normal form of s

use proptest::prelude::*;
use tally_core::{
    Asset, AssetKind, AccountType, Error, FixedPoint, Journal, Ledger, MerkleTree, Transaction,
};

const ACCOUNTS: [&str; 4] = ["alice", "bob", "carol", "dave"];

fn amount_strategy() -> impl Strategy<Value = i64> {
    1i64..1_000_000_000
}

fn account_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(ACCOUNTS.to_vec()).prop_map(str::to_string)
}

fn memo_strategy() -> impl Strategy<Value = Option<String>> {
    prop_oneof![Just(None), "[a-zA-Z0-9 ]{1,24}".prop_map(Some)]
}

fn transaction_strategy() -> impl Strategy<Value = Transaction> {
    (
        amount_strategy(),
        account_strategy(),
        account_strategy(),
        memo_strategy(),
    )
        .prop_map(|(amount, from, to, memo)| Transaction::new(amount, "USD", from, to, memo))
}

fn usd_ledger() -> Ledger {
    let mut ledger = Ledger::new();
    ledger
        .register_asset(Asset::new("USD", AssetKind::Native, "$", "US Dollar", 2).unwrap())
        .unwrap();
    for name in ACCOUNTS {
        ledger
            .create_account(name, AccountType::Asset, "USD")
            .unwrap();
    }
    ledger
}

/// Trim trailing fraction zeros, drop an empty point, collapse -0 to 0
fn normalize(s: &str) -> String {
    let (sign, body) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s),
    };
    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, f.trim_end_matches('0')),
        None => (body, ""),
    };
    let int_part = int_part.trim_start_matches('0');
    let int_part = if int_part.is_empty() { "0" } else { int_part };

    let rendered = if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac_part)
    };
    if rendered == "0" {
        rendered
    } else {
        format!("{}{}", sign, rendered)
    }
}

proptest! {
    /// Canonical JSON round-trips every well-formed transaction
    #[test]
    fn prop_canonical_round_trip(tx in transaction_strategy()) {
        let line = tx.canonical_json();
        let parsed = Transaction::from_canonical(&line).unwrap();
        prop_assert_eq!(parsed, tx);
    }

    /// Any journal built through `append` verifies
    #[test]
    fn prop_journal_integrity(txs in prop::collection::vec(transaction_strategy(), 1..30)) {
        let mut journal = Journal::new();
        for tx in &txs {
            journal.append(tx).unwrap();
        }
        prop_assert_eq!(journal.len(), txs.len());
        prop_assert!(journal.verify_integrity().is_ok());
    }

    /// Conservation holds after any sequence of successful applications
    #[test]
    fn prop_double_entry_preserved(txs in prop::collection::vec(transaction_strategy(), 0..40)) {
        let mut ledger = usd_ledger();
        for tx in &txs {
            ledger.process_transaction(tx).unwrap();
        }
        prop_assert!(ledger.verify_double_entry());
    }

    /// Apply-then-rollback restores every balance and the processed set
    #[test]
    fn prop_rollback_is_identity(tx in transaction_strategy(), funding in amount_strategy()) {
        let mut ledger = usd_ledger();
        ledger.deposit(&tx.from_account, funding).unwrap();

        let before: Vec<i64> = ACCOUNTS
            .iter()
            .map(|name| ledger.balance(name).unwrap())
            .collect();

        ledger.process_with_rollback(&tx).unwrap();
        ledger.rollback(&tx.id).unwrap();

        let after: Vec<i64> = ACCOUNTS
            .iter()
            .map(|name| ledger.balance(name).unwrap())
            .collect();
        prop_assert_eq!(before, after);
        prop_assert!(!ledger.is_processed(&tx.id));
    }

    /// Every transaction in a non-empty batch proves membership
    #[test]
    fn prop_merkle_inclusion(txs in prop::collection::vec(transaction_strategy(), 1..25)) {
        let tree = MerkleTree::from_transactions(&txs);
        let root = tree.root();
        for tx in &txs {
            let proof = tree.proof_for(&tx.hash()).expect("leaf present");
            prop_assert!(proof.verify(&root));
        }
    }

    /// Freeze gates validation until unfreeze
    #[test]
    fn prop_freeze_policy(amount in amount_strategy()) {
        let mut ledger = usd_ledger();
        ledger.registry_mut().freeze("USD").unwrap();
        prop_assert!(matches!(
            ledger.registry().validate_transaction("USD", amount),
            Err(Error::AssetFrozen(_))
        ));

        ledger.registry_mut().unfreeze("USD").unwrap();
        prop_assert!(ledger.registry().validate_transaction("USD", amount).is_ok());
    }

    /// Fixed-point text round-trip yields the normal form
    #[test]
    fn prop_fixed_point_text_round_trip(
        negative in any::<bool>(),
        int_part in 0u64..1_000_000_000,
        frac in "[0-9]{0,8}",
    ) {
        let s = if frac.is_empty() {
            format!("{}{}", if negative { "-" } else { "" }, int_part)
        } else {
            format!("{}{}.{}", if negative { "-" } else { "" }, int_part, frac)
        };
        let parsed = FixedPoint::from_string(&s).unwrap();
        prop_assert_eq!(parsed.to_string(), normalize(&s));
    }

    /// Raw fixed-point values survive render-and-parse
    #[test]
    fn prop_fixed_point_value_round_trip(raw in any::<i32>()) {
        let value = FixedPoint::from_raw(raw as i64);
        let reparsed = FixedPoint::from_string(&value.to_string()).unwrap();
        prop_assert_eq!(reparsed, value);
    }
}

mod encrypted_persistence {
    use super::*;

    // The memory-hard KDF makes each case cost real time; keep the case
    // count low.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_encrypted_round_trip(
            txs in prop::collection::vec(transaction_strategy(), 1..6),
            password in "[a-zA-Z0-9]{4,16}",
        ) {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("journal.sealed");

            let mut journal = Journal::new();
            for tx in &txs {
                journal.append(tx).unwrap();
            }
            journal.save_encrypted(&path, &password).unwrap();

            let reopened = Journal::load_encrypted(&path, &password).unwrap();
            prop_assert_eq!(reopened.len(), txs.len());
            prop_assert!(reopened.verify_integrity().is_ok());

            let wrong = format!("{}x", password);
            prop_assert!(matches!(
                Journal::load_encrypted(&path, &wrong),
                Err(Error::AuthenticationFailed)
            ));
        }
    }
}
