//! Ledger tests
//!
//! Tests for the append-only ledger including:
//! - Running balance computation over (created_at, id) ordered entries
//! - Stock as the sum of quantity deltas
//! - Reference kind round-trips

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use pharmacy_erp_backend::services::ledger::{
    running_balances, LedgerEntry, ReferenceKind, TransactionType,
};

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn entry(transaction_type: TransactionType, delta: &str, cost: Option<&str>) -> LedgerEntry {
    LedgerEntry {
        id: Uuid::new_v4(),
        company_id: Uuid::new_v4(),
        branch_id: Uuid::new_v4(),
        item_id: Uuid::new_v4(),
        transaction_type,
        quantity_delta: dec(delta),
        unit_cost: cost.map(dec),
        batch_number: None,
        expiry_date: None,
        reference_type: ReferenceKind::StockAdjustment,
        reference_id: Uuid::new_v4(),
        created_at: Utc.timestamp_opt(1_770_000_000, 0).unwrap(),
        created_by: None,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Scenario: purchase +100 @ 10 then sale -30 leaves 70 on hand
    #[test]
    fn test_purchase_then_sale_balance() {
        let entries = vec![
            entry(TransactionType::Purchase, "100", Some("10")),
            entry(TransactionType::Sale, "-30", None),
        ];
        let balances = running_balances(Decimal::ZERO, &entries);
        assert_eq!(balances, vec![dec("100"), dec("70")]);
    }

    /// Running balances accumulate in entry order from the opening balance
    #[test]
    fn test_running_balance_accumulation() {
        let entries = vec![
            entry(TransactionType::OpeningBalance, "50", Some("8")),
            entry(TransactionType::Purchase, "30", Some("9")),
            entry(TransactionType::Sale, "-20", None),
            entry(TransactionType::Adjustment, "-5", None),
        ];
        let balances = running_balances(Decimal::ZERO, &entries);
        assert_eq!(
            balances,
            vec![dec("50"), dec("80"), dec("60"), dec("55")]
        );
    }

    /// A report range carries its pre-range stock as the opening balance
    #[test]
    fn test_running_balance_with_opening() {
        let entries = vec![entry(TransactionType::Sale, "-10", None)];
        let balances = running_balances(dec("25"), &entries);
        assert_eq!(balances, vec![dec("15")]);
    }

    /// No entries, no rows
    #[test]
    fn test_running_balance_empty() {
        assert!(running_balances(dec("40"), &[]).is_empty());
    }

    /// Transaction types serialize to their snake_case tags
    #[test]
    fn test_transaction_type_tags() {
        assert_eq!(TransactionType::Purchase.as_str(), "purchase");
        assert_eq!(TransactionType::OpeningBalance.as_str(), "opening_balance");
        assert_eq!(TransactionType::TransferIn.as_str(), "transfer_in");
        assert_eq!(TransactionType::TransferOut.as_str(), "transfer_out");
    }

    /// Every reference kind round-trips through its string tag
    #[test]
    fn test_reference_kind_round_trip() {
        let kinds = [
            ReferenceKind::GoodsReceipt,
            ReferenceKind::PurchaseInvoice,
            ReferenceKind::SalesInvoice,
            ReferenceKind::SalesReturn,
            ReferenceKind::StockAdjustment,
            ReferenceKind::TransferNote,
            ReferenceKind::OpeningBalance,
        ];
        for kind in kinds {
            assert_eq!(kind.as_str().parse::<ReferenceKind>().unwrap(), kind);
        }
        assert!("sales_order".parse::<ReferenceKind>().is_err());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn delta_strategy() -> impl Strategy<Value = Decimal> {
        (-10_000i64..=10_000i64)
            .prop_filter("ledger deltas are non-zero", |n| *n != 0)
            .prop_map(|n| Decimal::new(n, 2))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The final running balance equals opening plus the sum of all
        /// deltas, for any sequence of appends
        #[test]
        fn prop_final_balance_is_sum(
            opening in -10_000i64..=10_000i64,
            deltas in prop::collection::vec(delta_strategy(), 1..30)
        ) {
            let opening = Decimal::new(opening, 2);
            let entries: Vec<LedgerEntry> = deltas
                .iter()
                .map(|d| {
                    let e = entry(TransactionType::Adjustment, "1", Some("1"));
                    LedgerEntry { quantity_delta: *d, ..e }
                })
                .collect();

            let balances = running_balances(opening, &entries);
            let total: Decimal = deltas.iter().sum();

            prop_assert_eq!(balances.len(), entries.len());
            prop_assert_eq!(*balances.last().unwrap(), opening + total);
        }

        /// Each running balance step moves by exactly that entry's delta
        #[test]
        fn prop_balance_steps_match_deltas(
            deltas in prop::collection::vec(delta_strategy(), 2..20)
        ) {
            let entries: Vec<LedgerEntry> = deltas
                .iter()
                .map(|d| {
                    let e = entry(TransactionType::Adjustment, "1", Some("1"));
                    LedgerEntry { quantity_delta: *d, ..e }
                })
                .collect();

            let balances = running_balances(Decimal::ZERO, &entries);
            for i in 1..balances.len() {
                prop_assert_eq!(balances[i] - balances[i - 1], deltas[i]);
            }
        }
    }
}
