//! Snapshot refresher tests
//!
//! Tests for the consistency engine including:
//! - Scope detection (sync vs. queued vs. no-op)
//! - Snapshot value building as a pure, idempotent function
//! - Search text construction and abbreviation expansion
//! - Next-expiry derivation from batch stock

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use pharmacy_erp_backend::services::ledger::BatchStock;
use pharmacy_erp_backend::services::pricing::CostInputs;
use pharmacy_erp_backend::services::refresher::{
    build_snapshot_values, ItemMaster, RefreshPlan,
};
use pharmacy_erp_backend::services::snapshot::{build_search_text, earliest_expiry};

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn master(name: &str, sku: &str) -> ItemMaster {
    ItemMaster {
        id: Uuid::new_v4(),
        company_id: Uuid::new_v4(),
        name: name.to_string(),
        sku: sku.to_string(),
        barcode: Some("8850999320014".to_string()),
        description: None,
        pack_size: 10,
        base_unit: "tab".to_string(),
        vat_rate: dec("7"),
        default_cost: None,
        margin_percent: Some(dec("30")),
        company_default_margin: Some(dec("20")),
    }
}

fn batch(batch_number: &str, expiry: Option<NaiveDate>, remaining: &str) -> BatchStock {
    BatchStock {
        batch_number: Some(batch_number.to_string()),
        expiry_date: expiry,
        remaining_quantity: dec(remaining),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// An explicit item id always refreshes synchronously
    #[test]
    fn test_scope_explicit_item() {
        let item = Uuid::new_v4();
        assert_eq!(
            RefreshPlan::from_scope(Some(item), None),
            RefreshPlan::SyncItem(item)
        );
        // An empty list alongside the id makes no difference
        assert_eq!(
            RefreshPlan::from_scope(Some(item), Some(&[])),
            RefreshPlan::SyncItem(item)
        );
    }

    /// An empty item list is a no-op
    #[test]
    fn test_scope_empty_list() {
        assert_eq!(RefreshPlan::from_scope(None, Some(&[])), RefreshPlan::Noop);
    }

    /// A one-element list refreshes synchronously, same as an explicit id
    #[test]
    fn test_scope_single_element_list() {
        let item = Uuid::new_v4();
        assert_eq!(
            RefreshPlan::from_scope(None, Some(&[item])),
            RefreshPlan::SyncItem(item)
        );
    }

    /// A longer list enqueues one job per item
    #[test]
    fn test_scope_bulk_list() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(
            RefreshPlan::from_scope(None, Some(&[a, b])),
            RefreshPlan::EnqueueItems(vec![a, b])
        );
    }

    /// No scope at all means a branch-wide job
    #[test]
    fn test_scope_branch_wide() {
        assert_eq!(RefreshPlan::from_scope(None, None), RefreshPlan::EnqueueBranch);
    }

    /// Scenario: a branch-wide call enqueues one job; a two-item call
    /// enqueues two jobs, never one combined job
    #[test]
    fn test_scope_job_counts() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        match RefreshPlan::from_scope(None, None) {
            RefreshPlan::EnqueueBranch => {} // exactly one branch job
            other => panic!("expected branch job, got {:?}", other),
        }
        match RefreshPlan::from_scope(None, Some(&[a, b])) {
            RefreshPlan::EnqueueItems(items) => assert_eq!(items.len(), 2),
            other => panic!("expected per-item jobs, got {:?}", other),
        }
    }

    /// Snapshot build carries the ledger stock through unchanged
    #[test]
    fn test_snapshot_stock_passthrough() {
        let m = master("Paracetamol 500mg", "PCM-500-TAB");
        let inputs = CostInputs {
            last_purchase_cost: Some(dec("10")),
            ..CostInputs::default()
        };
        let values = build_snapshot_values(&m, Uuid::new_v4(), dec("70"), &inputs, &[]);

        assert_eq!(values.current_stock, dec("70"));
        assert_eq!(values.average_cost, dec("10"));
        assert_eq!(values.last_purchase_price, Some(dec("10")));
    }

    /// Item margin wins over the company default in the built row
    #[test]
    fn test_snapshot_margin_and_price() {
        let m = master("Ibuprofen 400mg", "IBU-400-TAB");
        let inputs = CostInputs {
            last_purchase_cost: Some(dec("100")),
            ..CostInputs::default()
        };
        let values = build_snapshot_values(&m, Uuid::new_v4(), dec("5"), &inputs, &[]);

        assert_eq!(values.margin_percent, Some(dec("30")));
        assert_eq!(values.selling_price, Some(dec("130.00")));
    }

    /// Company default margin applies when the item has none
    #[test]
    fn test_snapshot_company_margin_fallback() {
        let mut m = master("Cetirizine 10mg", "CET-10-TAB");
        m.margin_percent = None;
        let inputs = CostInputs {
            last_purchase_cost: Some(dec("50")),
            ..CostInputs::default()
        };
        let values = build_snapshot_values(&m, Uuid::new_v4(), dec("5"), &inputs, &[]);

        assert_eq!(values.margin_percent, Some(dec("20")));
        assert_eq!(values.selling_price, Some(dec("60.00")));
    }

    /// Building twice from the same inputs yields an identical row
    #[test]
    fn test_snapshot_build_idempotent() {
        let m = master("Amoxicillin 500mg", "AMOX-500-CAP");
        let branch_id = Uuid::new_v4();
        let inputs = CostInputs {
            last_purchase_cost: Some(dec("4.25")),
            opening_balance_cost: Some(dec("4.00")),
            weighted_average_cost: Some(dec("4.10")),
            default_cost: Some(dec("3.50")),
        };
        let batches = vec![batch(
            "LOT-44",
            NaiveDate::from_ymd_opt(2027, 3, 31),
            "120",
        )];

        let first = build_snapshot_values(&m, branch_id, dec("120"), &inputs, &batches);
        let second = build_snapshot_values(&m, branch_id, dec("120"), &inputs, &batches);

        assert_eq!(first, second);
    }

    /// Next expiry is the minimum over batches with remaining stock
    #[test]
    fn test_next_expiry_is_min() {
        let batches = vec![
            batch("B1", NaiveDate::from_ymd_opt(2027, 6, 30), "10"),
            batch("B2", NaiveDate::from_ymd_opt(2026, 12, 1), "5"),
            batch("B3", None, "40"),
        ];
        assert_eq!(
            earliest_expiry(&batches),
            NaiveDate::from_ymd_opt(2026, 12, 1)
        );
    }

    /// No dated batches means no next expiry
    #[test]
    fn test_next_expiry_empty() {
        assert_eq!(earliest_expiry(&[]), None);
        assert_eq!(earliest_expiry(&[batch("B1", None, "10")]), None);
    }

    /// Search text contains every identifying field, lowercased
    #[test]
    fn test_search_text_fields() {
        let text = build_search_text(
            "Paracetamol 500mg",
            "PCM-500-TAB",
            Some("8850999320014"),
            Some("Analgesic"),
        );
        assert!(text.contains("paracetamol 500mg"));
        assert!(text.contains("pcm-500-tab"));
        assert!(text.contains("8850999320014"));
        assert!(text.contains("analgesic"));
    }

    /// Abbreviation expansion lets short queries match long drug names
    #[test]
    fn test_search_text_abbreviations() {
        let text = build_search_text("Chlorpheniramine 4mg tablet", "CHLOR-4", None, None);
        assert!(text.contains("cpm"));
        assert!(text.contains("tab"));

        let text = build_search_text("Salbutamol syrup", "SAL-SYR", None, None);
        assert!(text.contains("salbu"));
    }

    /// Names without known abbreviations gain nothing extra
    #[test]
    fn test_search_text_no_spurious_expansion() {
        let text = build_search_text("Gauze pad", "GAUZE-01", None, None);
        assert_eq!(text, "gauze pad gauze-01");
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn stock_strategy() -> impl Strategy<Value = Decimal> {
        (-100_000i64..=100_000i64).prop_map(|n| Decimal::new(n, 2))
    }

    fn name_strategy() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 ]{0,30}"
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The built snapshot always reports exactly the ledger stock
        #[test]
        fn prop_snapshot_reports_ledger_stock(stock in stock_strategy()) {
            let m = master("Omeprazole 20mg", "OME-20-CAP");
            let values =
                build_snapshot_values(&m, Uuid::new_v4(), stock, &CostInputs::default(), &[]);
            prop_assert_eq!(values.current_stock, stock);
        }

        /// Snapshot building is deterministic for arbitrary names
        #[test]
        fn prop_snapshot_build_deterministic(name in name_strategy(), stock in stock_strategy()) {
            let m = master(&name, "SKU-1");
            let branch_id = Uuid::new_v4();
            let first =
                build_snapshot_values(&m, branch_id, stock, &CostInputs::default(), &[]);
            let second =
                build_snapshot_values(&m, branch_id, stock, &CostInputs::default(), &[]);
            prop_assert_eq!(first, second);
        }

        /// Search text always contains the lowercased name and sku
        #[test]
        fn prop_search_text_contains_identifiers(name in name_strategy()) {
            let text = build_search_text(&name, "SKU-9", None, None);
            prop_assert!(text.contains(&name.to_lowercase()));
            prop_assert!(text.contains("sku-9"));
        }

        /// The earliest expiry never postdates any batch expiry
        #[test]
        fn prop_earliest_expiry_lower_bound(
            days in prop::collection::vec(0u64..3000, 1..10)
        ) {
            let base = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
            let batches: Vec<BatchStock> = days
                .iter()
                .map(|d| batch("B", Some(base + chrono::Days::new(*d)), "1"))
                .collect();

            let min = earliest_expiry(&batches).unwrap();
            for b in &batches {
                prop_assert!(min <= b.expiry_date.unwrap());
            }
        }
    }
}
