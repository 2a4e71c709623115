//! Pricing resolver tests
//!
//! Tests for cost resolution including:
//! - Fallback order: last purchase, opening balance, weighted average,
//!   item default, zero
//! - Selling price computation from cost and margin
//! - Margin precedence between item and company settings

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use pharmacy_erp_backend::services::pricing::{
    compute_selling_price, effective_margin, resolve_cost, CostInputs,
};

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Last purchase cost wins when present
    #[test]
    fn test_last_purchase_cost_preferred() {
        let inputs = CostInputs {
            last_purchase_cost: Some(dec("12.00")),
            opening_balance_cost: Some(dec("8.00")),
            weighted_average_cost: Some(dec("10.00")),
            default_cost: Some(dec("5.00")),
        };
        assert_eq!(resolve_cost(&inputs), dec("12.00"));
    }

    /// Opening balance cost is checked before the weighted average,
    /// even when an average could be computed
    #[test]
    fn test_opening_balance_before_weighted_average() {
        let inputs = CostInputs {
            last_purchase_cost: None,
            opening_balance_cost: Some(dec("8.00")),
            weighted_average_cost: Some(dec("10.00")),
            default_cost: None,
        };
        assert_eq!(resolve_cost(&inputs), dec("8.00"));
    }

    /// Weighted average applies when no purchase or opening cost exists
    #[test]
    fn test_weighted_average_fallback() {
        let inputs = CostInputs {
            last_purchase_cost: None,
            opening_balance_cost: None,
            weighted_average_cost: Some(dec("9.50")),
            default_cost: Some(dec("5.00")),
        };
        assert_eq!(resolve_cost(&inputs), dec("9.50"));
    }

    /// Item default applies when the ledger has no cost data
    #[test]
    fn test_item_default_fallback() {
        let inputs = CostInputs {
            last_purchase_cost: None,
            opening_balance_cost: None,
            weighted_average_cost: None,
            default_cost: Some(dec("5.00")),
        };
        assert_eq!(resolve_cost(&inputs), dec("5.00"));
    }

    /// The resolver never fails: an empty ledger and no default yields zero
    #[test]
    fn test_zero_fallback() {
        assert_eq!(resolve_cost(&CostInputs::default()), Decimal::ZERO);
    }

    /// Scenario: purchase +100 @ 10 then sale -30 leaves the last
    /// purchase cost of 10 as the resolved cost
    #[test]
    fn test_purchase_then_sale_scenario() {
        let inputs = CostInputs {
            last_purchase_cost: Some(dec("10")),
            opening_balance_cost: None,
            weighted_average_cost: Some(dec("10")),
            default_cost: None,
        };
        assert_eq!(resolve_cost(&inputs), dec("10"));
    }

    /// Scenario: opening +50 @ 8 and purchase +50 @ 12. The purchase is
    /// the most recent inflow so its cost wins over both the opening cost
    /// and the 10.00 weighted average.
    #[test]
    fn test_opening_plus_purchase_scenario() {
        let inputs = CostInputs {
            last_purchase_cost: Some(dec("12")),
            opening_balance_cost: Some(dec("8")),
            weighted_average_cost: Some(dec("10")),
            default_cost: None,
        };
        assert_eq!(resolve_cost(&inputs), dec("12"));
    }

    /// Selling price is cost plus margin
    #[test]
    fn test_selling_price_computation() {
        assert_eq!(
            compute_selling_price(dec("100"), Some(dec("35"))),
            Some(dec("135.00"))
        );
        assert_eq!(
            compute_selling_price(dec("10"), Some(Decimal::ZERO)),
            Some(dec("10.0"))
        );
    }

    /// Undefined margin means the price is not computable, not zero
    #[test]
    fn test_selling_price_undefined_margin() {
        assert_eq!(compute_selling_price(dec("100"), None), None);
    }

    /// Item margin wins over the company default
    #[test]
    fn test_effective_margin_precedence() {
        assert_eq!(
            effective_margin(Some(dec("40")), Some(dec("25"))),
            Some(dec("40"))
        );
        assert_eq!(effective_margin(None, Some(dec("25"))), Some(dec("25")));
        assert_eq!(effective_margin(None, None), None);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for generating valid costs
    fn cost_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=1_000_000i64).prop_map(|n| Decimal::new(n, 2)) // 0.01 to 10000.00
    }

    /// Strategy for generating optional costs
    fn opt_cost_strategy() -> impl Strategy<Value = Option<Decimal>> {
        prop_oneof![Just(None), cost_strategy().prop_map(Some)]
    }

    /// Strategy for generating margins
    fn margin_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=50_000i64).prop_map(|n| Decimal::new(n, 2)) // 0.00 to 500.00
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The resolved cost is always one of the candidates, or zero
        /// when there are none
        #[test]
        fn prop_resolved_cost_is_a_candidate(
            last in opt_cost_strategy(),
            opening in opt_cost_strategy(),
            average in opt_cost_strategy(),
            default in opt_cost_strategy()
        ) {
            let inputs = CostInputs {
                last_purchase_cost: last,
                opening_balance_cost: opening,
                weighted_average_cost: average,
                default_cost: default,
            };
            let resolved = resolve_cost(&inputs);

            let candidates = [last, opening, average, default];
            if candidates.iter().all(Option::is_none) {
                prop_assert_eq!(resolved, Decimal::ZERO);
            } else {
                prop_assert!(candidates.contains(&Some(resolved)));
            }
        }

        /// A present last purchase cost always wins
        #[test]
        fn prop_last_purchase_always_wins(
            last in cost_strategy(),
            opening in opt_cost_strategy(),
            average in opt_cost_strategy(),
            default in opt_cost_strategy()
        ) {
            let inputs = CostInputs {
                last_purchase_cost: Some(last),
                opening_balance_cost: opening,
                weighted_average_cost: average,
                default_cost: default,
            };
            prop_assert_eq!(resolve_cost(&inputs), last);
        }

        /// Earlier fallback levels are never skipped: with no purchase
        /// cost, a present opening cost always wins
        #[test]
        fn prop_opening_wins_without_purchase(
            opening in cost_strategy(),
            average in opt_cost_strategy(),
            default in opt_cost_strategy()
        ) {
            let inputs = CostInputs {
                last_purchase_cost: None,
                opening_balance_cost: Some(opening),
                weighted_average_cost: average,
                default_cost: default,
            };
            prop_assert_eq!(resolve_cost(&inputs), opening);
        }

        /// Selling price is never below cost for non-negative margins
        #[test]
        fn prop_selling_price_at_least_cost(
            cost in cost_strategy(),
            margin in margin_strategy()
        ) {
            let price = compute_selling_price(cost, Some(margin)).unwrap();
            prop_assert!(price >= cost);
        }

        /// Selling price grows with margin
        #[test]
        fn prop_selling_price_monotonic_in_margin(
            cost in cost_strategy(),
            margin in margin_strategy(),
            extra in margin_strategy()
        ) {
            let lower = compute_selling_price(cost, Some(margin)).unwrap();
            let higher = compute_selling_price(cost, Some(margin + extra)).unwrap();
            prop_assert!(higher >= lower);
        }

        /// Undefined margin never produces a price
        #[test]
        fn prop_no_margin_no_price(cost in cost_strategy()) {
            prop_assert_eq!(compute_selling_price(cost, None), None);
        }
    }
}
