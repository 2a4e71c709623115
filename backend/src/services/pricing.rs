//! Pricing resolver: best available cost and selling price computation

use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AppResult;

/// Cost candidates gathered from the ledger and item master, in
/// fallback order: each is consulted only when the previous is absent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostInputs {
    pub last_purchase_cost: Option<Decimal>,
    pub opening_balance_cost: Option<Decimal>,
    pub weighted_average_cost: Option<Decimal>,
    pub default_cost: Option<Decimal>,
}

/// Resolve the best available cost. Never fails: falls through to zero
/// when no candidate has data.
pub fn resolve_cost(inputs: &CostInputs) -> Decimal {
    inputs
        .last_purchase_cost
        .or(inputs.opening_balance_cost)
        .or(inputs.weighted_average_cost)
        .or(inputs.default_cost)
        .unwrap_or(Decimal::ZERO)
}

/// Selling price from cost and margin percent. `None` margin means the
/// price is not computable, which is distinct from a zero price.
pub fn compute_selling_price(cost: Decimal, margin_percent: Option<Decimal>) -> Option<Decimal> {
    margin_percent.map(|margin| cost * (Decimal::ONE + margin / Decimal::from(100)))
}

/// Item-level margin wins over the company-wide default
pub fn effective_margin(
    item_margin: Option<Decimal>,
    company_default: Option<Decimal>,
) -> Option<Decimal> {
    item_margin.or(company_default)
}

/// Pricing resolver backed by the ledger
pub struct PricingService;

impl PricingService {
    /// Most recent purchase cost for a pair, if any
    pub async fn last_purchase_cost(
        conn: &mut PgConnection,
        item_id: Uuid,
        branch_id: Uuid,
    ) -> AppResult<Option<Decimal>> {
        let cost = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT unit_cost
            FROM ledger_entries
            WHERE item_id = $1 AND branch_id = $2
              AND transaction_type = 'purchase' AND quantity_delta > 0
              AND unit_cost IS NOT NULL
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(item_id)
        .bind(branch_id)
        .fetch_optional(conn)
        .await?;

        Ok(cost)
    }

    /// Gather all cost candidates for a pair in one pass
    pub async fn gather_cost_inputs(
        conn: &mut PgConnection,
        item_id: Uuid,
        branch_id: Uuid,
        default_cost: Option<Decimal>,
    ) -> AppResult<CostInputs> {
        let last_purchase_cost = Self::last_purchase_cost(&mut *conn, item_id, branch_id).await?;

        let opening_balance_cost = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT unit_cost
            FROM ledger_entries
            WHERE item_id = $1 AND branch_id = $2
              AND transaction_type = 'opening_balance' AND unit_cost IS NOT NULL
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(item_id)
        .bind(branch_id)
        .fetch_optional(&mut *conn)
        .await?;

        let weighted_average_cost = sqlx::query_scalar::<_, Option<Decimal>>(
            r#"
            SELECT CASE
                WHEN SUM(quantity_delta) > 0
                THEN SUM(quantity_delta * unit_cost) / SUM(quantity_delta)
            END
            FROM ledger_entries
            WHERE item_id = $1 AND branch_id = $2
              AND quantity_delta > 0 AND unit_cost IS NOT NULL
            "#,
        )
        .bind(item_id)
        .bind(branch_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(CostInputs {
            last_purchase_cost,
            opening_balance_cost,
            weighted_average_cost,
            default_cost,
        })
    }

    /// Best available cost for a pair with the full fallback chain
    pub async fn best_available_cost(
        conn: &mut PgConnection,
        item_id: Uuid,
        branch_id: Uuid,
        default_cost: Option<Decimal>,
    ) -> AppResult<Decimal> {
        let inputs = Self::gather_cost_inputs(conn, item_id, branch_id, default_cost).await?;
        Ok(resolve_cost(&inputs))
    }
}
