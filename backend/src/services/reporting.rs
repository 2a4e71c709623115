//! Reporting service: movement history, batch stock and snapshot
//! reconciliation diagnostics
//!
//! Reports read the ledger directly for historical accuracy; only the
//! reconciliation view touches the snapshot table, to compare it against
//! the ledger.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shared::DateRange;

use crate::error::{AppError, AppResult};
use crate::services::ledger::{running_balances, LedgerService, ReferenceKind, TransactionType};

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
}

/// One movement row with its running balance
#[derive(Debug, Clone, Serialize)]
pub struct MovementRow {
    pub entry_id: Uuid,
    pub transaction_type: TransactionType,
    pub quantity_delta: Decimal,
    pub unit_cost: Option<Decimal>,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub reference_type: ReferenceKind,
    pub reference_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub running_balance: Decimal,
}

/// Item movement report for one pair over a date range
#[derive(Debug, Clone, Serialize)]
pub struct MovementReport {
    pub item_id: Uuid,
    pub branch_id: Uuid,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    pub rows: Vec<MovementRow>,
}

/// Batch-level stock for reporting screens
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BatchReportRow {
    pub item_id: Uuid,
    pub item_name: String,
    pub sku: String,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub remaining_quantity: Decimal,
}

/// A snapshot row whose stock disagrees with the ledger
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DriftRow {
    pub item_id: Uuid,
    pub sku: String,
    pub snapshot_stock: Decimal,
    pub ledger_stock: Decimal,
}

/// Reconciliation between expected and actual snapshot rows for a branch
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub active_items: i64,
    pub snapshot_rows: i64,
    pub missing_snapshots: i64,
    pub drifted: Vec<DriftRow>,
}

impl ReportingService {
    /// Create a new ReportingService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Movement report for one pair: opening balance before the range,
    /// then every movement in (created_at, id) order with running balance
    pub async fn movement_report(
        &self,
        company_id: Uuid,
        branch_id: Uuid,
        item_id: Uuid,
        range: DateRange,
    ) -> AppResult<MovementReport> {
        let opening_balance = match range.start_date {
            Some(start) => {
                sqlx::query_scalar::<_, Decimal>(
                    r#"
                    SELECT COALESCE(SUM(quantity_delta), 0)
                    FROM ledger_entries
                    WHERE company_id = $1 AND branch_id = $2 AND item_id = $3
                      AND created_at::date < $4
                    "#,
                )
                .bind(company_id)
                .bind(branch_id)
                .bind(item_id)
                .bind(start)
                .fetch_one(&self.db)
                .await?
            }
            None => Decimal::ZERO,
        };

        let ledger = LedgerService::new(self.db.clone());
        let entries = ledger
            .query_movements(company_id, branch_id, item_id, range)
            .await?;

        let balances = running_balances(opening_balance, &entries);
        let closing_balance = balances.last().copied().unwrap_or(opening_balance);

        let rows = entries
            .into_iter()
            .zip(balances)
            .map(|(e, running_balance)| MovementRow {
                entry_id: e.id,
                transaction_type: e.transaction_type,
                quantity_delta: e.quantity_delta,
                unit_cost: e.unit_cost,
                batch_number: e.batch_number,
                expiry_date: e.expiry_date,
                reference_type: e.reference_type,
                reference_id: e.reference_id,
                created_at: e.created_at,
                running_balance,
            })
            .collect();

        Ok(MovementReport {
            item_id,
            branch_id,
            opening_balance,
            closing_balance,
            rows,
        })
    }

    /// Export a movement report as CSV
    pub fn export_movements_csv(report: &MovementReport) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);

        wtr.write_record([
            "entry_id",
            "transaction_type",
            "quantity_delta",
            "unit_cost",
            "batch_number",
            "expiry_date",
            "reference_type",
            "reference_id",
            "created_at",
            "running_balance",
        ])
        .map_err(|e| AppError::Internal(format!("CSV export failed: {}", e)))?;

        for row in &report.rows {
            wtr.write_record([
                row.entry_id.to_string(),
                row.transaction_type.as_str().to_string(),
                row.quantity_delta.to_string(),
                row.unit_cost.map(|c| c.to_string()).unwrap_or_default(),
                row.batch_number.clone().unwrap_or_default(),
                row.expiry_date.map(|d| d.to_string()).unwrap_or_default(),
                row.reference_type.as_str().to_string(),
                row.reference_id.to_string(),
                row.created_at.to_rfc3339(),
                row.running_balance.to_string(),
            ])
            .map_err(|e| AppError::Internal(format!("CSV export failed: {}", e)))?;
        }

        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV export failed: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("CSV export failed: {}", e)))
    }

    /// Batches with remaining stock at a branch, earliest expiry first
    pub async fn batch_report(
        &self,
        company_id: Uuid,
        branch_id: Uuid,
        item_id: Option<Uuid>,
    ) -> AppResult<Vec<BatchReportRow>> {
        let rows = sqlx::query_as::<_, BatchReportRow>(
            r#"
            SELECT le.item_id, i.name AS item_name, i.sku,
                   le.batch_number, le.expiry_date,
                   SUM(le.quantity_delta) AS remaining_quantity
            FROM ledger_entries le
            JOIN items i ON i.id = le.item_id
            WHERE le.company_id = $1 AND le.branch_id = $2
              AND ($3::uuid IS NULL OR le.item_id = $3)
            GROUP BY le.item_id, i.name, i.sku, le.batch_number, le.expiry_date
            HAVING SUM(le.quantity_delta) > 0
            ORDER BY le.expiry_date ASC NULLS LAST, i.name ASC
            "#,
        )
        .bind(company_id)
        .bind(branch_id)
        .bind(item_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Compare expected snapshot coverage against actual rows for a
    /// branch. Bulk refresh failures are invisible to end users; this is
    /// the operational view that surfaces them.
    pub async fn reconciliation(
        &self,
        company_id: Uuid,
        branch_id: Uuid,
    ) -> AppResult<ReconciliationReport> {
        let active_items = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM items WHERE company_id = $1 AND is_active = true",
        )
        .bind(company_id)
        .fetch_one(&self.db)
        .await?;

        let snapshot_rows = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM item_snapshots WHERE company_id = $1 AND branch_id = $2",
        )
        .bind(company_id)
        .bind(branch_id)
        .fetch_one(&self.db)
        .await?;

        let missing_snapshots = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM items i
            WHERE i.company_id = $1 AND i.is_active = true
              AND NOT EXISTS (
                  SELECT 1 FROM item_snapshots s
                  WHERE s.item_id = i.id AND s.branch_id = $2
              )
            "#,
        )
        .bind(company_id)
        .bind(branch_id)
        .fetch_one(&self.db)
        .await?;

        let drifted = sqlx::query_as::<_, DriftRow>(
            r#"
            SELECT s.item_id, s.sku, s.current_stock AS snapshot_stock,
                   COALESCE(l.ledger_stock, 0) AS ledger_stock
            FROM item_snapshots s
            LEFT JOIN (
                SELECT item_id, SUM(quantity_delta) AS ledger_stock
                FROM ledger_entries
                WHERE company_id = $1 AND branch_id = $2
                GROUP BY item_id
            ) l ON l.item_id = s.item_id
            WHERE s.company_id = $1 AND s.branch_id = $2
              AND s.current_stock <> COALESCE(l.ledger_stock, 0)
            ORDER BY s.sku
            "#,
        )
        .bind(company_id)
        .bind(branch_id)
        .fetch_all(&self.db)
        .await?;

        Ok(ReconciliationReport {
            active_items,
            snapshot_rows,
            missing_snapshots,
            drifted,
        })
    }
}
