//! Append-only inventory ledger, the source of truth for stock and cost history

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use shared::DateRange;

use crate::error::{AppError, AppResult};

/// Ledger service for appending and querying inventory movements
#[derive(Clone)]
pub struct LedgerService {
    db: PgPool,
}

/// Ledger transaction types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ledger_transaction_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Purchase,
    Sale,
    Adjustment,
    OpeningBalance,
    TransferIn,
    TransferOut,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Purchase => "purchase",
            TransactionType::Sale => "sale",
            TransactionType::Adjustment => "adjustment",
            TransactionType::OpeningBalance => "opening_balance",
            TransactionType::TransferIn => "transfer_in",
            TransactionType::TransferOut => "transfer_out",
        }
    }
}

/// Kind of source document a ledger entry references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ledger_reference_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    GoodsReceipt,
    PurchaseInvoice,
    SalesInvoice,
    SalesReturn,
    StockAdjustment,
    TransferNote,
    OpeningBalance,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::GoodsReceipt => "goods_receipt",
            ReferenceKind::PurchaseInvoice => "purchase_invoice",
            ReferenceKind::SalesInvoice => "sales_invoice",
            ReferenceKind::SalesReturn => "sales_return",
            ReferenceKind::StockAdjustment => "stock_adjustment",
            ReferenceKind::TransferNote => "transfer_note",
            ReferenceKind::OpeningBalance => "opening_balance",
        }
    }
}

impl std::str::FromStr for ReferenceKind {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "goods_receipt" => Ok(ReferenceKind::GoodsReceipt),
            "purchase_invoice" => Ok(ReferenceKind::PurchaseInvoice),
            "sales_invoice" => Ok(ReferenceKind::SalesInvoice),
            "sales_return" => Ok(ReferenceKind::SalesReturn),
            "stock_adjustment" => Ok(ReferenceKind::StockAdjustment),
            "transfer_note" => Ok(ReferenceKind::TransferNote),
            "opening_balance" => Ok(ReferenceKind::OpeningBalance),
            _ => Err("Unknown reference kind"),
        }
    }
}

/// An immutable ledger entry
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub company_id: Uuid,
    pub branch_id: Uuid,
    pub item_id: Uuid,
    pub transaction_type: TransactionType,
    pub quantity_delta: Decimal,
    pub unit_cost: Option<Decimal>,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub reference_type: ReferenceKind,
    pub reference_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

/// Input for appending a ledger entry
#[derive(Debug, Clone, Deserialize)]
pub struct NewLedgerEntry {
    pub company_id: Uuid,
    pub branch_id: Uuid,
    pub item_id: Uuid,
    pub transaction_type: TransactionType,
    pub quantity_delta: Decimal,
    pub unit_cost: Option<Decimal>,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub reference_type: ReferenceKind,
    pub reference_id: Uuid,
    pub created_by: Option<Uuid>,
}

/// Remaining stock of one batch at a branch
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BatchStock {
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub remaining_quantity: Decimal,
}

/// Result of an opening-balance correction: the position delta the
/// snapshot can apply incrementally instead of a full recompute
#[derive(Debug, Clone, Serialize)]
pub struct OpeningCorrection {
    pub entry_id: Uuid,
    pub item_id: Uuid,
    pub branch_id: Uuid,
    pub quantity_delta: Decimal,
}

impl LedgerService {
    /// Create a new LedgerService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Append an entry within the caller's transaction scope
    pub async fn append(
        conn: &mut PgConnection,
        entry: NewLedgerEntry,
    ) -> AppResult<LedgerEntry> {
        if entry.quantity_delta == Decimal::ZERO {
            return Err(AppError::Validation {
                field: "quantity_delta".to_string(),
                message: "Quantity delta must be non-zero".to_string(),
            });
        }
        if entry.quantity_delta > Decimal::ZERO && entry.unit_cost.is_none() {
            return Err(AppError::Validation {
                field: "unit_cost".to_string(),
                message: "Unit cost is required for stock inflows".to_string(),
            });
        }

        let entry = sqlx::query_as::<_, LedgerEntry>(
            r#"
            INSERT INTO ledger_entries (
                company_id, branch_id, item_id, transaction_type, quantity_delta,
                unit_cost, batch_number, expiry_date, reference_type, reference_id, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, company_id, branch_id, item_id, transaction_type, quantity_delta,
                      unit_cost, batch_number, expiry_date, reference_type, reference_id,
                      created_at, created_by
            "#,
        )
        .bind(entry.company_id)
        .bind(entry.branch_id)
        .bind(entry.item_id)
        .bind(entry.transaction_type)
        .bind(entry.quantity_delta)
        .bind(entry.unit_cost)
        .bind(&entry.batch_number)
        .bind(entry.expiry_date)
        .bind(entry.reference_type)
        .bind(entry.reference_id)
        .bind(entry.created_by)
        .fetch_one(conn)
        .await?;

        Ok(entry)
    }

    /// Current stock of a pair as the sum of all quantity deltas,
    /// optionally as of a point in time
    pub async fn sum_quantity(
        conn: &mut PgConnection,
        item_id: Uuid,
        branch_id: Uuid,
        as_of: Option<DateTime<Utc>>,
    ) -> AppResult<Decimal> {
        let sum = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(quantity_delta), 0)
            FROM ledger_entries
            WHERE item_id = $1 AND branch_id = $2
              AND ($3::timestamptz IS NULL OR created_at <= $3)
            "#,
        )
        .bind(item_id)
        .bind(branch_id)
        .bind(as_of)
        .fetch_one(conn)
        .await?;

        Ok(sum)
    }

    /// Movements for a pair in (created_at, id) order, the deterministic
    /// ordering running-balance reports depend on
    pub async fn query_movements(
        &self,
        company_id: Uuid,
        branch_id: Uuid,
        item_id: Uuid,
        range: DateRange,
    ) -> AppResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, company_id, branch_id, item_id, transaction_type, quantity_delta,
                   unit_cost, batch_number, expiry_date, reference_type, reference_id,
                   created_at, created_by
            FROM ledger_entries
            WHERE company_id = $1 AND branch_id = $2 AND item_id = $3
              AND ($4::date IS NULL OR created_at::date >= $4)
              AND ($5::date IS NULL OR created_at::date <= $5)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(company_id)
        .bind(branch_id)
        .bind(item_id)
        .bind(range.start_date)
        .bind(range.end_date)
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }

    /// Batches of a pair that still have stock, earliest expiry first
    pub async fn batch_stock(
        conn: &mut PgConnection,
        item_id: Uuid,
        branch_id: Uuid,
    ) -> AppResult<Vec<BatchStock>> {
        let batches = sqlx::query_as::<_, BatchStock>(
            r#"
            SELECT batch_number, expiry_date, SUM(quantity_delta) AS remaining_quantity
            FROM ledger_entries
            WHERE item_id = $1 AND branch_id = $2
            GROUP BY batch_number, expiry_date
            HAVING SUM(quantity_delta) > 0
            ORDER BY expiry_date ASC NULLS LAST, batch_number ASC NULLS LAST
            "#,
        )
        .bind(item_id)
        .bind(branch_id)
        .fetch_all(conn)
        .await?;

        Ok(batches)
    }

    /// The documented exception to append-only: correct an opening balance
    /// in place and report the old-to-new position delta so the snapshot
    /// can be adjusted incrementally
    pub async fn correct_opening_balance(
        conn: &mut PgConnection,
        company_id: Uuid,
        entry_id: Uuid,
        new_quantity: Decimal,
        new_unit_cost: Decimal,
    ) -> AppResult<OpeningCorrection> {
        let existing = sqlx::query_as::<_, (Uuid, Uuid, TransactionType, Decimal)>(
            r#"
            SELECT item_id, branch_id, transaction_type, quantity_delta
            FROM ledger_entries
            WHERE id = $1 AND company_id = $2
            FOR UPDATE
            "#,
        )
        .bind(entry_id)
        .bind(company_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Ledger entry".to_string()))?;

        if existing.2 != TransactionType::OpeningBalance {
            return Err(AppError::ImmutableEntry(format!(
                "Only opening balance entries may be corrected, not {}",
                existing.2.as_str()
            )));
        }
        if new_quantity <= Decimal::ZERO {
            return Err(AppError::Validation {
                field: "new_quantity".to_string(),
                message: "Corrected opening balance must be positive".to_string(),
            });
        }

        sqlx::query(
            "UPDATE ledger_entries SET quantity_delta = $1, unit_cost = $2 WHERE id = $3",
        )
        .bind(new_quantity)
        .bind(new_unit_cost)
        .bind(entry_id)
        .execute(conn)
        .await?;

        Ok(OpeningCorrection {
            entry_id,
            item_id: existing.0,
            branch_id: existing.1,
            quantity_delta: new_quantity - existing.3,
        })
    }
}

/// Fold an ordered entry sequence into per-row running balances
pub fn running_balances(opening_balance: Decimal, entries: &[LedgerEntry]) -> Vec<Decimal> {
    let mut balance = opening_balance;
    entries
        .iter()
        .map(|e| {
            balance += e.quantity_delta;
            balance
        })
        .collect()
}
