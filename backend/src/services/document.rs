//! Document posting service: purchase receipts, sales invoices, stock
//! adjustments, branch transfers and opening balances
//!
//! Every posting appends its ledger entries and schedules the snapshot
//! refresh in one database transaction, so a failed refresh rolls the
//! whole document back.

use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use shared::validation::{validate_expiry_on_receipt, validate_quantity_positive, validate_unit_cost};

use crate::error::{AppError, AppResult};
use crate::services::ledger::{
    LedgerService, NewLedgerEntry, OpeningCorrection, ReferenceKind, TransactionType,
};
use crate::services::pricing::PricingService;
use crate::services::refresher::SnapshotRefresher;

/// Document service for posting inventory-affecting documents
#[derive(Clone)]
pub struct DocumentService {
    db: PgPool,
    refresher: SnapshotRefresher,
}

/// One received line on a purchase receipt
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseReceiptLine {
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

/// Input for posting a purchase receipt
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseReceiptInput {
    pub branch_id: Uuid,
    pub supplier_name: Option<String>,
    pub lines: Vec<PurchaseReceiptLine>,
}

/// One sold line on a sales invoice
#[derive(Debug, Clone, Deserialize)]
pub struct SalesInvoiceLine {
    pub item_id: Uuid,
    pub quantity: Decimal,
}

/// Input for posting a sales invoice
#[derive(Debug, Clone, Deserialize)]
pub struct SalesInvoiceInput {
    pub branch_id: Uuid,
    pub customer_name: Option<String>,
    pub lines: Vec<SalesInvoiceLine>,
}

/// One adjusted line on a stock adjustment
#[derive(Debug, Clone, Deserialize)]
pub struct AdjustmentLine {
    pub item_id: Uuid,
    /// Signed: positive for count-up, negative for count-down
    pub quantity_delta: Decimal,
    /// Required for positive deltas
    pub unit_cost: Option<Decimal>,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

/// Input for posting a stock adjustment
#[derive(Debug, Clone, Deserialize)]
pub struct StockAdjustmentInput {
    pub branch_id: Uuid,
    pub reason: Option<String>,
    pub lines: Vec<AdjustmentLine>,
}

/// One transferred line
#[derive(Debug, Clone, Deserialize)]
pub struct TransferLine {
    pub item_id: Uuid,
    pub quantity: Decimal,
}

/// Input for posting a branch-to-branch transfer
#[derive(Debug, Clone, Deserialize)]
pub struct TransferInput {
    pub source_branch_id: Uuid,
    pub dest_branch_id: Uuid,
    pub lines: Vec<TransferLine>,
}

/// One opening-balance line
#[derive(Debug, Clone, Deserialize)]
pub struct OpeningBalanceLine {
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

/// Input for recording opening balances at a branch
#[derive(Debug, Clone, Deserialize)]
pub struct OpeningBalanceInput {
    pub branch_id: Uuid,
    pub lines: Vec<OpeningBalanceLine>,
}

/// Input for correcting a posted opening balance
#[derive(Debug, Clone, Deserialize)]
pub struct OpeningCorrectionInput {
    pub entry_id: Uuid,
    pub new_quantity: Decimal,
    pub new_unit_cost: Decimal,
}

/// Result of a posted document
#[derive(Debug, Clone, Serialize)]
pub struct PostedDocument {
    pub reference_id: Uuid,
    pub reference_type: ReferenceKind,
    pub entry_count: usize,
    pub item_ids: Vec<Uuid>,
}

fn field_err(field: &str, message: &str) -> AppError {
    AppError::Validation {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn require_lines<T>(lines: &[T]) -> AppResult<()> {
    if lines.is_empty() {
        return Err(field_err("lines", "Document must have at least one line"));
    }
    Ok(())
}

fn unique_item_ids(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}

impl DocumentService {
    /// Create a new DocumentService instance
    pub fn new(db: PgPool, refresher: SnapshotRefresher) -> Self {
        Self { db, refresher }
    }

    async fn assert_active_branch(
        conn: &mut PgConnection,
        company_id: Uuid,
        branch_id: Uuid,
    ) -> AppResult<()> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM branches WHERE id = $1 AND company_id = $2 AND is_active = true)",
        )
        .bind(branch_id)
        .bind(company_id)
        .fetch_one(conn)
        .await?;

        if !exists {
            return Err(AppError::NotFound("Branch".to_string()));
        }
        Ok(())
    }

    /// Post a goods receipt: one purchase entry per line
    pub async fn post_purchase_receipt(
        &self,
        company_id: Uuid,
        input: PurchaseReceiptInput,
    ) -> AppResult<PostedDocument> {
        require_lines(&input.lines)?;
        let today = Utc::now().date_naive();
        for line in &input.lines {
            validate_quantity_positive(line.quantity).map_err(|m| field_err("quantity", m))?;
            validate_unit_cost(line.unit_cost).map_err(|m| field_err("unit_cost", m))?;
            if let Some(expiry) = line.expiry_date {
                validate_expiry_on_receipt(expiry, today)
                    .map_err(|m| field_err("expiry_date", m))?;
            }
        }

        let mut tx = self.db.begin().await?;
        Self::assert_active_branch(&mut tx, company_id, input.branch_id).await?;

        let reference_id = Uuid::new_v4();
        for line in &input.lines {
            LedgerService::append(
                &mut tx,
                NewLedgerEntry {
                    company_id,
                    branch_id: input.branch_id,
                    item_id: line.item_id,
                    transaction_type: TransactionType::Purchase,
                    quantity_delta: line.quantity,
                    unit_cost: Some(line.unit_cost),
                    batch_number: line.batch_number.clone(),
                    expiry_date: line.expiry_date,
                    reference_type: ReferenceKind::GoodsReceipt,
                    reference_id,
                    created_by: None,
                },
            )
            .await?;
        }

        let item_ids = unique_item_ids(input.lines.iter().map(|l| l.item_id));
        self.refresher
            .schedule_refresh(&mut tx, company_id, input.branch_id, None, Some(&item_ids))
            .await?;

        tx.commit().await?;

        Ok(PostedDocument {
            reference_id,
            reference_type: ReferenceKind::GoodsReceipt,
            entry_count: input.lines.len(),
            item_ids,
        })
    }

    /// Post a sales invoice: one sale entry per line. Available stock is
    /// checked against the ledger inside the posting transaction; the
    /// snapshot is a cache and is never consulted for this decision.
    pub async fn post_sales_invoice(
        &self,
        company_id: Uuid,
        input: SalesInvoiceInput,
    ) -> AppResult<PostedDocument> {
        require_lines(&input.lines)?;
        for line in &input.lines {
            validate_quantity_positive(line.quantity).map_err(|m| field_err("quantity", m))?;
        }

        let mut tx = self.db.begin().await?;
        Self::assert_active_branch(&mut tx, company_id, input.branch_id).await?;

        let reference_id = Uuid::new_v4();
        for line in &input.lines {
            let available =
                LedgerService::sum_quantity(&mut tx, line.item_id, input.branch_id, None).await?;
            if available < line.quantity {
                return Err(AppError::InsufficientStock(format!(
                    "Item {} has {} on hand, requested {}",
                    line.item_id, available, line.quantity
                )));
            }

            LedgerService::append(
                &mut tx,
                NewLedgerEntry {
                    company_id,
                    branch_id: input.branch_id,
                    item_id: line.item_id,
                    transaction_type: TransactionType::Sale,
                    quantity_delta: -line.quantity,
                    unit_cost: None,
                    batch_number: None,
                    expiry_date: None,
                    reference_type: ReferenceKind::SalesInvoice,
                    reference_id,
                    created_by: None,
                },
            )
            .await?;
        }

        let item_ids = unique_item_ids(input.lines.iter().map(|l| l.item_id));
        self.refresher
            .schedule_refresh(&mut tx, company_id, input.branch_id, None, Some(&item_ids))
            .await?;

        tx.commit().await?;

        Ok(PostedDocument {
            reference_id,
            reference_type: ReferenceKind::SalesInvoice,
            entry_count: input.lines.len(),
            item_ids,
        })
    }

    /// Post a stock adjustment with signed deltas
    pub async fn post_stock_adjustment(
        &self,
        company_id: Uuid,
        input: StockAdjustmentInput,
    ) -> AppResult<PostedDocument> {
        require_lines(&input.lines)?;
        for line in &input.lines {
            if line.quantity_delta == Decimal::ZERO {
                return Err(field_err("quantity_delta", "Adjustment delta must be non-zero"));
            }
            if line.quantity_delta > Decimal::ZERO && line.unit_cost.is_none() {
                return Err(field_err(
                    "unit_cost",
                    "Unit cost is required for positive adjustments",
                ));
            }
        }

        let mut tx = self.db.begin().await?;
        Self::assert_active_branch(&mut tx, company_id, input.branch_id).await?;

        let reference_id = Uuid::new_v4();
        for line in &input.lines {
            LedgerService::append(
                &mut tx,
                NewLedgerEntry {
                    company_id,
                    branch_id: input.branch_id,
                    item_id: line.item_id,
                    transaction_type: TransactionType::Adjustment,
                    quantity_delta: line.quantity_delta,
                    unit_cost: line.unit_cost,
                    batch_number: line.batch_number.clone(),
                    expiry_date: line.expiry_date,
                    reference_type: ReferenceKind::StockAdjustment,
                    reference_id,
                    created_by: None,
                },
            )
            .await?;
        }

        let item_ids = unique_item_ids(input.lines.iter().map(|l| l.item_id));
        self.refresher
            .schedule_refresh(&mut tx, company_id, input.branch_id, None, Some(&item_ids))
            .await?;

        tx.commit().await?;

        Ok(PostedDocument {
            reference_id,
            reference_type: ReferenceKind::StockAdjustment,
            entry_count: input.lines.len(),
            item_ids,
        })
    }

    /// Post a branch-to-branch transfer: transfer_out at the source and
    /// transfer_in at the destination, carrying the source's current best
    /// cost so the destination's cost fallback chain keeps working
    pub async fn post_transfer(
        &self,
        company_id: Uuid,
        input: TransferInput,
    ) -> AppResult<PostedDocument> {
        require_lines(&input.lines)?;
        if input.source_branch_id == input.dest_branch_id {
            return Err(field_err(
                "dest_branch_id",
                "Source and destination branches must differ",
            ));
        }
        for line in &input.lines {
            validate_quantity_positive(line.quantity).map_err(|m| field_err("quantity", m))?;
        }

        let mut tx = self.db.begin().await?;
        Self::assert_active_branch(&mut tx, company_id, input.source_branch_id).await?;
        Self::assert_active_branch(&mut tx, company_id, input.dest_branch_id).await?;

        let reference_id = Uuid::new_v4();
        for line in &input.lines {
            let available =
                LedgerService::sum_quantity(&mut tx, line.item_id, input.source_branch_id, None)
                    .await?;
            if available < line.quantity {
                return Err(AppError::InsufficientStock(format!(
                    "Item {} has {} on hand at source branch, requested {}",
                    line.item_id, available, line.quantity
                )));
            }

            let default_cost = sqlx::query_scalar::<_, Option<Decimal>>(
                "SELECT default_cost FROM items WHERE id = $1 AND company_id = $2",
            )
            .bind(line.item_id)
            .bind(company_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Item".to_string()))?;

            let cost = PricingService::best_available_cost(
                &mut tx,
                line.item_id,
                input.source_branch_id,
                default_cost,
            )
            .await?;

            LedgerService::append(
                &mut tx,
                NewLedgerEntry {
                    company_id,
                    branch_id: input.source_branch_id,
                    item_id: line.item_id,
                    transaction_type: TransactionType::TransferOut,
                    quantity_delta: -line.quantity,
                    unit_cost: None,
                    batch_number: None,
                    expiry_date: None,
                    reference_type: ReferenceKind::TransferNote,
                    reference_id,
                    created_by: None,
                },
            )
            .await?;

            LedgerService::append(
                &mut tx,
                NewLedgerEntry {
                    company_id,
                    branch_id: input.dest_branch_id,
                    item_id: line.item_id,
                    transaction_type: TransactionType::TransferIn,
                    quantity_delta: line.quantity,
                    unit_cost: Some(cost),
                    batch_number: None,
                    expiry_date: None,
                    reference_type: ReferenceKind::TransferNote,
                    reference_id,
                    created_by: None,
                },
            )
            .await?;
        }

        let item_ids = unique_item_ids(input.lines.iter().map(|l| l.item_id));
        self.refresher
            .schedule_refresh(
                &mut tx,
                company_id,
                input.source_branch_id,
                None,
                Some(&item_ids),
            )
            .await?;
        self.refresher
            .schedule_refresh(
                &mut tx,
                company_id,
                input.dest_branch_id,
                None,
                Some(&item_ids),
            )
            .await?;

        tx.commit().await?;

        Ok(PostedDocument {
            reference_id,
            reference_type: ReferenceKind::TransferNote,
            entry_count: input.lines.len() * 2,
            item_ids,
        })
    }

    /// Record opening balances for items first tracked at a branch
    pub async fn post_opening_balance(
        &self,
        company_id: Uuid,
        input: OpeningBalanceInput,
    ) -> AppResult<PostedDocument> {
        require_lines(&input.lines)?;
        for line in &input.lines {
            validate_quantity_positive(line.quantity).map_err(|m| field_err("quantity", m))?;
            validate_unit_cost(line.unit_cost).map_err(|m| field_err("unit_cost", m))?;
        }

        let mut tx = self.db.begin().await?;
        Self::assert_active_branch(&mut tx, company_id, input.branch_id).await?;

        let reference_id = Uuid::new_v4();
        for line in &input.lines {
            let already_opened = sqlx::query_scalar::<_, bool>(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM ledger_entries
                    WHERE item_id = $1 AND branch_id = $2
                      AND transaction_type = 'opening_balance'
                )
                "#,
            )
            .bind(line.item_id)
            .bind(input.branch_id)
            .fetch_one(&mut *tx)
            .await?;

            if already_opened {
                return Err(AppError::Conflict(format!(
                    "Item {} already has an opening balance at this branch; correct it instead",
                    line.item_id
                )));
            }

            LedgerService::append(
                &mut tx,
                NewLedgerEntry {
                    company_id,
                    branch_id: input.branch_id,
                    item_id: line.item_id,
                    transaction_type: TransactionType::OpeningBalance,
                    quantity_delta: line.quantity,
                    unit_cost: Some(line.unit_cost),
                    batch_number: line.batch_number.clone(),
                    expiry_date: line.expiry_date,
                    reference_type: ReferenceKind::OpeningBalance,
                    reference_id,
                    created_by: None,
                },
            )
            .await?;
        }

        let item_ids = unique_item_ids(input.lines.iter().map(|l| l.item_id));
        self.refresher
            .schedule_refresh(&mut tx, company_id, input.branch_id, None, Some(&item_ids))
            .await?;

        tx.commit().await?;

        Ok(PostedDocument {
            reference_id,
            reference_type: ReferenceKind::OpeningBalance,
            entry_count: input.lines.len(),
            item_ids,
        })
    }

    /// Correct a posted opening balance. The ledger reports the old-to-new
    /// position delta and the snapshot absorbs it incrementally instead of
    /// a full recompute.
    pub async fn correct_opening_balance(
        &self,
        company_id: Uuid,
        input: OpeningCorrectionInput,
    ) -> AppResult<OpeningCorrection> {
        validate_quantity_positive(input.new_quantity).map_err(|m| field_err("new_quantity", m))?;
        validate_unit_cost(input.new_unit_cost).map_err(|m| field_err("new_unit_cost", m))?;

        let mut tx = self.db.begin().await?;

        let correction = LedgerService::correct_opening_balance(
            &mut tx,
            company_id,
            input.entry_id,
            input.new_quantity,
            input.new_unit_cost,
        )
        .await?;

        SnapshotRefresher::apply_correction_delta(
            &mut tx,
            correction.item_id,
            correction.branch_id,
            correction.quantity_delta,
        )
        .await?;

        tx.commit().await?;

        Ok(correction)
    }
}
