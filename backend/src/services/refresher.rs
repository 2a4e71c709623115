//! Snapshot refresher: decides between synchronous and queued recomputation
//! and rebuilds snapshot rows from the ledger and pricing resolver

use rust_decimal::Decimal;
use sqlx::{Acquire, FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::ledger::{BatchStock, LedgerService};
use crate::services::pricing::{
    compute_selling_price, effective_margin, resolve_cost, CostInputs, PricingService,
};
use crate::services::refresh_queue::RefreshQueueService;
use crate::services::snapshot::{
    apply_stock_delta, build_search_text, earliest_expiry, upsert_snapshot, SnapshotValues,
};

/// How a refresh request is carried out, derived from its scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshPlan {
    /// Recompute one pair synchronously in the caller's transaction
    SyncItem(Uuid),
    /// Nothing to do
    Noop,
    /// Enqueue one deduplicated job per item (bulk path)
    EnqueueItems(Vec<Uuid>),
    /// Enqueue one deduplicated branch-wide job
    EnqueueBranch,
}

impl RefreshPlan {
    /// Scope detection. A single explicit item, or a one-element list,
    /// refreshes synchronously; longer lists enqueue per-item jobs; no
    /// scope at all enqueues a branch-wide job.
    pub fn from_scope(item_id: Option<Uuid>, item_ids: Option<&[Uuid]>) -> RefreshPlan {
        if let Some(item_id) = item_id {
            return RefreshPlan::SyncItem(item_id);
        }
        match item_ids {
            None => RefreshPlan::EnqueueBranch,
            Some([]) => RefreshPlan::Noop,
            Some([only]) => RefreshPlan::SyncItem(*only),
            Some(many) => RefreshPlan::EnqueueItems(many.to_vec()),
        }
    }
}

/// Item master fields needed to rebuild a snapshot row
#[derive(Debug, Clone, FromRow)]
pub struct ItemMaster {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub sku: String,
    pub barcode: Option<String>,
    pub description: Option<String>,
    pub pack_size: i32,
    pub base_unit: String,
    pub vat_rate: Decimal,
    pub default_cost: Option<Decimal>,
    pub margin_percent: Option<Decimal>,
    pub company_default_margin: Option<Decimal>,
}

/// Combine ledger aggregates and master data into snapshot values.
/// Pure: calling it twice with the same inputs yields the same row,
/// which is what makes the whole refresh path idempotent.
pub fn build_snapshot_values(
    master: &ItemMaster,
    branch_id: Uuid,
    current_stock: Decimal,
    cost_inputs: &CostInputs,
    batches: &[BatchStock],
) -> SnapshotValues {
    let average_cost = resolve_cost(cost_inputs);
    let margin_percent = effective_margin(master.margin_percent, master.company_default_margin);
    let selling_price = compute_selling_price(average_cost, margin_percent);
    let search_text = build_search_text(
        &master.name,
        &master.sku,
        master.barcode.as_deref(),
        master.description.as_deref(),
    );

    SnapshotValues {
        item_id: master.id,
        branch_id,
        company_id: master.company_id,
        item_name: master.name.clone(),
        sku: master.sku.clone(),
        barcode: master.barcode.clone(),
        pack_size: master.pack_size,
        base_unit: master.base_unit.clone(),
        vat_rate: master.vat_rate,
        current_stock,
        average_cost,
        last_purchase_price: cost_inputs.last_purchase_cost,
        margin_percent,
        selling_price,
        next_expiry_date: earliest_expiry(batches),
        search_text,
    }
}

/// Progress of one committed chunk of a branch-wide refresh
#[derive(Debug, Clone, Copy)]
pub struct ChunkOutcome {
    pub refreshed: u64,
    pub next_cursor: Option<Uuid>,
    pub exhausted: bool,
}

/// Snapshot refresher, the write side of the consistency engine
#[derive(Clone)]
pub struct SnapshotRefresher {
    db: PgPool,
    chunk_size: i64,
}

impl SnapshotRefresher {
    /// Create a new SnapshotRefresher instance
    pub fn new(db: PgPool, chunk_size: i64) -> Self {
        Self { db, chunk_size }
    }

    /// Single entry point for write paths. Runs in the caller's
    /// transaction: a synchronous recompute commits or rolls back with
    /// the write that triggered it, and enqueued jobs become visible
    /// only when that write commits.
    pub async fn schedule_refresh(
        &self,
        conn: &mut PgConnection,
        company_id: Uuid,
        branch_id: Uuid,
        item_id: Option<Uuid>,
        item_ids: Option<&[Uuid]>,
    ) -> AppResult<()> {
        match RefreshPlan::from_scope(item_id, item_ids) {
            RefreshPlan::SyncItem(item_id) => {
                Self::refresh_item_sync(conn, company_id, branch_id, item_id).await
            }
            RefreshPlan::Noop => Ok(()),
            RefreshPlan::EnqueueItems(items) => {
                RefreshQueueService::enqueue_items(conn, company_id, branch_id, &items).await
            }
            RefreshPlan::EnqueueBranch => {
                RefreshQueueService::enqueue_branch(conn, company_id, branch_id, None).await
            }
        }
    }

    /// Recompute one pair from the ledger and upsert the snapshot row.
    /// Errors propagate so the enclosing transaction rolls back rather
    /// than leaving the ledger and snapshot divergent.
    pub async fn refresh_item_sync(
        conn: &mut PgConnection,
        company_id: Uuid,
        branch_id: Uuid,
        item_id: Uuid,
    ) -> AppResult<()> {
        let master = sqlx::query_as::<_, ItemMaster>(
            r#"
            SELECT i.id, i.company_id, i.name, i.sku, i.barcode, i.description,
                   i.pack_size, i.base_unit, i.vat_rate, i.default_cost, i.margin_percent,
                   c.default_margin_percent AS company_default_margin
            FROM items i
            JOIN companies c ON c.id = i.company_id
            WHERE i.id = $1 AND i.company_id = $2
            "#,
        )
        .bind(item_id)
        .bind(company_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Item".to_string()))?;

        let current_stock = LedgerService::sum_quantity(&mut *conn, item_id, branch_id, None).await?;
        let cost_inputs =
            PricingService::gather_cost_inputs(&mut *conn, item_id, branch_id, master.default_cost)
                .await?;
        let batches = LedgerService::batch_stock(&mut *conn, item_id, branch_id).await?;

        let values = build_snapshot_values(&master, branch_id, current_stock, &cost_inputs, &batches);
        upsert_snapshot(conn, &values).await
    }

    /// Variant for call sites that must not fail the primary write when
    /// the refresh does (e.g. a deploy window before migrations run).
    /// Logs and discards the error; the pair stays stale until a later
    /// refresh covers it.
    pub async fn refresh_item_safe(&self, company_id: Uuid, branch_id: Uuid, item_id: Uuid) {
        let result = async {
            let mut conn = self.db.acquire().await?;
            Self::refresh_item_sync(&mut conn, company_id, branch_id, item_id).await?;
            Ok::<_, AppError>(())
        }
        .await;

        if let Err(e) = result {
            tracing::warn!(
                %company_id, %branch_id, %item_id, error = %e,
                "Snapshot refresh failed; snapshot left stale"
            );
        }
    }

    /// Apply an opening-balance correction delta to the snapshot without
    /// a full recompute
    pub async fn apply_correction_delta(
        conn: &mut PgConnection,
        item_id: Uuid,
        branch_id: Uuid,
        delta: Decimal,
    ) -> AppResult<()> {
        apply_stock_delta(conn, item_id, branch_id, delta).await
    }

    /// Recompute every active item of a branch in fixed-size chunks,
    /// committing per chunk so a large branch never holds one long
    /// transaction.
    pub async fn refresh_branch(&self, company_id: Uuid, branch_id: Uuid) -> AppResult<u64> {
        let mut refreshed: u64 = 0;
        let mut cursor: Option<Uuid> = None;

        loop {
            let chunk = self.refresh_chunk(company_id, branch_id, cursor).await?;
            refreshed += chunk.refreshed;
            cursor = chunk.next_cursor;
            if chunk.exhausted {
                break;
            }
        }

        Ok(refreshed)
    }

    /// Process one chunk of a branch-wide refresh in its own committed
    /// transaction. A failing item is logged and skipped; the chunk
    /// continues under its own savepoint.
    pub async fn refresh_chunk(
        &self,
        company_id: Uuid,
        branch_id: Uuid,
        after: Option<Uuid>,
    ) -> AppResult<ChunkOutcome> {
        let page = self.active_item_page(company_id, after).await?;
        if page.is_empty() {
            return Ok(ChunkOutcome {
                refreshed: 0,
                next_cursor: after,
                exhausted: true,
            });
        }

        let mut refreshed: u64 = 0;
        let mut tx = self.db.begin().await?;
        for item_id in &page {
            let mut sp = tx.begin().await?;
            match Self::refresh_item_sync(&mut sp, company_id, branch_id, *item_id).await {
                Ok(()) => {
                    sp.commit().await?;
                    refreshed += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        %company_id, %branch_id, %item_id, error = %e,
                        "Skipping item in branch-wide refresh chunk"
                    );
                    sp.rollback().await?;
                }
            }
        }
        tx.commit().await?;

        Ok(ChunkOutcome {
            refreshed,
            next_cursor: page.last().copied(),
            exhausted: (page.len() as i64) < self.chunk_size,
        })
    }

    /// Best-effort snapshot seeding for a newly created item. Uses the
    /// safe variant per branch: the item row is already committed and a
    /// seeding failure only delays searchability until the next refresh.
    pub async fn seed_item_snapshots(&self, company_id: Uuid, item_id: Uuid) -> AppResult<()> {
        let branch_ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM branches WHERE company_id = $1 AND is_active = true ORDER BY id",
        )
        .bind(company_id)
        .fetch_all(&self.db)
        .await?;

        for branch_id in branch_ids {
            self.refresh_item_safe(company_id, branch_id, item_id).await;
        }

        Ok(())
    }

    /// Item-edit convenience path: synchronously refresh one item across
    /// every active branch of its company. Not queued; bounded by branch
    /// count.
    pub async fn refresh_item_all_branches(
        &self,
        company_id: Uuid,
        item_id: Uuid,
    ) -> AppResult<u64> {
        let branch_ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM branches WHERE company_id = $1 AND is_active = true ORDER BY id",
        )
        .bind(company_id)
        .fetch_all(&self.db)
        .await?;

        let mut refreshed: u64 = 0;
        for branch_id in branch_ids {
            let mut tx = self.db.begin().await?;
            Self::refresh_item_sync(&mut tx, company_id, branch_id, item_id).await?;
            tx.commit().await?;
            refreshed += 1;
        }

        Ok(refreshed)
    }

    /// One keyset page of active item ids for chunked branch processing
    async fn active_item_page(
        &self,
        company_id: Uuid,
        after: Option<Uuid>,
    ) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM items
            WHERE company_id = $1 AND is_active = true
              AND ($2::uuid IS NULL OR id > $2)
            ORDER BY id ASC
            LIMIT $3
            "#,
        )
        .bind(company_id)
        .bind(after)
        .bind(self.chunk_size)
        .fetch_all(&self.db)
        .await?;

        Ok(ids)
    }
}
