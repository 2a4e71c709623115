//! Denormalized per-(item, branch) snapshot rows: the read-optimized cache
//! over the ledger used by search and stock display

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::ledger::BatchStock;

/// Snapshot service for reading the denormalized rows
#[derive(Clone)]
pub struct SnapshotService {
    db: PgPool,
}

/// A denormalized snapshot row for one (item, branch) pair
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ItemSnapshot {
    pub item_id: Uuid,
    pub branch_id: Uuid,
    pub company_id: Uuid,
    pub item_name: String,
    pub sku: String,
    pub barcode: Option<String>,
    pub pack_size: i32,
    pub base_unit: String,
    pub vat_rate: Decimal,
    pub current_stock: Decimal,
    pub average_cost: Decimal,
    pub last_purchase_price: Option<Decimal>,
    pub margin_percent: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub next_expiry_date: Option<NaiveDate>,
    pub search_text: String,
    pub updated_at: DateTime<Utc>,
}

/// Fully computed snapshot values, ready to upsert. Building this is a
/// pure function of ledger state and item master data, which is what
/// makes the refresh idempotent.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotValues {
    pub item_id: Uuid,
    pub branch_id: Uuid,
    pub company_id: Uuid,
    pub item_name: String,
    pub sku: String,
    pub barcode: Option<String>,
    pub pack_size: i32,
    pub base_unit: String,
    pub vat_rate: Decimal,
    pub current_stock: Decimal,
    pub average_cost: Decimal,
    pub last_purchase_price: Option<Decimal>,
    pub margin_percent: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub next_expiry_date: Option<NaiveDate>,
    pub search_text: String,
}

/// Fixed expansion table so short counter queries match long drug names.
/// Searching "pcm" must find "Paracetamol 500mg" even though the item
/// name never contains the abbreviation.
const SEARCH_ABBREVIATIONS: &[(&str, &str)] = &[
    ("paracetamol", "pcm"),
    ("amoxicillin", "amox"),
    ("ibuprofen", "ibu"),
    ("omeprazole", "ome"),
    ("metformin", "met"),
    ("amlodipine", "amlo"),
    ("atorvastatin", "ator"),
    ("simvastatin", "simva"),
    ("cetirizine", "cet"),
    ("chlorpheniramine", "cpm"),
    ("dextromethorphan", "dxm"),
    ("salbutamol", "salbu"),
    ("hydrochlorothiazide", "hctz"),
    ("vitamin", "vit"),
    ("solution", "soln"),
    ("suspension", "susp"),
    ("ointment", "oint"),
    ("injection", "inj"),
    ("tablet", "tab"),
    ("capsule", "cap"),
];

/// Build the lowercased search text for a snapshot row: name, sku,
/// barcode and description, plus abbreviation expansions
pub fn build_search_text(
    name: &str,
    sku: &str,
    barcode: Option<&str>,
    description: Option<&str>,
) -> String {
    let mut text = String::with_capacity(64);
    text.push_str(&name.to_lowercase());
    text.push(' ');
    text.push_str(&sku.to_lowercase());
    if let Some(barcode) = barcode {
        text.push(' ');
        text.push_str(&barcode.to_lowercase());
    }
    if let Some(description) = description {
        text.push(' ');
        text.push_str(&description.to_lowercase());
    }
    for (full, abbreviation) in SEARCH_ABBREVIATIONS {
        if text.contains(full) && !text.contains(abbreviation) {
            text.push(' ');
            text.push_str(abbreviation);
        }
    }
    text
}

/// Earliest expiry among batches that still have stock
pub fn earliest_expiry(batches: &[BatchStock]) -> Option<NaiveDate> {
    batches.iter().filter_map(|b| b.expiry_date).min()
}

/// Idempotent upsert of one snapshot row keyed by (item_id, branch_id)
pub async fn upsert_snapshot(conn: &mut PgConnection, values: &SnapshotValues) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO item_snapshots (
            item_id, branch_id, company_id, item_name, sku, barcode, pack_size,
            base_unit, vat_rate, current_stock, average_cost, last_purchase_price,
            margin_percent, selling_price, next_expiry_date, search_text, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, now())
        ON CONFLICT (item_id, branch_id) DO UPDATE SET
            company_id = EXCLUDED.company_id,
            item_name = EXCLUDED.item_name,
            sku = EXCLUDED.sku,
            barcode = EXCLUDED.barcode,
            pack_size = EXCLUDED.pack_size,
            base_unit = EXCLUDED.base_unit,
            vat_rate = EXCLUDED.vat_rate,
            current_stock = EXCLUDED.current_stock,
            average_cost = EXCLUDED.average_cost,
            last_purchase_price = EXCLUDED.last_purchase_price,
            margin_percent = EXCLUDED.margin_percent,
            selling_price = EXCLUDED.selling_price,
            next_expiry_date = EXCLUDED.next_expiry_date,
            search_text = EXCLUDED.search_text,
            updated_at = now()
        "#,
    )
    .bind(values.item_id)
    .bind(values.branch_id)
    .bind(values.company_id)
    .bind(&values.item_name)
    .bind(&values.sku)
    .bind(&values.barcode)
    .bind(values.pack_size)
    .bind(&values.base_unit)
    .bind(values.vat_rate)
    .bind(values.current_stock)
    .bind(values.average_cost)
    .bind(values.last_purchase_price)
    .bind(values.margin_percent)
    .bind(values.selling_price)
    .bind(values.next_expiry_date)
    .bind(&values.search_text)
    .execute(conn)
    .await?;

    Ok(())
}

/// Apply an incremental stock delta (opening-balance correction path)
pub async fn apply_stock_delta(
    conn: &mut PgConnection,
    item_id: Uuid,
    branch_id: Uuid,
    delta: Decimal,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE item_snapshots
        SET current_stock = current_stock + $3, updated_at = now()
        WHERE item_id = $1 AND branch_id = $2
        "#,
    )
    .bind(item_id)
    .bind(branch_id)
    .bind(delta)
    .execute(conn)
    .await?;

    Ok(())
}

impl SnapshotService {
    /// Create a new SnapshotService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get the snapshot row for one pair
    pub async fn get(
        &self,
        company_id: Uuid,
        branch_id: Uuid,
        item_id: Uuid,
    ) -> AppResult<Option<ItemSnapshot>> {
        let snapshot = sqlx::query_as::<_, ItemSnapshot>(
            r#"
            SELECT item_id, branch_id, company_id, item_name, sku, barcode, pack_size,
                   base_unit, vat_rate, current_stock, average_cost, last_purchase_price,
                   margin_percent, selling_price, next_expiry_date, search_text, updated_at
            FROM item_snapshots
            WHERE company_id = $1 AND branch_id = $2 AND item_id = $3
            "#,
        )
        .bind(company_id)
        .bind(branch_id)
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(snapshot)
    }

    /// Snapshot-backed item search over the precomputed search text.
    /// This is the only lookup path sales and inventory screens use;
    /// they never aggregate the ledger ad hoc.
    pub async fn search(
        &self,
        company_id: Uuid,
        branch_id: Uuid,
        query: &str,
        limit: i64,
    ) -> AppResult<Vec<ItemSnapshot>> {
        let pattern = format!("%{}%", query.to_lowercase());
        let snapshots = sqlx::query_as::<_, ItemSnapshot>(
            r#"
            SELECT item_id, branch_id, company_id, item_name, sku, barcode, pack_size,
                   base_unit, vat_rate, current_stock, average_cost, last_purchase_price,
                   margin_percent, selling_price, next_expiry_date, search_text, updated_at
            FROM item_snapshots
            WHERE company_id = $1 AND branch_id = $2 AND search_text LIKE $3
            ORDER BY item_name ASC
            LIMIT $4
            "#,
        )
        .bind(company_id)
        .bind(branch_id)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(snapshots)
    }

    /// All snapshot rows for a branch (stock overview screen)
    pub async fn list_branch(
        &self,
        company_id: Uuid,
        branch_id: Uuid,
    ) -> AppResult<Vec<ItemSnapshot>> {
        let snapshots = sqlx::query_as::<_, ItemSnapshot>(
            r#"
            SELECT item_id, branch_id, company_id, item_name, sku, barcode, pack_size,
                   base_unit, vat_rate, current_stock, average_cost, last_purchase_price,
                   margin_percent, selling_price, next_expiry_date, search_text, updated_at
            FROM item_snapshots
            WHERE company_id = $1 AND branch_id = $2
            ORDER BY item_name ASC
            "#,
        )
        .bind(company_id)
        .bind(branch_id)
        .fetch_all(&self.db)
        .await?;

        Ok(snapshots)
    }
}
