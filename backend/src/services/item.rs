//! Item master service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shared::models::{CreateItemInput, Item, UpdateItemInput};
use shared::types::BaseUnit;
use shared::validation::{
    validate_ean13, validate_margin_percent, validate_pack_size, validate_sku, validate_unit_cost,
    validate_vat_rate,
};

use crate::error::{AppError, AppResult};
use crate::services::refresher::SnapshotRefresher;

/// Item service for catalogue management
#[derive(Clone)]
pub struct ItemService {
    db: PgPool,
    refresher: SnapshotRefresher,
}

#[derive(Debug, FromRow)]
struct ItemRow {
    id: Uuid,
    company_id: Uuid,
    name: String,
    sku: String,
    barcode: Option<String>,
    description: Option<String>,
    pack_size: i32,
    base_unit: String,
    vat_rate: Decimal,
    default_cost: Option<Decimal>,
    margin_percent: Option<Decimal>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: row.id,
            company_id: row.company_id,
            name: row.name,
            sku: row.sku,
            barcode: row.barcode,
            description: row.description,
            pack_size: row.pack_size,
            base_unit: BaseUnit::from_code(&row.base_unit).unwrap_or_default(),
            vat_rate: row.vat_rate,
            default_cost: row.default_cost,
            margin_percent: row.margin_percent,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ITEM_COLUMNS: &str = "id, company_id, name, sku, barcode, description, pack_size, \
                            base_unit, vat_rate, default_cost, margin_percent, is_active, \
                            created_at, updated_at";

fn validate_item_fields(
    sku: &str,
    barcode: Option<&str>,
    pack_size: i32,
    vat_rate: Decimal,
    default_cost: Option<Decimal>,
    margin_percent: Option<Decimal>,
) -> AppResult<()> {
    let field_err = |field: &str, msg: &str| AppError::Validation {
        field: field.to_string(),
        message: msg.to_string(),
    };

    validate_sku(sku).map_err(|msg| field_err("sku", msg))?;
    if let Some(barcode) = barcode {
        validate_ean13(barcode).map_err(|msg| field_err("barcode", msg))?;
    }
    validate_pack_size(pack_size).map_err(|msg| field_err("pack_size", msg))?;
    validate_vat_rate(vat_rate).map_err(|msg| field_err("vat_rate", msg))?;
    if let Some(cost) = default_cost {
        validate_unit_cost(cost).map_err(|msg| field_err("default_cost", msg))?;
    }
    if let Some(margin) = margin_percent {
        validate_margin_percent(margin).map_err(|msg| field_err("margin_percent", msg))?;
    }
    Ok(())
}

impl ItemService {
    /// Create a new ItemService instance
    pub fn new(db: PgPool, refresher: SnapshotRefresher) -> Self {
        Self { db, refresher }
    }

    /// Create an item and seed its snapshot row at every active branch
    /// so search works before the first stock movement
    pub async fn create_item(&self, company_id: Uuid, input: CreateItemInput) -> AppResult<Item> {
        let pack_size = input.pack_size.unwrap_or(1);
        let base_unit = input.base_unit.unwrap_or_default();
        let vat_rate = input.vat_rate.unwrap_or(Decimal::ZERO);

        validate_item_fields(
            &input.sku,
            input.barcode.as_deref(),
            pack_size,
            vat_rate,
            input.default_cost,
            input.margin_percent,
        )?;

        let sku_taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM items WHERE company_id = $1 AND sku = $2)",
        )
        .bind(company_id)
        .bind(&input.sku)
        .fetch_one(&self.db)
        .await?;

        if sku_taken {
            return Err(AppError::DuplicateEntry("sku".to_string()));
        }

        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            INSERT INTO items (
                company_id, name, sku, barcode, description, pack_size,
                base_unit, vat_rate, default_cost, margin_percent
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ITEM_COLUMNS}
            "#,
        ))
        .bind(company_id)
        .bind(&input.name)
        .bind(&input.sku)
        .bind(&input.barcode)
        .bind(&input.description)
        .bind(pack_size)
        .bind(base_unit.code())
        .bind(vat_rate)
        .bind(input.default_cost)
        .bind(input.margin_percent)
        .fetch_one(&self.db)
        .await?;

        let item: Item = row.into();
        self.refresher
            .seed_item_snapshots(company_id, item.id)
            .await?;

        Ok(item)
    }

    /// Update an item, then synchronously refresh its snapshot at every
    /// active branch (bounded by branch count, so not queued)
    pub async fn update_item(
        &self,
        company_id: Uuid,
        item_id: Uuid,
        input: UpdateItemInput,
    ) -> AppResult<Item> {
        let existing = self.get_item(company_id, item_id).await?;

        let name = input.name.unwrap_or(existing.name);
        let barcode = input.barcode.or(existing.barcode);
        let description = input.description.or(existing.description);
        let pack_size = input.pack_size.unwrap_or(existing.pack_size);
        let base_unit = input.base_unit.unwrap_or(existing.base_unit);
        let vat_rate = input.vat_rate.unwrap_or(existing.vat_rate);
        let default_cost = input.default_cost.or(existing.default_cost);
        let margin_percent = input.margin_percent.or(existing.margin_percent);
        let is_active = input.is_active.unwrap_or(existing.is_active);

        validate_item_fields(
            &existing.sku,
            barcode.as_deref(),
            pack_size,
            vat_rate,
            default_cost,
            margin_percent,
        )?;

        let row = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            UPDATE items
            SET name = $1, barcode = $2, description = $3, pack_size = $4,
                base_unit = $5, vat_rate = $6, default_cost = $7,
                margin_percent = $8, is_active = $9, updated_at = now()
            WHERE id = $10 AND company_id = $11
            RETURNING {ITEM_COLUMNS}
            "#,
        ))
        .bind(&name)
        .bind(&barcode)
        .bind(&description)
        .bind(pack_size)
        .bind(base_unit.code())
        .bind(vat_rate)
        .bind(default_cost)
        .bind(margin_percent)
        .bind(is_active)
        .bind(item_id)
        .bind(company_id)
        .fetch_one(&self.db)
        .await?;

        let item: Item = row.into();
        self.refresher
            .refresh_item_all_branches(company_id, item.id)
            .await?;

        Ok(item)
    }

    /// Get an item by id
    pub async fn get_item(&self, company_id: Uuid, item_id: Uuid) -> AppResult<Item> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = $1 AND company_id = $2",
        ))
        .bind(item_id)
        .bind(company_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Item".to_string()))?;

        Ok(row.into())
    }

    /// List items in the company catalogue
    pub async fn list_items(&self, company_id: Uuid, include_inactive: bool) -> AppResult<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            SELECT {ITEM_COLUMNS} FROM items
            WHERE company_id = $1 AND (is_active = true OR $2)
            ORDER BY name ASC
            "#,
        ))
        .bind(company_id)
        .bind(include_inactive)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Item::from).collect())
    }
}
