//! Item (product) master models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::BaseUnit;

/// A stocked item in the company catalogue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    /// Stock keeping unit, unique per company (e.g. "PCM-500-TAB")
    pub sku: String,
    pub barcode: Option<String>,
    pub description: Option<String>,
    /// Units per retail pack (e.g. 10 tablets per strip)
    pub pack_size: i32,
    pub base_unit: BaseUnit,
    /// VAT rate as a percentage (e.g. 7.0)
    pub vat_rate: Decimal,
    /// Fallback cost when the ledger has no cost history
    pub default_cost: Option<Decimal>,
    /// Item-level margin; company default applies when absent
    pub margin_percent: Option<Decimal>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateItemInput {
    pub name: String,
    pub sku: String,
    pub barcode: Option<String>,
    pub description: Option<String>,
    pub pack_size: Option<i32>,
    pub base_unit: Option<BaseUnit>,
    pub vat_rate: Option<Decimal>,
    pub default_cost: Option<Decimal>,
    pub margin_percent: Option<Decimal>,
}

/// Input for updating an item
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateItemInput {
    pub name: Option<String>,
    pub barcode: Option<String>,
    pub description: Option<String>,
    pub pack_size: Option<i32>,
    pub base_unit: Option<BaseUnit>,
    pub vat_rate: Option<Decimal>,
    pub default_cost: Option<Decimal>,
    pub margin_percent: Option<Decimal>,
    pub is_active: Option<bool>,
}
