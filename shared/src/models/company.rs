//! Company and branch models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tenant company on the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    /// Company-wide default margin applied when an item has none
    pub default_margin_percent: Option<Decimal>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A retail branch (pharmacy outlet) of a company
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: Uuid,
    pub company_id: Uuid,
    /// Short branch code used on documents (e.g. "MAIN", "BR02")
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a new company
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCompanyInput {
    pub name: String,
    pub default_margin_percent: Option<Decimal>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Input for updating company settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCompanyInput {
    pub name: Option<String>,
    pub default_margin_percent: Option<Decimal>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Input for opening a new branch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBranchInput {
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}
