//! Company and branch management service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shared::models::{Branch, Company, CreateBranchInput, CreateCompanyInput, UpdateCompanyInput};
use shared::validation::{validate_branch_code, validate_email, validate_margin_percent};

use crate::error::{AppError, AppResult};
use crate::services::refresh_queue::RefreshQueueService;

/// Company service for tenant and branch management
#[derive(Clone)]
pub struct CompanyService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct CompanyRow {
    id: Uuid,
    name: String,
    default_margin_percent: Option<Decimal>,
    address: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CompanyRow> for Company {
    fn from(row: CompanyRow) -> Self {
        Company {
            id: row.id,
            name: row.name,
            default_margin_percent: row.default_margin_percent,
            address: row.address,
            phone: row.phone,
            email: row.email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct BranchRow {
    id: Uuid,
    company_id: Uuid,
    code: String,
    name: String,
    address: Option<String>,
    phone: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BranchRow> for Branch {
    fn from(row: BranchRow) -> Self {
        Branch {
            id: row.id,
            company_id: row.company_id,
            code: row.code,
            name: row.name,
            address: row.address,
            phone: row.phone,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const COMPANY_COLUMNS: &str =
    "id, name, default_margin_percent, address, phone, email, created_at, updated_at";
const BRANCH_COLUMNS: &str =
    "id, company_id, code, name, address, phone, is_active, created_at, updated_at";

impl CompanyService {
    /// Create a new CompanyService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Register a new company
    pub async fn create_company(&self, input: CreateCompanyInput) -> AppResult<Company> {
        if input.name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "name".to_string(),
                message: "Company name is required".to_string(),
            });
        }
        if let Some(margin) = input.default_margin_percent {
            validate_margin_percent(margin).map_err(|msg| AppError::Validation {
                field: "default_margin_percent".to_string(),
                message: msg.to_string(),
            })?;
        }
        if let Some(email) = &input.email {
            validate_email(email).map_err(|msg| AppError::Validation {
                field: "email".to_string(),
                message: msg.to_string(),
            })?;
        }

        let row = sqlx::query_as::<_, CompanyRow>(&format!(
            r#"
            INSERT INTO companies (name, default_margin_percent, address, phone, email)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {COMPANY_COLUMNS}
            "#,
        ))
        .bind(&input.name)
        .bind(input.default_margin_percent)
        .bind(&input.address)
        .bind(&input.phone)
        .bind(&input.email)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    /// Get a company by id
    pub async fn get_company(&self, company_id: Uuid) -> AppResult<Company> {
        let row = sqlx::query_as::<_, CompanyRow>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1",
        ))
        .bind(company_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Company".to_string()))?;

        Ok(row.into())
    }

    /// Update company settings. A margin change is a bulk-impact pricing
    /// write: it enqueues one branch-wide refresh job per active branch
    /// in the same transaction as the settings update.
    pub async fn update_company(
        &self,
        company_id: Uuid,
        input: UpdateCompanyInput,
    ) -> AppResult<Company> {
        let existing = self.get_company(company_id).await?;

        if let Some(margin) = input.default_margin_percent {
            validate_margin_percent(margin).map_err(|msg| AppError::Validation {
                field: "default_margin_percent".to_string(),
                message: msg.to_string(),
            })?;
        }

        let name = input.name.unwrap_or(existing.name);
        let default_margin_percent = input
            .default_margin_percent
            .or(existing.default_margin_percent);
        let address = input.address.or(existing.address);
        let phone = input.phone.or(existing.phone);
        let email = input.email.or(existing.email);

        let margin_changed = default_margin_percent != existing.default_margin_percent;

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, CompanyRow>(&format!(
            r#"
            UPDATE companies
            SET name = $1, default_margin_percent = $2, address = $3, phone = $4,
                email = $5, updated_at = now()
            WHERE id = $6
            RETURNING {COMPANY_COLUMNS}
            "#,
        ))
        .bind(&name)
        .bind(default_margin_percent)
        .bind(&address)
        .bind(&phone)
        .bind(&email)
        .bind(company_id)
        .fetch_one(&mut *tx)
        .await?;

        if margin_changed {
            let branch_ids = sqlx::query_scalar::<_, Uuid>(
                "SELECT id FROM branches WHERE company_id = $1 AND is_active = true ORDER BY id",
            )
            .bind(company_id)
            .fetch_all(&mut *tx)
            .await?;

            for branch_id in branch_ids {
                RefreshQueueService::enqueue_branch(
                    &mut tx,
                    company_id,
                    branch_id,
                    Some("company margin change"),
                )
                .await?;
            }
        }

        tx.commit().await?;

        Ok(row.into())
    }

    /// Open a new branch for a company
    pub async fn create_branch(
        &self,
        company_id: Uuid,
        input: CreateBranchInput,
    ) -> AppResult<Branch> {
        validate_branch_code(&input.code).map_err(|msg| AppError::Validation {
            field: "code".to_string(),
            message: msg.to_string(),
        })?;

        // Company must exist
        self.get_company(company_id).await?;

        let code_taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM branches WHERE company_id = $1 AND code = $2)",
        )
        .bind(company_id)
        .bind(&input.code)
        .fetch_one(&self.db)
        .await?;

        if code_taken {
            return Err(AppError::DuplicateEntry("branch code".to_string()));
        }

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, BranchRow>(&format!(
            r#"
            INSERT INTO branches (company_id, code, name, address, phone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {BRANCH_COLUMNS}
            "#,
        ))
        .bind(company_id)
        .bind(&input.code)
        .bind(&input.name)
        .bind(&input.address)
        .bind(&input.phone)
        .fetch_one(&mut *tx)
        .await?;

        // Seed snapshots for the whole catalogue at the new branch
        RefreshQueueService::enqueue_branch(&mut tx, company_id, row.id, Some("branch opened"))
            .await?;

        tx.commit().await?;

        Ok(row.into())
    }

    /// List branches of a company
    pub async fn list_branches(&self, company_id: Uuid) -> AppResult<Vec<Branch>> {
        let rows = sqlx::query_as::<_, BranchRow>(&format!(
            "SELECT {BRANCH_COLUMNS} FROM branches WHERE company_id = $1 ORDER BY code",
        ))
        .bind(company_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Branch::from).collect())
    }

    /// Verify a branch belongs to a company and is active
    pub async fn assert_active_branch(&self, company_id: Uuid, branch_id: Uuid) -> AppResult<()> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM branches WHERE id = $1 AND company_id = $2 AND is_active = true)",
        )
        .bind(branch_id)
        .bind(company_id)
        .fetch_one(&self.db)
        .await?;

        if !exists {
            return Err(AppError::NotFound("Branch".to_string()));
        }
        Ok(())
    }
}
