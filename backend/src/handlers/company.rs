//! HTTP handlers for company and branch management

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use shared::models::{Branch, Company, CreateBranchInput, CreateCompanyInput, UpdateCompanyInput};

use crate::error::AppResult;
use crate::services::CompanyService;
use crate::AppState;

/// Register a new company
pub async fn create_company(
    State(state): State<AppState>,
    Json(input): Json<CreateCompanyInput>,
) -> AppResult<Json<Company>> {
    let service = CompanyService::new(state.db);
    let company = service.create_company(input).await?;
    Ok(Json(company))
}

/// Get a company
pub async fn get_company(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
) -> AppResult<Json<Company>> {
    let service = CompanyService::new(state.db);
    let company = service.get_company(company_id).await?;
    Ok(Json(company))
}

/// Update company settings; margin changes enqueue branch-wide refreshes
pub async fn update_company(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    Json(input): Json<UpdateCompanyInput>,
) -> AppResult<Json<Company>> {
    let service = CompanyService::new(state.db);
    let company = service.update_company(company_id, input).await?;
    Ok(Json(company))
}

/// Open a new branch
pub async fn create_branch(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    Json(input): Json<CreateBranchInput>,
) -> AppResult<Json<Branch>> {
    let service = CompanyService::new(state.db);
    let branch = service.create_branch(company_id, input).await?;
    Ok(Json(branch))
}

/// List branches of a company
pub async fn list_branches(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
) -> AppResult<Json<Vec<Branch>>> {
    let service = CompanyService::new(state.db);
    let branches = service.list_branches(company_id).await?;
    Ok(Json(branches))
}
