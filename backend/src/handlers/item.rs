//! HTTP handlers for item master management and snapshot-backed search

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::models::{CreateItemInput, Item, UpdateItemInput};

use crate::error::AppResult;
use crate::services::snapshot::ItemSnapshot;
use crate::services::{ItemService, SnapshotService};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListItemsQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct SearchItemsQuery {
    pub branch_id: Uuid,
    pub q: String,
    pub limit: Option<i64>,
}

/// Create an item
pub async fn create_item(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    Json(input): Json<CreateItemInput>,
) -> AppResult<Json<Item>> {
    let service = ItemService::new(state.db.clone(), state.refresher());
    let item = service.create_item(company_id, input).await?;
    Ok(Json(item))
}

/// Update an item (refreshes its snapshot at every active branch)
pub async fn update_item(
    State(state): State<AppState>,
    Path((company_id, item_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateItemInput>,
) -> AppResult<Json<Item>> {
    let service = ItemService::new(state.db.clone(), state.refresher());
    let item = service.update_item(company_id, item_id, input).await?;
    Ok(Json(item))
}

/// Get an item
pub async fn get_item(
    State(state): State<AppState>,
    Path((company_id, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Item>> {
    let service = ItemService::new(state.db.clone(), state.refresher());
    let item = service.get_item(company_id, item_id).await?;
    Ok(Json(item))
}

/// List catalogue items
pub async fn list_items(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    Query(query): Query<ListItemsQuery>,
) -> AppResult<Json<Vec<Item>>> {
    let service = ItemService::new(state.db.clone(), state.refresher());
    let items = service.list_items(company_id, query.include_inactive).await?;
    Ok(Json(items))
}

/// Search items by the snapshot's precomputed search text
pub async fn search_items(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    Query(query): Query<SearchItemsQuery>,
) -> AppResult<Json<Vec<ItemSnapshot>>> {
    let service = SnapshotService::new(state.db);
    let results = service
        .search(
            company_id,
            query.branch_id,
            &query.q,
            query.limit.unwrap_or(50),
        )
        .await?;
    Ok(Json(results))
}
