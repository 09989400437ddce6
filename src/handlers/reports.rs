use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;

use super::common::success_response;
use crate::{errors::ApiError, services::reports::ActivityFilter, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct InventoryQuery {
    pub warehouse_id: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/reports/dashboard",
    responses((status = 200, description = "Aggregate dashboard counters")),
    tag = "Reports"
)]
pub async fn dashboard(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let report = state.services.reports.dashboard().await?;
    Ok(success_response(report))
}

async fn inventory(
    State(state): State<AppState>,
    Query(query): Query<InventoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.services.reports.inventory(query.warehouse_id).await?;
    Ok(success_response(report))
}

async fn low_stock(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let report = state.services.reports.low_stock().await?;
    Ok(success_response(report))
}

async fn activity(
    State(state): State<AppState>,
    Query(filter): Query<ActivityFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.services.reports.activity(filter).await?;
    Ok(success_response(report))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/inventory", get(inventory))
        .route("/low-stock", get(low_stock))
        .route("/activity", get(activity))
}
