use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};

use super::common::{created_response, no_content_response, success_response, validate_input};
use crate::{
    errors::ApiError,
    services::warehouses::{CreateWarehouseInput, UpdateWarehouseInput},
    AppState,
};

async fn list_warehouses(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let warehouses = state.services.warehouses.list().await?;
    Ok(success_response(warehouses))
}

async fn get_warehouse(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let warehouse = state.services.warehouses.get(id).await?;
    Ok(success_response(warehouse))
}

async fn create_warehouse(
    State(state): State<AppState>,
    Json(payload): Json<CreateWarehouseInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let warehouse = state.services.warehouses.create(payload).await?;
    Ok(created_response(warehouse))
}

async fn update_warehouse(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateWarehouseInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let warehouse = state.services.warehouses.update(id, payload).await?;
    Ok(success_response(warehouse))
}

async fn delete_warehouse(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.warehouses.delete(id).await?;
    Ok(no_content_response())
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_warehouses).post(create_warehouse))
        .route(
            "/:id",
            get(get_warehouse)
                .put(update_warehouse)
                .delete(delete_warehouse),
        )
}
