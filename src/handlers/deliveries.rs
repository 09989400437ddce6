use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;

use super::common::{created_response, no_content_response, success_response, validate_input};
use crate::{
    entities::delivery::DeliveryStatus,
    errors::ApiError,
    services::deliveries::{
        CreateDeliveryInput, DeliveryFilter, DeliveryItemInput, UpdateDeliveryInput,
    },
    AppState,
};

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateStatusRequest {
    pub status: DeliveryStatus,
}

async fn list_deliveries(
    State(state): State<AppState>,
    Query(filter): Query<DeliveryFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let deliveries = state.services.deliveries.list(filter).await?;
    Ok(success_response(deliveries))
}

async fn get_delivery(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let delivery = state.services.deliveries.get(id).await?;
    Ok(success_response(delivery))
}

async fn create_delivery(
    State(state): State<AppState>,
    Json(payload): Json<CreateDeliveryInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let delivery = state.services.deliveries.create(payload).await?;
    Ok(created_response(delivery))
}

async fn update_delivery(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateDeliveryInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let delivery = state.services.deliveries.update(id, payload).await?;
    Ok(success_response(delivery))
}

async fn update_delivery_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let delivery = state
        .services
        .deliveries
        .update_status(id, payload.status)
        .await?;
    Ok(success_response(delivery))
}

async fn delete_delivery(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.deliveries.delete(id).await?;
    Ok(no_content_response())
}

async fn add_delivery_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<DeliveryItemInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let item = state.services.deliveries.add_item(id, payload).await?;
    Ok(created_response(item))
}

async fn remove_delivery_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.deliveries.remove_item(id, item_id).await?;
    Ok(no_content_response())
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_deliveries).post(create_delivery))
        .route(
            "/:id",
            get(get_delivery).put(update_delivery).delete(delete_delivery),
        )
        .route("/:id/status", patch(update_delivery_status))
        .route("/:id/lines", post(add_delivery_item))
        .route(
            "/:id/lines/:line_id",
            axum::routing::delete(remove_delivery_item),
        )
}
