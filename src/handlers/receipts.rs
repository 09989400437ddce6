use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, patch, put},
    Router,
};
use serde::Deserialize;

use super::common::{created_response, no_content_response, success_response, validate_input};
use crate::{
    entities::receipt::ReceiptStatus,
    errors::ApiError,
    services::receipts::{CreateReceiptInput, ReceiptFilter, ReceiptItemInput, UpdateReceiptInput},
    AppState,
};

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateStatusRequest {
    pub status: ReceiptStatus,
}

async fn list_receipts(
    State(state): State<AppState>,
    Query(filter): Query<ReceiptFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let receipts = state.services.receipts.list(filter).await?;
    Ok(success_response(receipts))
}

async fn get_receipt(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state.services.receipts.get(id).await?;
    Ok(success_response(receipt))
}

async fn create_receipt(
    State(state): State<AppState>,
    Json(payload): Json<CreateReceiptInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let receipt = state.services.receipts.create(payload).await?;
    Ok(created_response(receipt))
}

async fn update_receipt(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateReceiptInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let receipt = state.services.receipts.update(id, payload).await?;
    Ok(success_response(receipt))
}

/// Status transitions drive the receipt lifecycle; moving into `validated`
/// posts the receipt's lines to inventory.
#[utoipa::path(
    patch,
    path = "/api/receipts/{id}/status",
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated"),
        (status = 400, description = "Transition not allowed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Receipt not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Receipts"
)]
pub async fn update_receipt_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state
        .services
        .receipts
        .update_status(id, payload.status)
        .await?;
    Ok(success_response(receipt))
}

async fn delete_receipt(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.receipts.delete(id).await?;
    Ok(no_content_response())
}

async fn list_receipt_lines(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state.services.receipts.get(id).await?;
    Ok(success_response(receipt.items))
}

async fn add_receipt_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<ReceiptItemInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let item = state.services.receipts.add_item(id, payload).await?;
    Ok(created_response(item))
}

async fn update_receipt_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(i64, i64)>,
    Json(payload): Json<ReceiptItemInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let item = state
        .services
        .receipts
        .update_item(id, item_id, payload)
        .await?;
    Ok(success_response(item))
}

async fn remove_receipt_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.receipts.remove_item(id, item_id).await?;
    Ok(no_content_response())
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_receipts).post(create_receipt))
        .route(
            "/:id",
            get(get_receipt).put(update_receipt).delete(delete_receipt),
        )
        .route("/:id/status", patch(update_receipt_status))
        .route("/:id/lines", get(list_receipt_lines).post(add_receipt_item))
        .route(
            "/:id/lines/:line_id",
            put(update_receipt_item).delete(remove_receipt_item),
        )
}
