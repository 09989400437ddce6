use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};

use super::common::{created_response, success_response, validate_input};
use crate::{errors::ApiError, services::transfers::CreateTransferInput, AppState};

async fn list_transfers(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let transfers = state.services.transfers.list().await?;
    Ok(success_response(transfers))
}

async fn get_transfer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let transfer = state.services.transfers.get(id).await?;
    Ok(success_response(transfer))
}

async fn create_transfer(
    State(state): State<AppState>,
    Json(payload): Json<CreateTransferInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let transfer = state.services.transfers.create(payload).await?;
    Ok(created_response(transfer))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_transfers).post(create_transfer))
        .route("/:id", get(get_transfer))
}
