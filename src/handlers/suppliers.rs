use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};

use super::common::{created_response, no_content_response, success_response, validate_input};
use crate::{
    errors::ApiError,
    services::suppliers::{CreateSupplierInput, UpdateSupplierInput},
    AppState,
};

async fn list_suppliers(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let suppliers = state.services.suppliers.list().await?;
    Ok(success_response(suppliers))
}

async fn get_supplier(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let supplier = state.services.suppliers.get(id).await?;
    Ok(success_response(supplier))
}

async fn create_supplier(
    State(state): State<AppState>,
    Json(payload): Json<CreateSupplierInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let supplier = state.services.suppliers.create(payload).await?;
    Ok(created_response(supplier))
}

async fn update_supplier(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateSupplierInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let supplier = state.services.suppliers.update(id, payload).await?;
    Ok(success_response(supplier))
}

async fn delete_supplier(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.suppliers.delete(id).await?;
    Ok(no_content_response())
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_suppliers).post(create_supplier))
        .route(
            "/:id",
            get(get_supplier).put(update_supplier).delete(delete_supplier),
        )
}
