use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;

use super::common::{created_response, no_content_response, success_response, validate_input};
use crate::{
    errors::ApiError,
    services::products::{CreateProductInput, UpdateProductInput},
    AppState,
};

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct ListProductsQuery {
    /// Also return soft-deleted products.
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct MovementsQuery {
    pub limit: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(ListProductsQuery),
    responses((status = 200, description = "List of products")),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let products = state.services.products.list(query.include_inactive).await?;
    Ok(success_response(products))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    responses(
        (status = 200, description = "Product found"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.services.products.get(id).await?;
    Ok(success_response(product))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductInput,
    responses(
        (status = 201, description = "Product created"),
        (status = 409, description = "Duplicate SKU", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let product = state.services.products.create(payload).await?;
    Ok(created_response(product))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let product = state.services.products.update(id, payload).await?;
    Ok(success_response(product))
}

async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.products.deactivate(id).await?;
    Ok(no_content_response())
}

async fn product_inventory(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let inventory = state.services.products.inventory(id).await?;
    Ok(success_response(inventory))
}

async fn product_movements(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<MovementsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let movements = state
        .services
        .products
        .movements(id, query.limit.unwrap_or(50).clamp(1, 500))
        .await?;
    Ok(success_response(movements))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/:id/inventory", get(product_inventory))
        .route("/:id/movements", get(product_movements))
}
