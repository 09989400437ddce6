use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use axum::Router;
use sea_orm::DatabaseConnection;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer};

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use config::AppConfig;
use events::EventSender;
use services::{
    DeliveryService, ProductService, ReceiptService, ReportService, SupplierService,
    TransferService, UserService, WarehouseService,
};

/// One instance of every domain service, shared across handlers.
#[derive(Clone)]
pub struct AppServices {
    pub products: ProductService,
    pub suppliers: SupplierService,
    pub warehouses: WarehouseService,
    pub receipts: ReceiptService,
    pub deliveries: DeliveryService,
    pub transfers: TransferService,
    pub reports: ReportService,
    pub users: UserService,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            products: ProductService::new(db.clone(), event_sender.clone()),
            suppliers: SupplierService::new(db.clone()),
            warehouses: WarehouseService::new(db.clone()),
            receipts: ReceiptService::new(db.clone(), event_sender.clone()),
            deliveries: DeliveryService::new(db.clone(), event_sender.clone()),
            transfers: TransferService::new(db.clone(), event_sender.clone()),
            reports: ReportService::new(db.clone()),
            users: UserService::new(db, event_sender),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub event_sender: EventSender,
    pub services: AppServices,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: Arc<AppConfig>, event_sender: EventSender) -> Self {
        let services = AppServices::new(db.clone(), event_sender.clone());
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

/// Everything under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/products", handlers::products::routes())
        .nest("/suppliers", handlers::suppliers::routes())
        .nest("/warehouses", handlers::warehouses::routes())
        .nest("/receipts", handlers::receipts::routes())
        .nest("/deliveries", handlers::deliveries::routes())
        .nest("/transfers", handlers::transfers::routes())
        .nest("/reports", handlers::reports::routes())
        .nest("/webhooks", handlers::webhooks::routes())
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.should_allow_permissive_cors() {
        return CorsLayer::permissive();
    }
    match &config.cors_allowed_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any)
        }
        None => CorsLayer::new(),
    }
}

/// Builds the complete application router with middleware applied.
pub fn app_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    Router::new()
        .nest("/api", api_routes())
        .merge(health::routes())
        .merge(openapi::swagger_ui())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(crate::tracing::configure_http_tracing())
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}
