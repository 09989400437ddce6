use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tracing::error;

use crate::AppState;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

/// Liveness probe. Always succeeds while the process is up.
async fn health() -> impl IntoResponse {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe. Fails while the database is unreachable so load
/// balancers stop routing traffic here.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    match crate::db::check_connection(&state.db).await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthStatus {
                status: "ready",
                version: env!("CARGO_PKG_VERSION"),
            }),
        ),
        Err(e) => {
            error!("readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthStatus {
                    status: "unavailable",
                    version: env!("CARGO_PKG_VERSION"),
                }),
            )
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/live", get(health))
        .route("/health/ready", get(readiness))
}
