use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use sea_orm::Database;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use stockroom_api::{
    app_router, config::AppConfig, db::run_migrations, errors::ErrorResponse, events::EventSender,
    AppState,
};

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "development".to_string(),
        log_level: "debug".to_string(),
        log_json: false,
        auto_migrate: true,
        cors_allowed_origins: None,
        cors_allow_any_origin: false,
        db_max_connections: 5,
        db_min_connections: 1,
        db_connect_timeout_secs: 5,
        db_idle_timeout_secs: 60,
        db_acquire_timeout_secs: 5,
        event_channel_capacity: 64,
        clerk_webhook_secret: Some("whsec_dGVzdC1zZWNyZXQta2V5".to_string()),
        webhook_tolerance_secs: 300,
    }
}

async fn test_app() -> axum::Router {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    run_migrations(&db).await.unwrap();
    let (tx, mut rx) = mpsc::channel(64);
    tokio::spawn(async move { while rx.recv().await.is_some() {} });
    let state = AppState::new(
        Arc::new(db),
        Arc::new(test_config()),
        EventSender::new(tx),
    );
    app_router(state)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let app = test_app().await;
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn product_crud_over_http() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/products",
            json!({"name": "Widget", "sku": "WID-001", "unit_price": "4.99", "reorder_level": 3}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let created: Value = serde_json::from_slice(&body).unwrap();
    let id = created["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/api/products/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Duplicate SKU surfaces as 409.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/products",
            json!({"name": "Widget", "sku": "WID-001"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .oneshot(
            Request::delete(format!("/api/products/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn missing_resources_return_structured_errors_with_request_id() {
    let app = test_app().await;
    let response = app
        .oneshot(
            Request::get("/api/products/9999")
                .header("x-request-id", "req-test-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "req-test-1"
    );

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(payload.error, "Not Found");
    assert_eq!(payload.request_id.as_deref(), Some("req-test-1"));
}

#[tokio::test]
async fn unsigned_webhook_is_rejected() {
    let app = test_app().await;
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/webhooks/clerk",
            json!({"type": "user.created", "data": {"id": "user_1"}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_status_transition_is_a_bad_request() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/warehouses",
            json!({"name": "Main"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let warehouse: Value = serde_json::from_slice(&body).unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/receipts",
            json!({"warehouse_id": warehouse["id"]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let receipt: Value = serde_json::from_slice(&body).unwrap();
    let id = receipt["id"].as_i64().unwrap();

    // Cancel, then try to validate the cancelled receipt.
    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/api/receipts/{}/status", id),
            json!({"status": "cancelled"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(json_request(
            "PATCH",
            &format!("/api/receipts/{}/status", id),
            json!({"status": "validated"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
