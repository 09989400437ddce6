mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use stockroom_api::{
    errors::ServiceError,
    services::products::{CreateProductInput, UpdateProductInput},
};

fn widget_input(sku: &str) -> CreateProductInput {
    CreateProductInput {
        name: "Widget".to_string(),
        sku: sku.to_string(),
        description: Some("A widget".to_string()),
        category: Some("parts".to_string()),
        unit_price: dec!(4.99),
        reorder_level: 10,
    }
}

#[tokio::test]
async fn duplicate_sku_is_a_conflict() {
    let (services, _rx) = common::setup().await;

    services.products.create(widget_input("WID-001")).await.unwrap();
    let err = services
        .products
        .create(widget_input("WID-001"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
}

#[tokio::test]
async fn soft_deleted_products_leave_listings_but_keep_their_row() {
    let (services, _rx) = common::setup().await;

    let kept = services.products.create(widget_input("WID-001")).await.unwrap();
    let removed = services.products.create(widget_input("WID-002")).await.unwrap();

    services.products.deactivate(removed.id).await.unwrap();

    let active = services.products.list(false).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, kept.id);

    let everything = services.products.list(true).await.unwrap();
    assert_eq!(everything.len(), 2);

    // The row survives for history and direct lookup.
    let fetched = services.products.get(removed.id).await.unwrap();
    assert!(!fetched.is_active);

    // Deactivating twice is an error.
    let err = services.products.deactivate(removed.id).await.unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn updates_are_partial() {
    let (services, _rx) = common::setup().await;

    let product = services.products.create(widget_input("WID-001")).await.unwrap();
    let updated = services
        .products
        .update(
            product.id,
            UpdateProductInput {
                unit_price: Some(dec!(6.25)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.unit_price, dec!(6.25));
    assert_eq!(updated.name, "Widget");
    assert_eq!(updated.sku, "WID-001");
    assert!(updated.updated_at.is_some());
}

#[tokio::test]
async fn unknown_product_is_not_found() {
    let (services, _rx) = common::setup().await;
    let err = services.products.get(9999).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn negative_reorder_level_is_rejected() {
    let (services, _rx) = common::setup().await;

    let product = services.products.create(widget_input("WID-001")).await.unwrap();
    let err = services
        .products
        .update(
            product.id,
            UpdateProductInput {
                reorder_level: Some(-1),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}
