mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use stockroom_api::{
    entities::delivery::DeliveryStatus,
    errors::ServiceError,
    services::{
        deliveries::{CreateDeliveryInput, DeliveryItemInput},
        products::CreateProductInput,
        transfers::CreateTransferInput,
        warehouses::CreateWarehouseInput,
    },
    AppServices,
};

async fn seed(services: &AppServices) -> (i64, i64) {
    let product = services
        .products
        .create(CreateProductInput {
            name: "Widget".to_string(),
            sku: "WID-001".to_string(),
            description: None,
            category: None,
            unit_price: dec!(2.00),
            reorder_level: 0,
        })
        .await
        .unwrap()
        .id;
    let warehouse = services
        .warehouses
        .create(CreateWarehouseInput {
            name: "Main".to_string(),
            location: None,
        })
        .await
        .unwrap()
        .id;
    (product, warehouse)
}

#[tokio::test]
async fn deliveries_progress_linearly_and_never_touch_stock() {
    let (services, _rx) = common::setup().await;
    let (product, warehouse) = seed(&services).await;

    let delivery = services
        .deliveries
        .create(CreateDeliveryInput {
            reference_number: None,
            warehouse_id: warehouse,
            destination: "Customer site".to_string(),
            delivery_date: None,
            notes: None,
            items: vec![DeliveryItemInput {
                product_id: product,
                quantity: 3,
                unit_price: None,
            }],
        })
        .await
        .unwrap();
    let id = delivery.delivery.id;
    assert!(delivery.delivery.reference_number.starts_with("DEL-"));
    assert_eq!(delivery.items.len(), 1);

    // Skipping a step is rejected.
    let err = services
        .deliveries
        .update_status(id, DeliveryStatus::Dispatched)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));

    for next in [
        DeliveryStatus::Waiting,
        DeliveryStatus::Dispatched,
        DeliveryStatus::Delivered,
    ] {
        services.deliveries.update_status(id, next).await.unwrap();
    }

    // Outbound paperwork does not write the inventory tables.
    let inventory = services.products.inventory(product).await.unwrap();
    assert!(inventory.is_empty());
    let movements = services.products.movements(product, 50).await.unwrap();
    assert!(movements.is_empty());

    // Delivered is terminal.
    let err = services.deliveries.delete(id).await.unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn transfer_requires_two_distinct_existing_warehouses() {
    let (services, _rx) = common::setup().await;
    let (_, warehouse) = seed(&services).await;
    let other = services
        .warehouses
        .create(CreateWarehouseInput {
            name: "Annex".to_string(),
            location: None,
        })
        .await
        .unwrap()
        .id;

    let err = services
        .transfers
        .create(CreateTransferInput {
            reference_number: None,
            from_warehouse_id: warehouse,
            to_warehouse_id: warehouse,
            transfer_date: None,
            notes: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = services
        .transfers
        .create(CreateTransferInput {
            reference_number: None,
            from_warehouse_id: warehouse,
            to_warehouse_id: 9999,
            transfer_date: None,
            notes: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let transfer = services
        .transfers
        .create(CreateTransferInput {
            reference_number: Some("TRF-42".to_string()),
            from_warehouse_id: warehouse,
            to_warehouse_id: other,
            transfer_date: None,
            notes: None,
        })
        .await
        .unwrap();
    assert_eq!(transfer.reference_number, "TRF-42");
    assert_eq!(transfer.status, "draft");

    let listed = services.transfers.list().await.unwrap();
    assert_eq!(listed.len(), 1);
}
