mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use stockroom_api::{
    entities::{product::Entity as ProductEntity, receipt::ReceiptStatus},
    errors::ServiceError,
    services::{
        products::CreateProductInput,
        receipts::{CreateReceiptInput, ReceiptFilter, ReceiptItemInput},
        suppliers::CreateSupplierInput,
        warehouses::CreateWarehouseInput,
    },
    AppServices,
};

async fn seed_product(services: &AppServices, name: &str, sku: &str) -> i64 {
    services
        .products
        .create(CreateProductInput {
            name: name.to_string(),
            sku: sku.to_string(),
            description: None,
            category: None,
            unit_price: dec!(9.50),
            reorder_level: 5,
        })
        .await
        .expect("failed to create product")
        .id
}

async fn seed_warehouse(services: &AppServices, name: &str) -> i64 {
    services
        .warehouses
        .create(CreateWarehouseInput {
            name: name.to_string(),
            location: None,
        })
        .await
        .expect("failed to create warehouse")
        .id
}

async fn quantity_in(services: &AppServices, product_id: i64, warehouse_id: i64) -> i32 {
    services
        .products
        .inventory(product_id)
        .await
        .expect("failed to read inventory")
        .into_iter()
        .find(|row| row.warehouse_id == warehouse_id)
        .map(|row| row.quantity)
        .unwrap_or(0)
}

#[tokio::test]
async fn validating_a_receipt_posts_stock_and_writes_the_ledger() {
    let (services, _rx) = common::setup().await;

    let widget = seed_product(&services, "Widget", "WID-001").await;
    let gadget = seed_product(&services, "Gadget", "GAD-001").await;
    let warehouse = seed_warehouse(&services, "Main").await;
    let supplier = services
        .suppliers
        .create(CreateSupplierInput {
            name: "Acme Supply".to_string(),
            email: None,
            phone: None,
            address: None,
        })
        .await
        .unwrap()
        .id;

    let receipt = services
        .receipts
        .create(CreateReceiptInput {
            reference_number: Some("REC-1001".to_string()),
            supplier_id: Some(supplier),
            warehouse_id: warehouse,
            expected_date: None,
            notes: None,
            created_by: None,
            items: vec![
                ReceiptItemInput {
                    product_id: widget,
                    quantity: 10,
                    unit_price: None,
                },
                ReceiptItemInput {
                    product_id: gadget,
                    quantity: 3,
                    unit_price: Some(dec!(2.25)),
                },
            ],
        })
        .await
        .unwrap();
    assert_eq!(receipt.receipt.status, "draft");
    assert_eq!(receipt.items.len(), 2);

    // Nothing is in stock until the receipt is validated.
    assert_eq!(quantity_in(&services, widget, warehouse).await, 0);

    let validated = services
        .receipts
        .update_status(receipt.receipt.id, ReceiptStatus::Validated)
        .await
        .unwrap();
    assert_eq!(validated.receipt.status, "validated");
    assert!(validated.items.iter().all(|i| i.item.received_quantity == i.item.quantity));

    assert_eq!(quantity_in(&services, widget, warehouse).await, 10);
    assert_eq!(quantity_in(&services, gadget, warehouse).await, 3);

    let movements = services.products.movements(widget, 50).await.unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].movement_type, "receipt");
    assert_eq!(movements[0].quantity, 10);
    assert_eq!(movements[0].reference_type.as_deref(), Some("receipt"));
    assert_eq!(movements[0].reference_id, Some(receipt.receipt.id));
}

#[tokio::test]
async fn a_validated_receipt_cannot_be_validated_again() {
    let (services, _rx) = common::setup().await;

    let product = seed_product(&services, "Widget", "WID-001").await;
    let warehouse = seed_warehouse(&services, "Main").await;

    let receipt = services
        .receipts
        .create(CreateReceiptInput {
            reference_number: None,
            supplier_id: None,
            warehouse_id: warehouse,
            expected_date: None,
            notes: None,
            created_by: None,
            items: vec![ReceiptItemInput {
                product_id: product,
                quantity: 10,
                unit_price: None,
            }],
        })
        .await
        .unwrap();

    services
        .receipts
        .update_status(receipt.receipt.id, ReceiptStatus::Validated)
        .await
        .unwrap();
    assert_eq!(quantity_in(&services, product, warehouse).await, 10);

    let err = services
        .receipts
        .update_status(receipt.receipt.id, ReceiptStatus::Validated)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));

    // The double validation posted nothing.
    assert_eq!(quantity_in(&services, product, warehouse).await, 10);
    let movements = services.products.movements(product, 50).await.unwrap();
    assert_eq!(movements.len(), 1);
}

#[tokio::test]
async fn illegal_transitions_are_rejected() {
    let (services, _rx) = common::setup().await;

    let product = seed_product(&services, "Widget", "WID-001").await;
    let warehouse = seed_warehouse(&services, "Main").await;

    let receipt = services
        .receipts
        .create(CreateReceiptInput {
            reference_number: None,
            supplier_id: None,
            warehouse_id: warehouse,
            expected_date: None,
            notes: None,
            created_by: None,
            items: vec![ReceiptItemInput {
                product_id: product,
                quantity: 4,
                unit_price: None,
            }],
        })
        .await
        .unwrap();
    let id = receipt.receipt.id;

    services
        .receipts
        .update_status(id, ReceiptStatus::Cancelled)
        .await
        .unwrap();

    // Cancelled is terminal and cancellation never posts stock.
    for next in [
        ReceiptStatus::Draft,
        ReceiptStatus::Waiting,
        ReceiptStatus::Validated,
    ] {
        let err = services.receipts.update_status(id, next).await.unwrap_err();
        assert_matches!(err, ServiceError::InvalidStatus(_));
    }
    assert_eq!(quantity_in(&services, product, warehouse).await, 0);
}

#[tokio::test]
async fn successive_receipts_accumulate_stock() {
    let (services, _rx) = common::setup().await;

    let product = seed_product(&services, "Widget", "WID-001").await;
    let warehouse = seed_warehouse(&services, "Main").await;

    for quantity in [10, 5] {
        let receipt = services
            .receipts
            .create(CreateReceiptInput {
                reference_number: None,
                supplier_id: None,
                warehouse_id: warehouse,
                expected_date: None,
                notes: None,
                created_by: None,
                items: vec![ReceiptItemInput {
                    product_id: product,
                    quantity,
                    unit_price: None,
                }],
            })
            .await
            .unwrap();
        services
            .receipts
            .update_status(receipt.receipt.id, ReceiptStatus::Validated)
            .await
            .unwrap();
    }

    // The second validation hits the upsert's conflict path.
    assert_eq!(quantity_in(&services, product, warehouse).await, 15);
    let movements = services.products.movements(product, 50).await.unwrap();
    assert_eq!(movements.len(), 2);
}

#[tokio::test]
async fn listing_filters_by_status_and_joins_names() {
    let (services, _rx) = common::setup().await;

    let product = seed_product(&services, "Widget", "WID-001").await;
    let warehouse = seed_warehouse(&services, "Main").await;
    let supplier = services
        .suppliers
        .create(CreateSupplierInput {
            name: "Acme Supply".to_string(),
            email: None,
            phone: None,
            address: None,
        })
        .await
        .unwrap()
        .id;

    let first = services
        .receipts
        .create(CreateReceiptInput {
            reference_number: Some("REC-A".to_string()),
            supplier_id: Some(supplier),
            warehouse_id: warehouse,
            expected_date: None,
            notes: None,
            created_by: None,
            items: vec![ReceiptItemInput {
                product_id: product,
                quantity: 1,
                unit_price: None,
            }],
        })
        .await
        .unwrap();
    services
        .receipts
        .create(CreateReceiptInput {
            reference_number: Some("REC-B".to_string()),
            supplier_id: None,
            warehouse_id: warehouse,
            expected_date: None,
            notes: None,
            created_by: None,
            items: vec![],
        })
        .await
        .unwrap();
    services
        .receipts
        .update_status(first.receipt.id, ReceiptStatus::Validated)
        .await
        .unwrap();

    let validated = services
        .receipts
        .list(ReceiptFilter {
            status: Some(ReceiptStatus::Validated),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(validated.len(), 1);
    assert_eq!(validated[0].receipt.reference_number, "REC-A");
    assert_eq!(validated[0].supplier_name.as_deref(), Some("Acme Supply"));
    assert_eq!(validated[0].warehouse_name, "Main");
    assert_eq!(validated[0].item_count, 1);

    let all = services.receipts.list(ReceiptFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);

    // Search matches the reference number or the supplier name.
    let by_reference = services
        .receipts
        .list(ReceiptFilter {
            search: Some("rec-b".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_reference.len(), 1);
    assert_eq!(by_reference[0].receipt.reference_number, "REC-B");

    let by_supplier = services
        .receipts
        .list(ReceiptFilter {
            search: Some("acme".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_supplier.len(), 1);
    assert_eq!(by_supplier[0].receipt.reference_number, "REC-A");
}

#[tokio::test]
async fn line_edits_are_locked_after_validation() {
    let (services, _rx) = common::setup().await;

    let product = seed_product(&services, "Widget", "WID-001").await;
    let warehouse = seed_warehouse(&services, "Main").await;

    let receipt = services
        .receipts
        .create(CreateReceiptInput {
            reference_number: None,
            supplier_id: None,
            warehouse_id: warehouse,
            expected_date: None,
            notes: None,
            created_by: None,
            items: vec![],
        })
        .await
        .unwrap();
    let id = receipt.receipt.id;

    let item = services
        .receipts
        .add_item(
            id,
            ReceiptItemInput {
                product_id: product,
                quantity: 2,
                unit_price: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(item.total_price, dec!(19.00));

    services
        .receipts
        .update_status(id, ReceiptStatus::Validated)
        .await
        .unwrap();

    let err = services
        .receipts
        .add_item(
            id,
            ReceiptItemInput {
                product_id: product,
                quantity: 1,
                unit_price: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));

    let err = services.receipts.delete(id).await.unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn a_failed_posting_rolls_back_the_whole_receipt() {
    let (services, db, _rx) = common::setup_with_db().await;

    let widget = seed_product(&services, "Widget", "WID-001").await;
    let gadget = seed_product(&services, "Gadget", "GAD-001").await;
    let warehouse = seed_warehouse(&services, "Main").await;

    let receipt = services
        .receipts
        .create(CreateReceiptInput {
            reference_number: None,
            supplier_id: None,
            warehouse_id: warehouse,
            expected_date: None,
            notes: None,
            created_by: None,
            items: vec![
                ReceiptItemInput {
                    product_id: widget,
                    quantity: 10,
                    unit_price: None,
                },
                ReceiptItemInput {
                    product_id: gadget,
                    quantity: 3,
                    unit_price: None,
                },
            ],
        })
        .await
        .unwrap();
    let id = receipt.receipt.id;

    // Rip the second product out from under the receipt, bypassing the soft
    // delete. Posting processes the first line before it trips on this one.
    ProductEntity::delete_by_id(gadget)
        .exec(&*db)
        .await
        .unwrap();

    let err = services
        .receipts
        .update_status(id, ReceiptStatus::Validated)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));

    // All-or-nothing: the status flip and the first line's stock and ledger
    // writes must have rolled back together.
    let unchanged = services.receipts.get(id).await.unwrap();
    assert_eq!(unchanged.receipt.status, "draft");
    assert_eq!(quantity_in(&services, widget, warehouse).await, 0);
    assert!(services.products.movements(widget, 50).await.unwrap().is_empty());
    assert!(unchanged.items.iter().all(|i| i.item.received_quantity == 0));
}
