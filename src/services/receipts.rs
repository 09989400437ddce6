use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, Order, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    entities::{
        inventory_level::{self, Entity as InventoryLevelEntity},
        product::{self, Entity as ProductEntity},
        receipt::{self, Entity as ReceiptEntity, ReceiptStatus},
        receipt_item::{self, Entity as ReceiptItemEntity},
        stock_movement,
        supplier::Entity as SupplierEntity,
        warehouse::Entity as WarehouseEntity,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Movement-ledger tag written by receipt posting.
pub const MOVEMENT_TYPE_RECEIPT: &str = "receipt";
pub const REFERENCE_TYPE_RECEIPT: &str = "receipt";

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct ReceiptItemInput {
    pub product_id: i64,
    #[validate(range(min = 1))]
    pub quantity: i32,
    /// Defaults to the product's current unit price when omitted.
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateReceiptInput {
    /// Generated (`REC-<timestamp>`) when omitted.
    pub reference_number: Option<String>,
    pub supplier_id: Option<i64>,
    pub warehouse_id: i64,
    pub expected_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    #[serde(default)]
    #[validate]
    pub items: Vec<ReceiptItemInput>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, utoipa::ToSchema)]
pub struct UpdateReceiptInput {
    pub supplier_id: Option<i64>,
    pub expected_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReceiptFilter {
    pub status: Option<ReceiptStatus>,
    pub warehouse_id: Option<i64>,
    /// Substring match on the reference number.
    pub search: Option<String>,
}

/// One row of the receipts listing: header plus the display fields the list
/// view needs.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptSummary {
    #[serde(flatten)]
    pub receipt: receipt::Model,
    pub supplier_name: Option<String>,
    pub warehouse_name: String,
    pub item_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptItemDetail {
    #[serde(flatten)]
    pub item: receipt_item::Model,
    pub product_name: String,
    pub product_sku: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptDetail {
    #[serde(flatten)]
    pub receipt: receipt::Model,
    pub supplier_name: Option<String>,
    pub warehouse_name: String,
    pub items: Vec<ReceiptItemDetail>,
}

#[derive(Clone)]
pub struct ReceiptService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl ReceiptService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, filter: ReceiptFilter) -> Result<Vec<ReceiptSummary>, ServiceError> {
        let mut query = ReceiptEntity::find().order_by(receipt::Column::CreatedAt, Order::Desc);
        if let Some(status) = filter.status {
            query = query.filter(receipt::Column::Status.eq(status.to_string()));
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(receipt::Column::WarehouseId.eq(warehouse_id));
        }
        let receipts = query.all(&*self.db).await.map_err(ServiceError::db_error)?;
        if receipts.is_empty() {
            return Ok(Vec::new());
        }

        let receipt_ids: Vec<i64> = receipts.iter().map(|r| r.id).collect();
        let supplier_ids: Vec<i64> = receipts.iter().filter_map(|r| r.supplier_id).collect();
        let warehouse_ids: Vec<i64> = receipts.iter().map(|r| r.warehouse_id).collect();

        let suppliers: HashMap<i64, String> = SupplierEntity::find()
            .filter(crate::entities::supplier::Column::Id.is_in(supplier_ids))
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect();

        let warehouses: HashMap<i64, String> = WarehouseEntity::find()
            .filter(crate::entities::warehouse::Column::Id.is_in(warehouse_ids))
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|w| (w.id, w.name))
            .collect();

        let mut item_counts: HashMap<i64, u64> = HashMap::new();
        for item in ReceiptItemEntity::find()
            .filter(receipt_item::Column::ReceiptId.is_in(receipt_ids))
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
        {
            *item_counts.entry(item.receipt_id).or_default() += 1;
        }

        let summaries = receipts
            .into_iter()
            .map(|r| ReceiptSummary {
                supplier_name: r.supplier_id.and_then(|id| suppliers.get(&id).cloned()),
                warehouse_name: warehouses.get(&r.warehouse_id).cloned().unwrap_or_default(),
                item_count: item_counts.get(&r.id).copied().unwrap_or(0),
                receipt: r,
            })
            .collect::<Vec<ReceiptSummary>>();

        // Search matches the reference number or the supplier name, so it is
        // applied after the names have been joined in.
        Ok(match filter.search {
            Some(search) => {
                let needle = search.to_lowercase();
                summaries
                    .into_iter()
                    .filter(|s| {
                        s.receipt.reference_number.to_lowercase().contains(&needle)
                            || s.supplier_name
                                .as_deref()
                                .is_some_and(|name| name.to_lowercase().contains(&needle))
                    })
                    .collect()
            }
            None => summaries,
        })
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<ReceiptDetail, ServiceError> {
        let receipt = self.get_model(id).await?;
        self.build_detail(receipt).await
    }

    async fn get_model(&self, id: i64) -> Result<receipt::Model, ServiceError> {
        ReceiptEntity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Receipt {} not found", id)))
    }

    async fn build_detail(&self, receipt: receipt::Model) -> Result<ReceiptDetail, ServiceError> {
        let supplier_name = match receipt.supplier_id {
            Some(supplier_id) => SupplierEntity::find_by_id(supplier_id)
                .one(&*self.db)
                .await
                .map_err(ServiceError::db_error)?
                .map(|s| s.name),
            None => None,
        };
        let warehouse_name = WarehouseEntity::find_by_id(receipt.warehouse_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .map(|w| w.name)
            .unwrap_or_default();

        let items = ReceiptItemEntity::find()
            .filter(receipt_item::Column::ReceiptId.eq(receipt.id))
            .order_by(receipt_item::Column::Id, Order::Asc)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        let product_ids: Vec<i64> = items.iter().map(|i| i.product_id).collect();
        let products: HashMap<i64, product::Model> = ProductEntity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let items = items
            .into_iter()
            .map(|item| {
                let (name, sku) = products
                    .get(&item.product_id)
                    .map(|p| (p.name.clone(), p.sku.clone()))
                    .unwrap_or_default();
                ReceiptItemDetail {
                    item,
                    product_name: name,
                    product_sku: sku,
                }
            })
            .collect();

        Ok(ReceiptDetail {
            receipt,
            supplier_name,
            warehouse_name,
            items,
        })
    }

    /// Creates a draft receipt and its line items in one transaction.
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateReceiptInput) -> Result<ReceiptDetail, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        WarehouseEntity::find_by_id(input.warehouse_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Warehouse {} does not exist",
                    input.warehouse_id
                ))
            })?;
        if let Some(supplier_id) = input.supplier_id {
            SupplierEntity::find_by_id(supplier_id)
                .one(&txn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!("Supplier {} does not exist", supplier_id))
                })?;
        }

        let reference_number = input
            .reference_number
            .unwrap_or_else(|| format!("REC-{}", Utc::now().timestamp_millis()));

        let header = receipt::ActiveModel {
            reference_number: Set(reference_number),
            supplier_id: Set(input.supplier_id),
            warehouse_id: Set(input.warehouse_id),
            expected_date: Set(input.expected_date),
            status: Set(ReceiptStatus::Draft.to_string()),
            notes: Set(input.notes),
            created_by: Set(input.created_by),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
            ..Default::default()
        };
        let created = header.insert(&txn).await.map_err(ServiceError::db_error)?;

        for item in &input.items {
            Self::insert_item(&txn, created.id, item).await?;
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(receipt_id = created.id, reference = %created.reference_number, "receipt created");
        self.event_sender
            .send_or_log(Event::ReceiptCreated(created.id))
            .await;
        self.build_detail(created).await
    }

    async fn insert_item(
        txn: &DatabaseTransaction,
        receipt_id: i64,
        input: &ReceiptItemInput,
    ) -> Result<receipt_item::Model, ServiceError> {
        if input.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Item quantity must be positive".to_string(),
            ));
        }
        let product = ProductEntity::find_by_id(input.product_id)
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("Product {} does not exist", input.product_id))
            })?;
        if !product.is_active {
            return Err(ServiceError::ValidationError(format!(
                "Product {} is inactive and cannot be received",
                product.id
            )));
        }

        let unit_price = input.unit_price.unwrap_or(product.unit_price);
        let total_price = unit_price * Decimal::from(input.quantity);

        receipt_item::ActiveModel {
            receipt_id: Set(receipt_id),
            product_id: Set(input.product_id),
            quantity: Set(input.quantity),
            unit_price: Set(unit_price),
            total_price: Set(total_price),
            received_quantity: Set(0),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(ServiceError::db_error)
    }

    /// Updates header fields. Terminal receipts are immutable.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: i64,
        input: UpdateReceiptInput,
    ) -> Result<ReceiptDetail, ServiceError> {
        input.validate()?;

        let existing = self.get_model(id).await?;
        let status = existing
            .status()
            .map_err(|_| ServiceError::InternalError(format!("Receipt {} has corrupt status", id)))?;
        if status.is_terminal() {
            return Err(ServiceError::InvalidOperation(format!(
                "Receipt {} is {} and can no longer be edited",
                id, existing.status
            )));
        }

        if let Some(supplier_id) = input.supplier_id {
            SupplierEntity::find_by_id(supplier_id)
                .one(&*self.db)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!("Supplier {} does not exist", supplier_id))
                })?;
        }

        let mut model: receipt::ActiveModel = existing.into();
        if let Some(supplier_id) = input.supplier_id {
            model.supplier_id = Set(Some(supplier_id));
        }
        if let Some(expected_date) = input.expected_date {
            model.expected_date = Set(Some(expected_date));
        }
        if let Some(notes) = input.notes {
            model.notes = Set(Some(notes));
        }
        model.updated_at = Set(Some(Utc::now()));

        let updated = model.update(&*self.db).await.map_err(ServiceError::db_error)?;
        self.build_detail(updated).await
    }

    /// Moves a receipt through its lifecycle. The transition into `Validated`
    /// posts every line to inventory and writes the movement ledger, all in
    /// the same transaction as the status flip. A receipt that is already
    /// validated (or cancelled) admits no further transitions, so stock can
    /// never be posted twice for the same receipt.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: i64,
        new_status: ReceiptStatus,
    ) -> Result<ReceiptDetail, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        let existing = ReceiptEntity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Receipt {} not found", id)))?;

        let current = existing
            .status()
            .map_err(|_| ServiceError::InternalError(format!("Receipt {} has corrupt status", id)))?;
        if !current.can_transition_to(new_status) {
            return Err(ServiceError::InvalidStatus(format!(
                "Receipt {} cannot move from {} to {}",
                id, current, new_status
            )));
        }

        let old_status = existing.status.clone();
        let mut model: receipt::ActiveModel = existing.into();
        model.status = Set(new_status.to_string());
        model.updated_at = Set(Some(Utc::now()));
        let updated = model.update(&txn).await.map_err(ServiceError::db_error)?;

        if new_status == ReceiptStatus::Validated {
            self.post_to_inventory(&txn, &updated).await?;
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(
            receipt_id = id,
            from = %old_status,
            to = %new_status,
            "receipt status changed"
        );
        self.event_sender
            .send_or_log(Event::ReceiptStatusChanged {
                receipt_id: id,
                old_status,
                new_status: new_status.to_string(),
            })
            .await;
        if new_status == ReceiptStatus::Validated {
            self.event_sender
                .send_or_log(Event::ReceiptValidated(id))
                .await;
        }

        self.build_detail(updated).await
    }

    /// Applies every line of a validated receipt to stock: an additive upsert
    /// on the (product, warehouse) level row plus one ledger row per line.
    async fn post_to_inventory(
        &self,
        txn: &DatabaseTransaction,
        receipt: &receipt::Model,
    ) -> Result<(), ServiceError> {
        let items = ReceiptItemEntity::find()
            .filter(receipt_item::Column::ReceiptId.eq(receipt.id))
            .all(txn)
            .await
            .map_err(ServiceError::db_error)?;

        let now = Utc::now();
        for item in items {
            // Lines can outlive their product row only if someone bypassed the
            // soft delete; refuse to post rather than ledger a ghost product.
            ProductEntity::find_by_id(item.product_id)
                .one(txn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::InvalidOperation(format!(
                        "Product {} on receipt {} no longer exists",
                        item.product_id, receipt.id
                    ))
                })?;

            let level = inventory_level::ActiveModel {
                product_id: Set(item.product_id),
                warehouse_id: Set(receipt.warehouse_id),
                quantity: Set(item.quantity),
                last_updated: Set(now),
                ..Default::default()
            };
            InventoryLevelEntity::insert(level)
                .on_conflict(
                    OnConflict::columns([
                        inventory_level::Column::ProductId,
                        inventory_level::Column::WarehouseId,
                    ])
                    .value(
                        inventory_level::Column::Quantity,
                        Expr::col(inventory_level::Column::Quantity).add(item.quantity),
                    )
                    .value(inventory_level::Column::LastUpdated, now)
                    .to_owned(),
                )
                .exec(txn)
                .await
                .map_err(ServiceError::db_error)?;

            stock_movement::ActiveModel {
                product_id: Set(item.product_id),
                warehouse_id: Set(receipt.warehouse_id),
                movement_type: Set(MOVEMENT_TYPE_RECEIPT.to_string()),
                quantity: Set(item.quantity),
                reference_type: Set(Some(REFERENCE_TYPE_RECEIPT.to_string())),
                reference_id: Set(Some(receipt.id)),
                notes: Set(Some(format!("Receipt {}", receipt.reference_number))),
                created_by: Set(receipt.created_by),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(txn)
            .await
            .map_err(ServiceError::db_error)?;

            let mut received: receipt_item::ActiveModel = item.clone().into();
            received.received_quantity = Set(item.quantity);
            received.update(txn).await.map_err(ServiceError::db_error)?;
        }
        Ok(())
    }

    /// Removes a receipt and its lines. Validated receipts are part of the
    /// inventory audit trail and cannot be deleted.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let existing = self.get_model(id).await?;
        if existing.status() == Ok(ReceiptStatus::Validated) {
            return Err(ServiceError::InvalidOperation(format!(
                "Receipt {} has been validated and cannot be deleted",
                id
            )));
        }

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        ReceiptItemEntity::delete_many()
            .filter(receipt_item::Column::ReceiptId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        ReceiptEntity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(receipt_id = id, "receipt deleted");
        Ok(())
    }

    /// Adds a line to an open receipt.
    #[instrument(skip(self, input))]
    pub async fn add_item(
        &self,
        receipt_id: i64,
        input: ReceiptItemInput,
    ) -> Result<receipt_item::Model, ServiceError> {
        input.validate()?;
        let receipt = self.get_open(receipt_id).await?;

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let created = Self::insert_item(&txn, receipt.id, &input).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(created)
    }

    /// Changes quantity or price on a line of an open receipt.
    #[instrument(skip(self, input))]
    pub async fn update_item(
        &self,
        receipt_id: i64,
        item_id: i64,
        input: ReceiptItemInput,
    ) -> Result<receipt_item::Model, ServiceError> {
        input.validate()?;
        self.get_open(receipt_id).await?;

        let item = ReceiptItemEntity::find_by_id(item_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .filter(|i| i.receipt_id == receipt_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Item {} not found on receipt {}",
                    item_id, receipt_id
                ))
            })?;

        let product = ProductEntity::find_by_id(input.product_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("Product {} does not exist", input.product_id))
            })?;

        let unit_price = input.unit_price.unwrap_or(product.unit_price);
        let mut model: receipt_item::ActiveModel = item.into();
        model.product_id = Set(input.product_id);
        model.quantity = Set(input.quantity);
        model.unit_price = Set(unit_price);
        model.total_price = Set(unit_price * Decimal::from(input.quantity));
        model.update(&*self.db).await.map_err(ServiceError::db_error)
    }

    /// Removes a line from an open receipt.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, receipt_id: i64, item_id: i64) -> Result<(), ServiceError> {
        self.get_open(receipt_id).await?;

        let deleted = ReceiptItemEntity::delete_many()
            .filter(receipt_item::Column::Id.eq(item_id))
            .filter(receipt_item::Column::ReceiptId.eq(receipt_id))
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if deleted.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Item {} not found on receipt {}",
                item_id, receipt_id
            )));
        }
        Ok(())
    }

    async fn get_open(&self, id: i64) -> Result<receipt::Model, ServiceError> {
        let receipt = self.get_model(id).await?;
        let status = receipt
            .status()
            .map_err(|_| ServiceError::InternalError(format!("Receipt {} has corrupt status", id)))?;
        if status.is_terminal() {
            return Err(ServiceError::InvalidOperation(format!(
                "Receipt {} is {} and its lines can no longer change",
                id, receipt.status
            )));
        }
        Ok(receipt)
    }
}
