use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
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
        delivery::{self, DeliveryStatus, Entity as DeliveryEntity},
        delivery_item::{self, Entity as DeliveryItemEntity},
        product::{self, Entity as ProductEntity},
        warehouse::Entity as WarehouseEntity,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct DeliveryItemInput {
    pub product_id: i64,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateDeliveryInput {
    /// Generated (`DEL-<timestamp>`) when omitted.
    pub reference_number: Option<String>,
    pub warehouse_id: i64,
    #[validate(length(min = 1, max = 255))]
    pub destination: String,
    pub delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[serde(default)]
    #[validate]
    pub items: Vec<DeliveryItemInput>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, utoipa::ToSchema)]
pub struct UpdateDeliveryInput {
    #[validate(length(min = 1, max = 255))]
    pub destination: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryFilter {
    pub status: Option<DeliveryStatus>,
    pub warehouse_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryItemDetail {
    #[serde(flatten)]
    pub item: delivery_item::Model,
    pub product_name: String,
    pub product_sku: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryDetail {
    #[serde(flatten)]
    pub delivery: delivery::Model,
    pub warehouse_name: String,
    pub items: Vec<DeliveryItemDetail>,
}

#[derive(Clone)]
pub struct DeliveryService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl DeliveryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, filter: DeliveryFilter) -> Result<Vec<delivery::Model>, ServiceError> {
        let mut query = DeliveryEntity::find().order_by(delivery::Column::CreatedAt, Order::Desc);
        if let Some(status) = filter.status {
            query = query.filter(delivery::Column::Status.eq(status.to_string()));
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(delivery::Column::WarehouseId.eq(warehouse_id));
        }
        query.all(&*self.db).await.map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<DeliveryDetail, ServiceError> {
        let delivery = self.get_model(id).await?;
        self.build_detail(delivery).await
    }

    async fn get_model(&self, id: i64) -> Result<delivery::Model, ServiceError> {
        DeliveryEntity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Delivery {} not found", id)))
    }

    async fn build_detail(&self, delivery: delivery::Model) -> Result<DeliveryDetail, ServiceError> {
        let warehouse_name = WarehouseEntity::find_by_id(delivery.warehouse_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .map(|w| w.name)
            .unwrap_or_default();

        let items = DeliveryItemEntity::find()
            .filter(delivery_item::Column::DeliveryId.eq(delivery.id))
            .order_by(delivery_item::Column::Id, Order::Asc)
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
                DeliveryItemDetail {
                    item,
                    product_name: name,
                    product_sku: sku,
                }
            })
            .collect();

        Ok(DeliveryDetail {
            delivery,
            warehouse_name,
            items,
        })
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateDeliveryInput) -> Result<DeliveryDetail, ServiceError> {
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

        let reference_number = input
            .reference_number
            .unwrap_or_else(|| format!("DEL-{}", Utc::now().timestamp_millis()));

        let header = delivery::ActiveModel {
            reference_number: Set(reference_number),
            warehouse_id: Set(input.warehouse_id),
            destination: Set(input.destination),
            delivery_date: Set(input.delivery_date),
            status: Set(DeliveryStatus::Draft.to_string()),
            notes: Set(input.notes),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
            ..Default::default()
        };
        let created = header.insert(&txn).await.map_err(ServiceError::db_error)?;

        for item in &input.items {
            Self::insert_item(&txn, created.id, item).await?;
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(delivery_id = created.id, reference = %created.reference_number, "delivery created");
        self.event_sender
            .send_or_log(Event::DeliveryCreated(created.id))
            .await;
        self.build_detail(created).await
    }

    async fn insert_item(
        txn: &DatabaseTransaction,
        delivery_id: i64,
        input: &DeliveryItemInput,
    ) -> Result<delivery_item::Model, ServiceError> {
        let product = ProductEntity::find_by_id(input.product_id)
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("Product {} does not exist", input.product_id))
            })?;

        delivery_item::ActiveModel {
            delivery_id: Set(delivery_id),
            product_id: Set(input.product_id),
            quantity: Set(input.quantity),
            unit_price: Set(input.unit_price.unwrap_or(product.unit_price)),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: i64,
        input: UpdateDeliveryInput,
    ) -> Result<DeliveryDetail, ServiceError> {
        input.validate()?;

        let existing = self.get_model(id).await?;
        let status = existing.status().map_err(|_| {
            ServiceError::InternalError(format!("Delivery {} has corrupt status", id))
        })?;
        if status == DeliveryStatus::Delivered {
            return Err(ServiceError::InvalidOperation(format!(
                "Delivery {} is delivered and can no longer be edited",
                id
            )));
        }

        let mut model: delivery::ActiveModel = existing.into();
        if let Some(destination) = input.destination {
            model.destination = Set(destination);
        }
        if let Some(delivery_date) = input.delivery_date {
            model.delivery_date = Set(Some(delivery_date));
        }
        if let Some(notes) = input.notes {
            model.notes = Set(Some(notes));
        }
        model.updated_at = Set(Some(Utc::now()));

        let updated = model.update(&*self.db).await.map_err(ServiceError::db_error)?;
        self.build_detail(updated).await
    }

    /// Deliveries progress strictly draft → waiting → dispatched → delivered.
    /// They record outbound paperwork only and never adjust stock.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: i64,
        new_status: DeliveryStatus,
    ) -> Result<DeliveryDetail, ServiceError> {
        let existing = self.get_model(id).await?;
        let current = existing.status().map_err(|_| {
            ServiceError::InternalError(format!("Delivery {} has corrupt status", id))
        })?;
        if !current.can_transition_to(new_status) {
            return Err(ServiceError::InvalidStatus(format!(
                "Delivery {} cannot move from {} to {}",
                id, current, new_status
            )));
        }

        let old_status = existing.status.clone();
        let mut model: delivery::ActiveModel = existing.into();
        model.status = Set(new_status.to_string());
        model.updated_at = Set(Some(Utc::now()));
        let updated = model.update(&*self.db).await.map_err(ServiceError::db_error)?;

        self.event_sender
            .send_or_log(Event::DeliveryStatusChanged {
                delivery_id: id,
                old_status,
                new_status: new_status.to_string(),
            })
            .await;
        self.build_detail(updated).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let existing = self.get_model(id).await?;
        if existing.status() == Ok(DeliveryStatus::Delivered) {
            return Err(ServiceError::InvalidOperation(format!(
                "Delivery {} is delivered and cannot be deleted",
                id
            )));
        }

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        DeliveryItemEntity::delete_many()
            .filter(delivery_item::Column::DeliveryId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        DeliveryEntity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(())
    }

    #[instrument(skip(self, input))]
    pub async fn add_item(
        &self,
        delivery_id: i64,
        input: DeliveryItemInput,
    ) -> Result<delivery_item::Model, ServiceError> {
        input.validate()?;
        let delivery = self.get_model(delivery_id).await?;
        if delivery.status() == Ok(DeliveryStatus::Delivered) {
            return Err(ServiceError::InvalidOperation(format!(
                "Delivery {} is delivered and its lines can no longer change",
                delivery_id
            )));
        }

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let created = Self::insert_item(&txn, delivery_id, &input).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, delivery_id: i64, item_id: i64) -> Result<(), ServiceError> {
        let delivery = self.get_model(delivery_id).await?;
        if delivery.status() == Ok(DeliveryStatus::Delivered) {
            return Err(ServiceError::InvalidOperation(format!(
                "Delivery {} is delivered and its lines can no longer change",
                delivery_id
            )));
        }

        let deleted = DeliveryItemEntity::delete_many()
            .filter(delivery_item::Column::Id.eq(item_id))
            .filter(delivery_item::Column::DeliveryId.eq(delivery_id))
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if deleted.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Item {} not found on delivery {}",
                item_id, delivery_id
            )));
        }
        Ok(())
    }
}
