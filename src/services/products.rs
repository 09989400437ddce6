use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    entities::{
        inventory_level::{self, Entity as InventoryLevelEntity},
        product::{self, Entity as ProductEntity},
        stock_movement::{self, Entity as StockMovementEntity},
        warehouse::Entity as WarehouseEntity,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub unit_price: Decimal,
    #[serde(default)]
    pub reorder_level: i32,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, utoipa::ToSchema)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub unit_price: Option<Decimal>,
    pub reorder_level: Option<i32>,
}

/// Stock on hand for one product in one warehouse, joined with the warehouse
/// name for display.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ProductInventory {
    pub warehouse_id: i64,
    pub warehouse_name: String,
    pub quantity: i32,
}

#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Lists products, most recently created first. Inactive products are
    /// hidden unless `include_inactive` is set.
    #[instrument(skip(self))]
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<product::Model>, ServiceError> {
        let mut query = ProductEntity::find().order_by(product::Column::CreatedAt, Order::Desc);
        if !include_inactive {
            query = query.filter(product::Column::IsActive.eq(true));
        }
        query.all(&*self.db).await.map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<product::Model, ServiceError> {
        ProductEntity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateProductInput) -> Result<product::Model, ServiceError> {
        input.validate()?;

        let existing = ProductEntity::find()
            .filter(product::Column::Sku.eq(input.sku.clone()))
            .count(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if existing > 0 {
            return Err(ServiceError::Conflict(format!(
                "A product with SKU {} already exists",
                input.sku
            )));
        }

        let model = product::ActiveModel {
            name: Set(input.name),
            sku: Set(input.sku),
            description: Set(input.description),
            category: Set(input.category),
            unit_price: Set(input.unit_price),
            reorder_level: Set(input.reorder_level),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
            ..Default::default()
        };

        let created = model.insert(&*self.db).await.map_err(ServiceError::db_error)?;
        info!(product_id = created.id, sku = %created.sku, "product created");
        self.event_sender
            .send_or_log(Event::ProductCreated(created.id))
            .await;
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: i64,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;

        let existing = self.get(id).await?;
        let mut model: product::ActiveModel = existing.into();

        if let Some(name) = input.name {
            model.name = Set(name);
        }
        if let Some(description) = input.description {
            model.description = Set(Some(description));
        }
        if let Some(category) = input.category {
            model.category = Set(Some(category));
        }
        if let Some(unit_price) = input.unit_price {
            model.unit_price = Set(unit_price);
        }
        if let Some(reorder_level) = input.reorder_level {
            if reorder_level < 0 {
                return Err(ServiceError::ValidationError(
                    "reorder_level cannot be negative".to_string(),
                ));
            }
            model.reorder_level = Set(reorder_level);
        }
        model.updated_at = Set(Some(Utc::now()));

        let updated = model.update(&*self.db).await.map_err(ServiceError::db_error)?;
        self.event_sender
            .send_or_log(Event::ProductUpdated(updated.id))
            .await;
        Ok(updated)
    }

    /// Soft-deletes a product. The row is kept so existing receipt and
    /// movement history stays intact; the product simply stops appearing in
    /// listings and can no longer be put on new documents.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: i64) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        if !existing.is_active {
            return Err(ServiceError::InvalidOperation(format!(
                "Product {} is already inactive",
                id
            )));
        }

        let mut model: product::ActiveModel = existing.into();
        model.is_active = Set(false);
        model.updated_at = Set(Some(Utc::now()));
        model.update(&*self.db).await.map_err(ServiceError::db_error)?;

        info!(product_id = id, "product deactivated");
        self.event_sender
            .send_or_log(Event::ProductDeactivated(id))
            .await;
        Ok(())
    }

    /// Per-warehouse stock on hand for one product.
    #[instrument(skip(self))]
    pub async fn inventory(&self, id: i64) -> Result<Vec<ProductInventory>, ServiceError> {
        self.get(id).await?;

        let levels = InventoryLevelEntity::find()
            .filter(inventory_level::Column::ProductId.eq(id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut result = Vec::with_capacity(levels.len());
        for level in levels {
            let warehouse = WarehouseEntity::find_by_id(level.warehouse_id)
                .one(&*self.db)
                .await
                .map_err(ServiceError::db_error)?;
            result.push(ProductInventory {
                warehouse_id: level.warehouse_id,
                warehouse_name: warehouse.map(|w| w.name).unwrap_or_default(),
                quantity: level.quantity,
            });
        }
        Ok(result)
    }

    /// Movement ledger for one product, newest first.
    #[instrument(skip(self))]
    pub async fn movements(
        &self,
        id: i64,
        limit: u64,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        self.get(id).await?;

        StockMovementEntity::find()
            .filter(stock_movement::Column::ProductId.eq(id))
            .order_by(stock_movement::Column::CreatedAt, Order::Desc)
            .paginate(&*self.db, limit.max(1))
            .fetch_page(0)
            .await
            .map_err(ServiceError::db_error)
    }
}
