use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use validator::Validate;

use crate::{
    entities::{
        inventory_level::{self, Entity as InventoryLevelEntity},
        receipt::{self, Entity as ReceiptEntity},
        warehouse::{self, Entity as WarehouseEntity},
    },
    errors::ServiceError,
};

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateWarehouseInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, utoipa::ToSchema)]
pub struct UpdateWarehouseInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub location: Option<String>,
}

#[derive(Clone)]
pub struct WarehouseService {
    db: Arc<DatabaseConnection>,
}

impl WarehouseService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<warehouse::Model>, ServiceError> {
        WarehouseEntity::find()
            .order_by(warehouse::Column::Name, Order::Asc)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<warehouse::Model, ServiceError> {
        WarehouseEntity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Warehouse {} not found", id)))
    }

    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        input: CreateWarehouseInput,
    ) -> Result<warehouse::Model, ServiceError> {
        input.validate()?;

        let model = warehouse::ActiveModel {
            name: Set(input.name),
            location: Set(input.location),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        model.insert(&*self.db).await.map_err(ServiceError::db_error)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: i64,
        input: UpdateWarehouseInput,
    ) -> Result<warehouse::Model, ServiceError> {
        input.validate()?;

        let existing = self.get(id).await?;
        let mut model: warehouse::ActiveModel = existing.into();
        if let Some(name) = input.name {
            model.name = Set(name);
        }
        if let Some(location) = input.location {
            model.location = Set(Some(location));
        }
        model.update(&*self.db).await.map_err(ServiceError::db_error)
    }

    /// A warehouse can be removed only while nothing points at it: no stock
    /// rows and no receipts.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        self.get(id).await?;

        let stocked = InventoryLevelEntity::find()
            .filter(inventory_level::Column::WarehouseId.eq(id))
            .filter(inventory_level::Column::Quantity.gt(0))
            .count(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if stocked > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Warehouse {} still holds stock and cannot be deleted",
                id
            )));
        }

        let in_use = ReceiptEntity::find()
            .filter(receipt::Column::WarehouseId.eq(id))
            .count(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if in_use > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Warehouse {} is referenced by {} receipt(s) and cannot be deleted",
                id, in_use
            )));
        }

        WarehouseEntity::delete_by_id(id)
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(())
    }
}
