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
        receipt::{self, Entity as ReceiptEntity},
        supplier::{self, Entity as SupplierEntity},
    },
    errors::ServiceError,
};

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateSupplierInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, utoipa::ToSchema)]
pub struct UpdateSupplierInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Clone)]
pub struct SupplierService {
    db: Arc<DatabaseConnection>,
}

impl SupplierService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<supplier::Model>, ServiceError> {
        SupplierEntity::find()
            .order_by(supplier::Column::Name, Order::Asc)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<supplier::Model, ServiceError> {
        SupplierEntity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Supplier {} not found", id)))
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateSupplierInput) -> Result<supplier::Model, ServiceError> {
        input.validate()?;

        let model = supplier::ActiveModel {
            name: Set(input.name),
            email: Set(input.email),
            phone: Set(input.phone),
            address: Set(input.address),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        model.insert(&*self.db).await.map_err(ServiceError::db_error)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: i64,
        input: UpdateSupplierInput,
    ) -> Result<supplier::Model, ServiceError> {
        input.validate()?;

        let existing = self.get(id).await?;
        let mut model: supplier::ActiveModel = existing.into();
        if let Some(name) = input.name {
            model.name = Set(name);
        }
        if let Some(email) = input.email {
            model.email = Set(Some(email));
        }
        if let Some(phone) = input.phone {
            model.phone = Set(Some(phone));
        }
        if let Some(address) = input.address {
            model.address = Set(Some(address));
        }
        model.update(&*self.db).await.map_err(ServiceError::db_error)
    }

    /// Suppliers referenced by receipts cannot be removed; history must keep
    /// resolving.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        self.get(id).await?;

        let in_use = ReceiptEntity::find()
            .filter(receipt::Column::SupplierId.eq(id))
            .count(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        if in_use > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Supplier {} is referenced by {} receipt(s) and cannot be deleted",
                id, in_use
            )));
        }

        SupplierEntity::delete_by_id(id)
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(())
    }
}
