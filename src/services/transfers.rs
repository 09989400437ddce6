use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait, Order, QueryOrder,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    entities::{
        transfer::{self, Entity as TransferEntity},
        warehouse::Entity as WarehouseEntity,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateTransferInput {
    /// Generated (`TRF-<timestamp>`) when omitted.
    pub reference_number: Option<String>,
    pub from_warehouse_id: i64,
    pub to_warehouse_id: i64,
    pub transfer_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Transfer paperwork between warehouses. Like deliveries, transfers are
/// documents only and do not move stock.
#[derive(Clone)]
pub struct TransferService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl TransferService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<transfer::Model>, ServiceError> {
        TransferEntity::find()
            .order_by(transfer::Column::CreatedAt, Order::Desc)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<transfer::Model, ServiceError> {
        TransferEntity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Transfer {} not found", id)))
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CreateTransferInput) -> Result<transfer::Model, ServiceError> {
        input.validate()?;

        if input.from_warehouse_id == input.to_warehouse_id {
            return Err(ServiceError::ValidationError(
                "Source and destination warehouses must differ".to_string(),
            ));
        }
        for warehouse_id in [input.from_warehouse_id, input.to_warehouse_id] {
            WarehouseEntity::find_by_id(warehouse_id)
                .one(&*self.db)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "Warehouse {} does not exist",
                        warehouse_id
                    ))
                })?;
        }

        let reference_number = input
            .reference_number
            .unwrap_or_else(|| format!("TRF-{}", Utc::now().timestamp_millis()));

        let model = transfer::ActiveModel {
            reference_number: Set(reference_number),
            from_warehouse_id: Set(input.from_warehouse_id),
            to_warehouse_id: Set(input.to_warehouse_id),
            transfer_date: Set(input.transfer_date),
            status: Set("draft".to_string()),
            notes: Set(input.notes),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let created = model.insert(&*self.db).await.map_err(ServiceError::db_error)?;

        info!(transfer_id = created.id, reference = %created.reference_number, "transfer created");
        self.event_sender
            .send_or_log(Event::TransferCreated(created.id))
            .await;
        Ok(created)
    }
}
