use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use crate::{
    entities::{
        inventory_level::{self, Entity as InventoryLevelEntity},
        product::{self, Entity as ProductEntity},
        receipt::{self, Entity as ReceiptEntity, ReceiptStatus},
        stock_movement::{self, Entity as StockMovementEntity},
        warehouse::Entity as WarehouseEntity,
    },
    errors::ServiceError,
};

#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub total_products: u64,
    pub total_stock: i64,
    pub low_stock_count: u64,
    pub open_receipts: u64,
    pub validated_receipts: u64,
    pub recent_activity: Vec<ActivityEntry>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct InventoryRow {
    pub product_id: i64,
    pub product_name: String,
    pub sku: String,
    pub warehouse_id: i64,
    pub warehouse_name: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct LowStockRow {
    pub product_id: i64,
    pub product_name: String,
    pub sku: String,
    pub total_quantity: i64,
    pub reorder_level: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    #[serde(flatten)]
    pub movement: stock_movement::Model,
    pub product_name: String,
    pub warehouse_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityFilter {
    pub product_id: Option<i64>,
    pub warehouse_id: Option<i64>,
    pub movement_type: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Clone)]
pub struct ReportService {
    db: Arc<DatabaseConnection>,
}

impl ReportService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> Result<DashboardReport, ServiceError> {
        let total_products = ProductEntity::find()
            .filter(product::Column::IsActive.eq(true))
            .count(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        let levels = InventoryLevelEntity::find()
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        let total_stock: i64 = levels.iter().map(|l| i64::from(l.quantity)).sum();

        let low_stock_count = self.low_stock().await?.len() as u64;

        let open_receipts = ReceiptEntity::find()
            .filter(
                receipt::Column::Status.is_in([
                    ReceiptStatus::Draft.to_string(),
                    ReceiptStatus::Waiting.to_string(),
                ]),
            )
            .count(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        let validated_receipts = ReceiptEntity::find()
            .filter(receipt::Column::Status.eq(ReceiptStatus::Validated.to_string()))
            .count(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        let recent_activity = self
            .activity(ActivityFilter {
                limit: Some(10),
                ..Default::default()
            })
            .await?;

        Ok(DashboardReport {
            total_products,
            total_stock,
            low_stock_count,
            open_receipts,
            validated_receipts,
            recent_activity,
        })
    }

    /// Stock on hand for every (product, warehouse) pair that has a level
    /// row, joined with display names.
    #[instrument(skip(self))]
    pub async fn inventory(
        &self,
        warehouse_id: Option<i64>,
    ) -> Result<Vec<InventoryRow>, ServiceError> {
        let mut query = InventoryLevelEntity::find()
            .order_by(inventory_level::Column::ProductId, Order::Asc);
        if let Some(warehouse_id) = warehouse_id {
            query = query.filter(inventory_level::Column::WarehouseId.eq(warehouse_id));
        }
        let levels = query.all(&*self.db).await.map_err(ServiceError::db_error)?;

        let products = self.product_names().await?;
        let warehouses = self.warehouse_names().await?;

        Ok(levels
            .into_iter()
            .map(|level| {
                let (name, sku) = products
                    .get(&level.product_id)
                    .cloned()
                    .unwrap_or_default();
                InventoryRow {
                    product_id: level.product_id,
                    product_name: name,
                    sku,
                    warehouse_id: level.warehouse_id,
                    warehouse_name: warehouses
                        .get(&level.warehouse_id)
                        .cloned()
                        .unwrap_or_default(),
                    quantity: level.quantity,
                }
            })
            .collect())
    }

    /// Active products whose stock across all warehouses has fallen to or
    /// below their reorder level. Products with no stock rows count as zero.
    #[instrument(skip(self))]
    pub async fn low_stock(&self) -> Result<Vec<LowStockRow>, ServiceError> {
        let products = ProductEntity::find()
            .filter(product::Column::IsActive.eq(true))
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut totals: HashMap<i64, i64> = HashMap::new();
        for level in InventoryLevelEntity::find()
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
        {
            *totals.entry(level.product_id).or_default() += i64::from(level.quantity);
        }

        let mut rows: Vec<LowStockRow> = products
            .into_iter()
            .filter_map(|p| {
                let total = totals.get(&p.id).copied().unwrap_or(0);
                (total <= i64::from(p.reorder_level)).then(|| LowStockRow {
                    product_id: p.id,
                    product_name: p.name,
                    sku: p.sku,
                    total_quantity: total,
                    reorder_level: p.reorder_level,
                })
            })
            .collect();
        rows.sort_by_key(|r| r.total_quantity);
        Ok(rows)
    }

    /// The movement ledger, newest first, with display names joined in.
    #[instrument(skip(self))]
    pub async fn activity(&self, filter: ActivityFilter) -> Result<Vec<ActivityEntry>, ServiceError> {
        let mut query = StockMovementEntity::find()
            .order_by(stock_movement::Column::CreatedAt, Order::Desc)
            .order_by(stock_movement::Column::Id, Order::Desc);
        if let Some(product_id) = filter.product_id {
            query = query.filter(stock_movement::Column::ProductId.eq(product_id));
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(stock_movement::Column::WarehouseId.eq(warehouse_id));
        }
        if let Some(movement_type) = filter.movement_type {
            query = query.filter(stock_movement::Column::MovementType.eq(movement_type));
        }

        let movements = query
            .paginate(&*self.db, filter.limit.unwrap_or(50).clamp(1, 500))
            .fetch_page(0)
            .await
            .map_err(ServiceError::db_error)?;

        let products = self.product_names().await?;
        let warehouses = self.warehouse_names().await?;

        Ok(movements
            .into_iter()
            .map(|movement| {
                let (name, _) = products
                    .get(&movement.product_id)
                    .cloned()
                    .unwrap_or_default();
                ActivityEntry {
                    product_name: name,
                    warehouse_name: warehouses
                        .get(&movement.warehouse_id)
                        .cloned()
                        .unwrap_or_default(),
                    movement,
                }
            })
            .collect())
    }

    async fn product_names(&self) -> Result<HashMap<i64, (String, String)>, ServiceError> {
        Ok(ProductEntity::find()
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|p| (p.id, (p.name, p.sku)))
            .collect())
    }

    async fn warehouse_names(&self) -> Result<HashMap<i64, String>, ServiceError> {
        Ok(WarehouseEntity::find()
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|w| (w.id, w.name))
            .collect())
    }
}
