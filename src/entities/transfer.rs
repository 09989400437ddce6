use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transfers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub reference_number: String,
    pub from_warehouse_id: i64,
    pub to_warehouse_id: i64,
    pub transfer_date: Option<Date>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::warehouse::Entity",
        from = "Column::FromWarehouseId",
        to = "super::warehouse::Column::Id"
    )]
    FromWarehouse,
    #[sea_orm(
        belongs_to = "super::warehouse::Entity",
        from = "Column::ToWarehouseId",
        to = "super::warehouse::Column::Id"
    )]
    ToWarehouse,
}

impl ActiveModelBehavior for ActiveModel {}
