use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter as StrumEnumIter, EnumString};

/// Delivery lifecycle. `Delivered` is terminal. Deliveries never touch
/// inventory; receipt posting is the only inventory writer.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    StrumEnumIter,
    utoipa::ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryStatus {
    Draft,
    Waiting,
    Dispatched,
    Delivered,
}

impl DeliveryStatus {
    pub fn can_transition_to(self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        matches!(
            (self, next),
            (Draft, Waiting) | (Waiting, Dispatched) | (Dispatched, Delivered)
        )
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "deliveries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub reference_number: String,
    pub warehouse_id: i64,
    pub destination: String,
    pub delivery_date: Option<Date>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

impl Model {
    pub fn status(&self) -> Result<DeliveryStatus, strum::ParseError> {
        self.status.parse()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::warehouse::Entity",
        from = "Column::WarehouseId",
        to = "super::warehouse::Column::Id"
    )]
    Warehouse,
    #[sea_orm(has_many = "super::delivery_item::Entity")]
    DeliveryItem,
}

impl Related<super::warehouse::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Warehouse.def()
    }
}

impl Related<super::delivery_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeliveryItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::DeliveryStatus::*;

    #[test]
    fn deliveries_progress_linearly() {
        assert!(Draft.can_transition_to(Waiting));
        assert!(Waiting.can_transition_to(Dispatched));
        assert!(Dispatched.can_transition_to(Delivered));
        assert!(!Delivered.can_transition_to(Draft));
        assert!(!Draft.can_transition_to(Dispatched));
    }
}
