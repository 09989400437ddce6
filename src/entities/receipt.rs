use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter as StrumEnumIter, EnumString};

/// Receipt lifecycle. `Validated` and `Cancelled` are terminal; the
/// transition into `Validated` is what posts stock to inventory.
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
pub enum ReceiptStatus {
    Draft,
    Waiting,
    Validated,
    Cancelled,
}

impl ReceiptStatus {
    /// Whether a receipt may move from `self` to `next`.
    pub fn can_transition_to(self, next: ReceiptStatus) -> bool {
        use ReceiptStatus::*;
        matches!(
            (self, next),
            (Draft, Waiting) | (Draft, Validated) | (Waiting, Validated) | (Draft, Cancelled) | (Waiting, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ReceiptStatus::Validated | ReceiptStatus::Cancelled)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "receipts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub reference_number: String,
    pub supplier_id: Option<i64>,
    pub warehouse_id: i64,
    pub expected_date: Option<Date>,
    pub status: String,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTimeUtc,
    pub updated_at: Option<DateTimeUtc>,
}

impl Model {
    /// Parses the stored status column; unknown values are surfaced as errors
    /// rather than silently coerced.
    pub fn status(&self) -> Result<ReceiptStatus, strum::ParseError> {
        self.status.parse()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::supplier::Entity",
        from = "Column::SupplierId",
        to = "super::supplier::Column::Id"
    )]
    Supplier,
    #[sea_orm(
        belongs_to = "super::warehouse::Entity",
        from = "Column::WarehouseId",
        to = "super::warehouse::Column::Id"
    )]
    Warehouse,
    #[sea_orm(has_many = "super::receipt_item::Entity")]
    ReceiptItem,
}

impl Related<super::supplier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supplier.def()
    }
}

impl Related<super::warehouse::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Warehouse.def()
    }
}

impl Related<super::receipt_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReceiptItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::ReceiptStatus::*;

    #[test]
    fn terminal_states_admit_no_transitions() {
        for next in [Draft, Waiting, Validated, Cancelled] {
            assert!(!Validated.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn open_states_can_be_validated_or_cancelled() {
        assert!(Draft.can_transition_to(Waiting));
        assert!(Draft.can_transition_to(Validated));
        assert!(Waiting.can_transition_to(Validated));
        assert!(Draft.can_transition_to(Cancelled));
        assert!(Waiting.can_transition_to(Cancelled));
        assert!(!Waiting.can_transition_to(Draft));
    }

    #[test]
    fn status_round_trips_through_text() {
        let parsed: super::ReceiptStatus = "validated".parse().unwrap();
        assert_eq!(parsed, Validated);
        assert_eq!(Waiting.to_string(), "waiting");
    }
}
