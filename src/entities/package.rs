use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(
    Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[strum(serialize_all = "snake_case")]
pub enum PackageStatus {
    #[sea_orm(string_value = "created")]
    Created,
    #[sea_orm(string_value = "dispatched")]
    Dispatched,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "returned")]
    Returned,
}

impl PackageStatus {
    pub fn can_transition_to(&self, to: &PackageStatus) -> bool {
        use PackageStatus::*;
        matches!(
            (self, to),
            (Created, Dispatched) | (Dispatched, Delivered) | (Delivered, Returned)
        )
    }

    /// Terminal packages can no longer change transport.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PackageStatus::Delivered | PackageStatus::Returned)
    }
}

/// The outcome of allocating one order: exclusively owns the specific items
/// packed for it. One package per order.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "packages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub order_id: Uuid,

    /// Warehouse of the first batch allocated into this package.
    pub warehouse_id: Uuid,

    pub status: PackageStatus,

    pub item_count: i32,

    pub total_weight: Decimal,

    pub total_volume: Decimal,

    pub total_value: Decimal,

    pub created_at: DateTime<Utc>,

    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
    #[sea_orm(has_many = "super::package_item::Entity")]
    Items,
    #[sea_orm(has_many = "super::transport::Entity")]
    Transports,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::package_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::transport::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transports.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::PackageStatus::*;

    #[test]
    fn terminal_packages_cannot_move() {
        assert!(Created.can_transition_to(&Dispatched));
        assert!(Dispatched.can_transition_to(&Delivered));
        assert!(Delivered.can_transition_to(&Returned));
        assert!(!Delivered.can_transition_to(&Dispatched));
        assert!(!Returned.can_transition_to(&Created));
        assert!(Delivered.is_terminal());
        assert!(Returned.is_terminal());
        assert!(!Dispatched.is_terminal());
    }
}
