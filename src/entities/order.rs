use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a customer order. Forward-only, except the `returned`
/// branch out of `delivered`.
#[derive(
    Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "dispatched")]
    Dispatched,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "sale_confirmed")]
    SaleConfirmed,
    #[sea_orm(string_value = "returned")]
    Returned,
}

impl OrderStatus {
    pub fn can_transition_to(&self, to: &OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Pending, Processing)
                | (Processing, Dispatched)
                | (Dispatched, Delivered)
                | (Delivered, SaleConfirmed)
                | (Delivered, Returned)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::SaleConfirmed | OrderStatus::Returned)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Identifier supplied by the selling platform; unique across orders.
    #[sea_orm(unique)]
    pub external_order_id: String,

    pub status: OrderStatus,

    pub placed_at: DateTime<Utc>,

    pub created_by: Option<Uuid>,

    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: Option<DateTime<Utc>>,

    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_line::Entity")]
    Lines,
    #[sea_orm(has_one = "super::package::Entity")]
    Package,
}

impl Related<super::order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl Related<super::package::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Package.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::OrderStatus::*;

    #[test]
    fn order_status_moves_forward_only() {
        assert!(Pending.can_transition_to(&Processing));
        assert!(Processing.can_transition_to(&Dispatched));
        assert!(Dispatched.can_transition_to(&Delivered));
        assert!(Delivered.can_transition_to(&SaleConfirmed));
        assert!(Delivered.can_transition_to(&Returned));

        assert!(!Processing.can_transition_to(&Pending));
        assert!(!Pending.can_transition_to(&Dispatched));
        assert!(!SaleConfirmed.can_transition_to(&Returned));
        assert!(!Returned.can_transition_to(&Delivered));
    }
}
