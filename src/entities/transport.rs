use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(
    Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[strum(serialize_all = "snake_case")]
pub enum TransportDirection {
    /// Outbound delivery to the customer.
    #[sea_orm(string_value = "forward")]
    Forward,
    /// Return pickup from the customer.
    #[sea_orm(string_value = "reverse")]
    Reverse,
}

#[derive(
    Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[strum(serialize_all = "snake_case")]
pub enum TransportStatus {
    #[sea_orm(string_value = "dispatched")]
    Dispatched,
    #[sea_orm(string_value = "in_transit")]
    InTransit,
    #[sea_orm(string_value = "delivered")]
    Delivered,
}

impl TransportStatus {
    pub fn can_transition_to(&self, to: &TransportStatus) -> bool {
        use TransportStatus::*;
        matches!(
            (self, to),
            (Dispatched, InTransit) | (Dispatched, Delivered) | (InTransit, Delivered)
        )
    }
}

/// A shipment bound to exactly one package. The forward transport may be
/// replaced while the package is not yet delivered, never after.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transports")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub package_id: Uuid,

    pub transporter_id: Uuid,

    pub direction: TransportDirection,

    pub status: TransportStatus,

    pub assigned_at: DateTime<Utc>,

    pub dispatched_at: Option<DateTime<Utc>>,

    /// Anchor timestamp for the return window and the confirmation grace
    /// period.
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::package::Entity",
        from = "Column::PackageId",
        to = "super::package::Column::Id"
    )]
    Package,
    #[sea_orm(has_many = "super::transport_event::Entity")]
    Events,
}

impl Related<super::package::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Package.def()
    }
}

impl Related<super::transport_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Events.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
