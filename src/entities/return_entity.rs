use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(
    Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[strum(serialize_all = "snake_case")]
pub enum ReturnStatus {
    #[sea_orm(string_value = "initiated")]
    Initiated,
    #[sea_orm(string_value = "pickup_scheduled")]
    PickupScheduled,
    #[sea_orm(string_value = "picked_up")]
    PickedUp,
    #[sea_orm(string_value = "received")]
    Received,
    #[sea_orm(string_value = "processed")]
    Processed,
}

impl ReturnStatus {
    pub fn can_transition_to(&self, to: &ReturnStatus) -> bool {
        use ReturnStatus::*;
        matches!(
            (self, to),
            (Initiated, PickupScheduled)
                | (PickupScheduled, PickedUp)
                | (PickedUp, Received)
                | (PickedUp, Processed)
                | (Received, Processed)
        )
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, ReturnStatus::Processed)
    }
}

/// A return request against a delivered package. References, but does not
/// own, the package's items; processing reclaims them back to stock.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "returns")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub package_id: Uuid,

    pub reason: String,

    pub status: ReturnStatus,

    pub requested_at: DateTime<Utc>,

    pub requested_by: Option<Uuid>,

    pub processed_at: Option<DateTime<Utc>>,

    pub processed_by: Option<Uuid>,

    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::package::Entity",
        from = "Column::PackageId",
        to = "super::package::Column::Id"
    )]
    Package,
    #[sea_orm(has_many = "super::return_line::Entity")]
    Lines,
}

impl Related<super::package::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Package.def()
    }
}

impl Related<super::return_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::ReturnStatus::*;

    #[test]
    fn return_pipeline_order() {
        assert!(Initiated.can_transition_to(&PickupScheduled));
        assert!(PickupScheduled.can_transition_to(&PickedUp));
        assert!(PickedUp.can_transition_to(&Processed));
        assert!(PickedUp.can_transition_to(&Received));
        assert!(Received.can_transition_to(&Processed));

        assert!(!Initiated.can_transition_to(&PickedUp));
        assert!(!Processed.can_transition_to(&Initiated));
        assert!(!PickupScheduled.can_transition_to(&Processed));
    }
}
