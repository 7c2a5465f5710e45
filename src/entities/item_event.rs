use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Action recorded in an item's history log.
#[derive(
    Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[strum(serialize_all = "snake_case")]
pub enum ItemAction {
    #[sea_orm(string_value = "received")]
    Received,
    #[sea_orm(string_value = "allocated")]
    Allocated,
    #[sea_orm(string_value = "packed")]
    Packed,
    #[sea_orm(string_value = "dispatched")]
    Dispatched,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "returned")]
    Returned,
    #[sea_orm(string_value = "damaged")]
    Damaged,
}

/// Append-only history log: one row per item action. Rows are never updated,
/// truncated, or reordered.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "item_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub item_id: Uuid,

    pub action: ItemAction,

    pub occurred_at: DateTime<Utc>,

    pub location: Option<String>,

    pub notes: Option<String>,

    pub recorded_by: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::item::Entity",
        from = "Column::ItemId",
        to = "super::item::Column::Id"
    )]
    Item,
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Builds a history entry ready for insertion.
pub fn new_entry(
    item_id: Uuid,
    action: ItemAction,
    occurred_at: DateTime<Utc>,
    location: Option<String>,
    notes: Option<String>,
    recorded_by: Option<Uuid>,
) -> ActiveModel {
    ActiveModel {
        id: Set(Uuid::new_v4()),
        item_id: Set(item_id),
        action: Set(action),
        occurred_at: Set(occurred_at),
        location: Set(location),
        notes: Set(notes),
        recorded_by: Set(recorded_by),
    }
}
