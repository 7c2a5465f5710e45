use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::transport::TransportStatus;

/// Timestamped status history for a transport.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transport_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub transport_id: Uuid,

    pub status: TransportStatus,

    pub occurred_at: DateTime<Utc>,

    pub notes: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transport::Entity",
        from = "Column::TransportId",
        to = "super::transport::Column::Id"
    )]
    Transport,
}

impl Related<super::transport::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transport.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub fn new_entry(
    transport_id: Uuid,
    status: TransportStatus,
    occurred_at: DateTime<Utc>,
    notes: Option<String>,
) -> ActiveModel {
    ActiveModel {
        id: Set(Uuid::new_v4()),
        transport_id: Set(transport_id),
        status: Set(status),
        occurred_at: Set(occurred_at),
        notes: Set(notes),
    }
}
