use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable ledger entry written exactly once per confirmed sale. The
/// permanent record read by the analytics collaborator; never updated or
/// deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub package_id: Uuid,

    pub order_id: Uuid,

    pub warehouse_id: Uuid,

    pub item_count: i32,

    pub total_value: Decimal,

    pub delivered_at: DateTime<Utc>,

    pub confirmed_at: DateTime<Utc>,

    /// Actor id for a manual confirmation, or "auto-confirm".
    pub confirmed_by: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::package::Entity",
        from = "Column::PackageId",
        to = "super::package::Column::Id"
    )]
    Package,
}

impl Related<super::package::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Package.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
