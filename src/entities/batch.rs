use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One receipt lot of a product. Immutable after intake: `quantity_received`
/// is the nominal quantity, never the current count (see `stock_level`).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "batches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub product_id: Uuid,

    pub warehouse_id: Uuid,

    pub supplier_name: String,

    pub quantity_received: i32,

    /// FIFO ordering key: oldest manufacture date allocates first.
    pub manufacture_date: NaiveDate,

    pub expiry_date: Option<NaiveDate>,

    pub received_at: DateTime<Utc>,

    pub received_by: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(has_many = "super::item::Entity")]
    Items,
    #[sea_orm(has_one = "super::stock_level::Entity")]
    StockLevel,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::stock_level::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockLevel.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
