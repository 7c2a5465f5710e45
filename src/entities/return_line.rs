use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Quantity of one (product, batch) being returned. Bounded by what the
/// package originally allocated from that batch.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "return_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub return_id: Uuid,

    pub product_id: Uuid,

    pub batch_id: Uuid,

    pub quantity: i32,

    /// Whether processed units go back to stock or are retired for audit.
    pub restock: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::return_entity::Entity",
        from = "Column::ReturnId",
        to = "super::return_entity::Column::Id"
    )]
    Return,
}

impl Related<super::return_entity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Return.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
