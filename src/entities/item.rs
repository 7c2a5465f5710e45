use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;

use super::item_event;

/// Lifecycle status of one physical unit of stock.
#[derive(
    Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[strum(serialize_all = "snake_case")]
pub enum ItemStatus {
    #[sea_orm(string_value = "in_stock")]
    InStock,
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

impl ItemStatus {
    /// Legal moves in the item lifecycle. `returned` and `damaged` are
    /// terminal audit states; a restocked return goes back to `in_stock`.
    pub fn can_transition_to(&self, to: &ItemStatus) -> bool {
        use ItemStatus::*;
        matches!(
            (self, to),
            (InStock, Allocated)
                | (InStock, Damaged)
                | (Allocated, Packed)
                | (Packed, Dispatched)
                | (Dispatched, Delivered)
                | (Delivered, InStock)
                | (Delivered, Returned)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Returned | ItemStatus::Damaged)
    }

    /// The history action recorded for a move into this status. The restock
    /// move `delivered -> in_stock` is the one asymmetry: its history entry
    /// reads `returned`.
    pub fn action_for_entry(&self, from: &ItemStatus) -> item_event::ItemAction {
        use item_event::ItemAction;
        match self {
            ItemStatus::InStock if *from == ItemStatus::Delivered => ItemAction::Returned,
            ItemStatus::InStock => ItemAction::Received,
            ItemStatus::Allocated => ItemAction::Allocated,
            ItemStatus::Packed => ItemAction::Packed,
            ItemStatus::Dispatched => ItemAction::Dispatched,
            ItemStatus::Delivered => ItemAction::Delivered,
            ItemStatus::Returned => ItemAction::Returned,
            ItemStatus::Damaged => ItemAction::Damaged,
        }
    }
}

/// One physical, individually tracked unit belonging to a batch.
/// Never deleted: terminal-state rows remain for audit.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub batch_id: Uuid,

    #[sea_orm(unique)]
    pub serial: String,

    pub status: ItemStatus,

    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::batch::Entity",
        from = "Column::BatchId",
        to = "super::batch::Column::Id"
    )]
    Batch,
    #[sea_orm(has_many = "super::item_event::Entity")]
    Events,
}

impl Related<super::batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Batch.def()
    }
}

impl Related<super::item_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Events.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Explicit state-transition function: takes the current item and the target
/// status, and returns the updated active model together with the mandatory
/// history entry. Both must be persisted in the same transaction.
pub fn transition(
    item: &Model,
    to: ItemStatus,
    at: DateTime<Utc>,
    location: Option<String>,
    notes: Option<String>,
    recorded_by: Option<Uuid>,
) -> Result<(ActiveModel, item_event::ActiveModel), ServiceError> {
    if !item.status.can_transition_to(&to) {
        return Err(ServiceError::InvalidStateTransition {
            entity: "item",
            id: item.id,
            current: item.status.to_string(),
            attempted: to.to_string(),
        });
    }

    let action = to.action_for_entry(&item.status);

    let updated = ActiveModel {
        id: Set(item.id),
        batch_id: Set(item.batch_id),
        serial: Set(item.serial.clone()),
        status: Set(to),
        updated_at: Set(at),
    };

    let event = item_event::new_entry(item.id, action, at, location, notes, recorded_by);

    Ok((updated, event))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_moves_forward() {
        use ItemStatus::*;
        assert!(InStock.can_transition_to(&Allocated));
        assert!(Allocated.can_transition_to(&Packed));
        assert!(Packed.can_transition_to(&Dispatched));
        assert!(Dispatched.can_transition_to(&Delivered));
        assert!(Delivered.can_transition_to(&InStock));
    }

    #[test]
    fn illegal_moves_are_rejected() {
        use ItemStatus::*;
        assert!(!InStock.can_transition_to(&Packed));
        assert!(!Allocated.can_transition_to(&InStock));
        assert!(!Returned.can_transition_to(&InStock));
        assert!(!Damaged.can_transition_to(&InStock));
        assert!(!Delivered.can_transition_to(&Allocated));
    }

    #[test]
    fn transition_writes_matching_history_action() {
        let item = Model {
            id: Uuid::new_v4(),
            batch_id: Uuid::new_v4(),
            serial: "ab12cd34-0001".to_string(),
            status: ItemStatus::InStock,
            updated_at: Utc::now(),
        };

        let (updated, event) =
            transition(&item, ItemStatus::Allocated, Utc::now(), None, None, None).unwrap();
        assert_eq!(updated.status.as_ref(), &ItemStatus::Allocated);
        assert_eq!(
            event.action.as_ref(),
            &item_event::ItemAction::Allocated
        );
    }

    #[test]
    fn restock_entry_reads_returned() {
        let delivered = Model {
            id: Uuid::new_v4(),
            batch_id: Uuid::new_v4(),
            serial: "ab12cd34-0002".to_string(),
            status: ItemStatus::Delivered,
            updated_at: Utc::now(),
        };

        let (updated, event) =
            transition(&delivered, ItemStatus::InStock, Utc::now(), None, None, None).unwrap();
        assert_eq!(updated.status.as_ref(), &ItemStatus::InStock);
        assert_eq!(event.action.as_ref(), &item_event::ItemAction::Returned);
    }

    #[test]
    fn transition_from_terminal_state_fails() {
        let item = Model {
            id: Uuid::new_v4(),
            batch_id: Uuid::new_v4(),
            serial: "ab12cd34-0003".to_string(),
            status: ItemStatus::Damaged,
            updated_at: Utc::now(),
        };

        let err = transition(&item, ItemStatus::Allocated, Utc::now(), None, None, None)
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidStateTransition { entity: "item", .. }
        ));
    }
}
