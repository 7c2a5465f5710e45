use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{
        item::{self, ItemStatus},
        item_event::{self, ItemAction},
        order::{self, OrderStatus},
        package::{self, PackageStatus},
        package_item,
        transport::{self, TransportDirection, TransportStatus},
        transport_event,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Serialize, Deserialize)]
pub struct TransportResponse {
    pub id: Uuid,
    pub package_id: Uuid,
    pub transporter_id: Uuid,
    pub direction: String,
    pub status: String,
    pub assigned_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl From<transport::Model> for TransportResponse {
    fn from(model: transport::Model) -> Self {
        Self {
            id: model.id,
            package_id: model.package_id,
            transporter_id: model.transporter_id,
            direction: model.direction.to_string(),
            status: model.status.to_string(),
            assigned_at: model.assigned_at,
            dispatched_at: model.dispatched_at,
            delivered_at: model.delivered_at,
        }
    }
}

/// Service for the forward shipment leg: transport assignment, dispatch and
/// delivery, with the cascading package/order/item status moves.
#[derive(Clone)]
pub struct ShipmentService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl ShipmentService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Assigns (or reassigns) the forward transport for a package. Legal
    /// until the package is delivered or returned; reassignment replaces the
    /// previous transport rather than adding a second one.
    #[instrument(skip(self), fields(package_id = %package_id, transporter_id = %transporter_id))]
    pub async fn assign_transport(
        &self,
        package_id: Uuid,
        transporter_id: Uuid,
        assigned_by: Option<Uuid>,
    ) -> Result<TransportResponse, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let package_row = package::Entity::find_by_id(package_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Package {} not found", package_id)))?;

        if package_row.status.is_terminal() {
            return Err(ServiceError::PackageTerminal {
                package_id,
                status: package_row.status.to_string(),
            });
        }

        // Supersede any prior forward transport: ownership is replaced, not
        // duplicated.
        let previous = transport::Entity::find()
            .filter(transport::Column::PackageId.eq(package_id))
            .filter(transport::Column::Direction.eq(TransportDirection::Forward))
            .all(&txn)
            .await?;
        for prev in &previous {
            transport_event::Entity::delete_many()
                .filter(transport_event::Column::TransportId.eq(prev.id))
                .exec(&txn)
                .await?;
        }
        transport::Entity::delete_many()
            .filter(transport::Column::PackageId.eq(package_id))
            .filter(transport::Column::Direction.eq(TransportDirection::Forward))
            .exec(&txn)
            .await?;

        let transport_model = transport::ActiveModel {
            id: Set(Uuid::new_v4()),
            package_id: Set(package_id),
            transporter_id: Set(transporter_id),
            direction: Set(TransportDirection::Forward),
            status: Set(TransportStatus::Dispatched),
            assigned_at: Set(now),
            dispatched_at: Set(None),
            delivered_at: Set(None),
        }
        .insert(&txn)
        .await?;
        transport_event::new_entry(
            transport_model.id,
            TransportStatus::Dispatched,
            now,
            Some("transport assigned".to_string()),
        )
        .insert(&txn)
        .await?;

        if package_row.status == PackageStatus::Created {
            let mut active: package::ActiveModel = package_row.clone().into();
            active.status = Set(PackageStatus::Dispatched);
            active.updated_at = Set(Some(now));
            active.update(&txn).await?;
        }
        advance_order(&txn, package_row.order_id, OrderStatus::Dispatched, now).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, package_id = %package_id, "Failed to commit transport assignment");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            package_id = %package_id,
            transport_id = %transport_model.id,
            replaced = previous.len(),
            "Transport assigned"
        );

        if let Some(event_sender) = &self.event_sender {
            let event = Event::TransportAssigned {
                package_id,
                transport_id: transport_model.id,
                transporter_id,
            };
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, package_id = %package_id, "Failed to send transport assigned event");
            }
        }

        Ok(transport_model.into())
    }

    /// Dispatches a package on its assigned transport: stamps the dispatch
    /// time and moves the packed items out of the warehouse.
    #[instrument(skip(self), fields(package_id = %package_id))]
    pub async fn dispatch_package(
        &self,
        package_id: Uuid,
        dispatched_by: Option<Uuid>,
    ) -> Result<TransportResponse, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let package_row = package::Entity::find_by_id(package_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Package {} not found", package_id)))?;

        let transport_row = forward_transport(&txn, package_id).await?;

        if transport_row.dispatched_at.is_some() || package_row.status.is_terminal() {
            return Err(ServiceError::InvalidStateTransition {
                entity: "package",
                id: package_id,
                current: package_row.status.to_string(),
                attempted: "dispatch".to_string(),
            });
        }

        let mut transport_active: transport::ActiveModel = transport_row.clone().into();
        transport_active.dispatched_at = Set(Some(now));
        transport_active.status = Set(TransportStatus::Dispatched);
        let transport_model = transport_active.update(&txn).await?;
        transport_event::new_entry(
            transport_model.id,
            TransportStatus::Dispatched,
            now,
            Some("package dispatched".to_string()),
        )
        .insert(&txn)
        .await?;

        if package_row.status == PackageStatus::Created {
            let mut active: package::ActiveModel = package_row.clone().into();
            active.status = Set(PackageStatus::Dispatched);
            active.updated_at = Set(Some(now));
            active.update(&txn).await?;
        }
        advance_order(&txn, package_row.order_id, OrderStatus::Dispatched, now).await?;

        move_package_items(
            &txn,
            package_id,
            ItemStatus::Packed,
            ItemStatus::Dispatched,
            ItemAction::Dispatched,
            now,
            dispatched_by,
        )
        .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, package_id = %package_id, "Failed to commit dispatch");
            ServiceError::DatabaseError(e)
        })?;

        info!(package_id = %package_id, "Package dispatched");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::PackageDispatched(package_id)).await {
                warn!(error = %e, package_id = %package_id, "Failed to send package dispatched event");
            }
        }

        Ok(transport_model.into())
    }

    /// Marks a package delivered. The stamped delivery time anchors both the
    /// return window and the auto-confirmation grace period.
    #[instrument(skip(self), fields(package_id = %package_id))]
    pub async fn mark_delivered(
        &self,
        package_id: Uuid,
        delivered_by: Option<Uuid>,
    ) -> Result<TransportResponse, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let package_row = package::Entity::find_by_id(package_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Package {} not found", package_id)))?;

        let transport_row = forward_transport(&txn, package_id).await?;

        if transport_row.dispatched_at.is_none()
            || package_row.status != PackageStatus::Dispatched
        {
            return Err(ServiceError::InvalidStateTransition {
                entity: "package",
                id: package_id,
                current: package_row.status.to_string(),
                attempted: "deliver".to_string(),
            });
        }

        let mut transport_active: transport::ActiveModel = transport_row.clone().into();
        transport_active.status = Set(TransportStatus::Delivered);
        transport_active.delivered_at = Set(Some(now));
        let transport_model = transport_active.update(&txn).await?;
        transport_event::new_entry(
            transport_model.id,
            TransportStatus::Delivered,
            now,
            Some("package delivered".to_string()),
        )
        .insert(&txn)
        .await?;

        let mut active: package::ActiveModel = package_row.clone().into();
        active.status = Set(PackageStatus::Delivered);
        active.updated_at = Set(Some(now));
        active.update(&txn).await?;

        advance_order(&txn, package_row.order_id, OrderStatus::Delivered, now).await?;

        move_package_items(
            &txn,
            package_id,
            ItemStatus::Dispatched,
            ItemStatus::Delivered,
            ItemAction::Delivered,
            now,
            delivered_by,
        )
        .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, package_id = %package_id, "Failed to commit delivery");
            ServiceError::DatabaseError(e)
        })?;

        info!(package_id = %package_id, delivered_at = %now, "Package delivered");

        if let Some(event_sender) = &self.event_sender {
            let event = Event::PackageDelivered {
                package_id,
                delivered_at: now,
            };
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, package_id = %package_id, "Failed to send package delivered event");
            }
        }

        Ok(transport_model.into())
    }

    /// The current forward transport of a package, if any.
    #[instrument(skip(self), fields(package_id = %package_id))]
    pub async fn get_transport(
        &self,
        package_id: Uuid,
    ) -> Result<Option<TransportResponse>, ServiceError> {
        let db = &*self.db_pool;
        let row = transport::Entity::find()
            .filter(transport::Column::PackageId.eq(package_id))
            .filter(transport::Column::Direction.eq(TransportDirection::Forward))
            .one(db)
            .await?;
        Ok(row.map(Into::into))
    }
}

/// Fetches the forward transport or fails with `TransportNotFound`.
pub(crate) async fn forward_transport(
    txn: &DatabaseTransaction,
    package_id: Uuid,
) -> Result<transport::Model, ServiceError> {
    transport::Entity::find()
        .filter(transport::Column::PackageId.eq(package_id))
        .filter(transport::Column::Direction.eq(TransportDirection::Forward))
        .one(txn)
        .await?
        .ok_or(ServiceError::TransportNotFound(package_id))
}

/// Advances the package's order to `to` when that move is legal, and leaves
/// it alone when the order is already there.
async fn advance_order(
    txn: &DatabaseTransaction,
    order_id: Uuid,
    to: OrderStatus,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let order_row = order::Entity::find_by_id(order_id)
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

    if order_row.status == to {
        return Ok(());
    }
    if !order_row.status.can_transition_to(&to) {
        return Err(ServiceError::InvalidStateTransition {
            entity: "order",
            id: order_id,
            current: order_row.status.to_string(),
            attempted: to.to_string(),
        });
    }

    let version = order_row.version;
    let mut active: order::ActiveModel = order_row.into();
    active.status = Set(to);
    active.updated_at = Set(Some(now));
    active.version = Set(version + 1);
    active.update(txn).await?;
    Ok(())
}

/// Moves all of a package's items from one status to the next, with the
/// mandatory history entries. Guarded: a row-count mismatch means a
/// concurrent writer touched the items.
async fn move_package_items(
    txn: &DatabaseTransaction,
    package_id: Uuid,
    from: ItemStatus,
    to: ItemStatus,
    action: ItemAction,
    now: DateTime<Utc>,
    recorded_by: Option<Uuid>,
) -> Result<(), ServiceError> {
    let item_ids: Vec<Uuid> = package_item::Entity::find()
        .filter(package_item::Column::PackageId.eq(package_id))
        .all(txn)
        .await?
        .into_iter()
        .map(|pi| pi.item_id)
        .collect();

    if item_ids.is_empty() {
        return Ok(());
    }

    let moved = item::Entity::update_many()
        .col_expr(item::Column::Status, Expr::value(to))
        .col_expr(item::Column::UpdatedAt, Expr::value(now))
        .filter(item::Column::Id.is_in(item_ids.clone()))
        .filter(item::Column::Status.eq(from))
        .exec(txn)
        .await?;
    if moved.rows_affected != item_ids.len() as u64 {
        return Err(ServiceError::TransactionConflict(format!(
            "moved {} of {} items for package {}",
            moved.rows_affected,
            item_ids.len(),
            package_id
        )));
    }

    let entries: Vec<item_event::ActiveModel> = item_ids
        .iter()
        .map(|id| item_event::new_entry(*id, action.clone(), now, None, None, recorded_by))
        .collect();
    item_event::Entity::insert_many(entries).exec(txn).await?;

    Ok(())
}
