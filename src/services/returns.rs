use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        item::{self, ItemStatus},
        item_event::{self, ItemAction},
        order::{self, OrderStatus},
        package::{self, PackageStatus},
        package_item,
        return_entity::{self, ReturnStatus},
        return_line,
        transport::{self, TransportDirection, TransportStatus},
        transport_event,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::allocation,
    services::shipments::forward_transport,
};

fn default_restock() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct ReturnLineRequest {
    pub product_id: Uuid,
    pub batch_id: Uuid,
    #[validate(range(min = 1, message = "Return quantity must be positive"))]
    pub quantity: i32,
    /// Restockable units go back to stock; others are retired for audit.
    #[serde(default = "default_restock")]
    pub restock: bool,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct InitiateReturnRequest {
    pub package_id: Uuid,
    #[validate(length(min = 1, message = "Return must have at least one line"))]
    pub lines: Vec<ReturnLineRequest>,
    #[validate(length(min = 1, message = "Reason cannot be empty"))]
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReturnLineResponse {
    pub product_id: Uuid,
    pub batch_id: Uuid,
    pub quantity: i32,
    pub restock: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReturnResponse {
    pub id: Uuid,
    pub package_id: Uuid,
    pub reason: String,
    pub status: String,
    pub requested_at: DateTime<Utc>,
    pub lines: Vec<ReturnLineResponse>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<Uuid>,
}

/// Outcome of processing a return: how many units were restocked versus
/// retired.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReturnProcessOutcome {
    pub return_id: Uuid,
    pub restocked: i32,
    pub retired: i32,
}

/// Service for the reverse pipeline: initiation within the return window,
/// pickup scheduling, and atomic restock processing.
#[derive(Clone)]
pub struct ReturnService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    return_window_days: i64,
    max_retries: u32,
}

impl ReturnService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        return_window_days: i64,
        max_retries: u32,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            return_window_days,
            max_retries,
        }
    }

    /// Opens a return against a delivered package. Gated by the return
    /// window, the one-return-per-package rule, and the original allocation
    /// quantities. The order flips to `returned` immediately: a return
    /// request is a signal, distinct from physical receipt.
    #[instrument(skip(self, request), fields(package_id = %request.package_id))]
    pub async fn initiate_return(
        &self,
        request: InitiateReturnRequest,
        requested_by: Option<Uuid>,
    ) -> Result<ReturnResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let now = Utc::now();
        let package_id = request.package_id;

        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let package_row = package::Entity::find_by_id(package_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Package {} not found", package_id)))?;

        if package_row.status != PackageStatus::Delivered {
            return Err(ServiceError::InvalidStateTransition {
                entity: "package",
                id: package_id,
                current: package_row.status.to_string(),
                attempted: "initiate_return".to_string(),
            });
        }

        let existing = return_entity::Entity::find()
            .filter(return_entity::Column::PackageId.eq(package_id))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::DuplicateReturn(package_id));
        }

        let transport_row = forward_transport(&txn, package_id).await?;
        let delivered_at = transport_row.delivered_at.ok_or_else(|| {
            ServiceError::InternalError(format!(
                "delivered package {} has no delivery timestamp",
                package_id
            ))
        })?;

        if now - delivered_at > Duration::days(self.return_window_days) {
            return Err(ServiceError::ReturnWindowExpired {
                package_id,
                delivered_at,
                window_days: self.return_window_days,
            });
        }

        // Requested quantities per (product, batch) may not exceed what the
        // package actually allocated from that batch.
        let mut requested: HashMap<(Uuid, Uuid), i32> = HashMap::new();
        for line in &request.lines {
            if line.quantity < 1 {
                return Err(ServiceError::ValidationError(format!(
                    "Return quantity for product {} must be positive",
                    line.product_id
                )));
            }
            *requested
                .entry((line.product_id, line.batch_id))
                .or_insert(0) += line.quantity;
        }
        for ((product_id, batch_id), quantity) in &requested {
            let allocated = package_item::Entity::find()
                .filter(package_item::Column::PackageId.eq(package_id))
                .filter(package_item::Column::ProductId.eq(*product_id))
                .filter(package_item::Column::BatchId.eq(*batch_id))
                .count(&txn)
                .await? as i32;
            if *quantity > allocated {
                return Err(ServiceError::QuantityExceedsAllocation {
                    product_id: *product_id,
                    batch_id: *batch_id,
                    requested: *quantity,
                    allocated,
                });
            }
        }

        let return_id = Uuid::new_v4();
        let return_model = return_entity::ActiveModel {
            id: Set(return_id),
            package_id: Set(package_id),
            reason: Set(request.reason.clone()),
            status: Set(ReturnStatus::Initiated),
            requested_at: Set(now),
            requested_by: Set(requested_by),
            processed_at: Set(None),
            processed_by: Set(None),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await?;

        let lines: Vec<return_line::ActiveModel> = request
            .lines
            .iter()
            .map(|line| return_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                return_id: Set(return_id),
                product_id: Set(line.product_id),
                batch_id: Set(line.batch_id),
                quantity: Set(line.quantity),
                restock: Set(line.restock),
            })
            .collect();
        return_line::Entity::insert_many(lines).exec(&txn).await?;

        let order_row = order::Entity::find_by_id(package_row.order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Order {} not found", package_row.order_id))
            })?;
        if !order_row.status.can_transition_to(&OrderStatus::Returned) {
            return Err(ServiceError::InvalidStateTransition {
                entity: "order",
                id: order_row.id,
                current: order_row.status.to_string(),
                attempted: OrderStatus::Returned.to_string(),
            });
        }
        let version = order_row.version;
        let mut order_active: order::ActiveModel = order_row.into();
        order_active.status = Set(OrderStatus::Returned);
        order_active.updated_at = Set(Some(now));
        order_active.version = Set(version + 1);
        order_active.update(&txn).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, package_id = %package_id, "Failed to commit return initiation");
            ServiceError::DatabaseError(e)
        })?;

        info!(return_id = %return_id, package_id = %package_id, "Return initiated");

        if let Some(event_sender) = &self.event_sender {
            let event = Event::ReturnInitiated {
                return_id,
                package_id,
            };
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, return_id = %return_id, "Failed to send return initiated event");
            }
        }

        self.to_response(return_model, &request.lines)
    }

    /// Books a reverse transport for the pickup.
    #[instrument(skip(self), fields(return_id = %return_id, transporter_id = %transporter_id))]
    pub async fn schedule_pickup(
        &self,
        return_id: Uuid,
        transporter_id: Uuid,
    ) -> Result<ReturnResponse, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let return_row = self
            .require_status(&txn, return_id, &[ReturnStatus::Initiated], "schedule_pickup")
            .await?;

        let transport_model = transport::ActiveModel {
            id: Set(Uuid::new_v4()),
            package_id: Set(return_row.package_id),
            transporter_id: Set(transporter_id),
            direction: Set(TransportDirection::Reverse),
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
            Some("pickup scheduled".to_string()),
        )
        .insert(&txn)
        .await?;

        let updated = self
            .set_status(&txn, return_row, ReturnStatus::PickupScheduled, now)
            .await?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(return_id = %return_id, transport_id = %transport_model.id, "Return pickup scheduled");

        if let Some(event_sender) = &self.event_sender {
            let event = Event::ReturnPickupScheduled {
                return_id,
                transport_id: transport_model.id,
            };
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, return_id = %return_id, "Failed to send pickup scheduled event");
            }
        }

        self.with_lines(updated).await
    }

    /// Records the physical pickup: the reverse transport is now in transit.
    #[instrument(skip(self), fields(return_id = %return_id))]
    pub async fn mark_picked_up(&self, return_id: Uuid) -> Result<ReturnResponse, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let return_row = self
            .require_status(&txn, return_id, &[ReturnStatus::PickupScheduled], "mark_picked_up")
            .await?;

        let transport_row = reverse_transport(&txn, return_row.package_id).await?;
        let mut transport_active: transport::ActiveModel = transport_row.clone().into();
        transport_active.status = Set(TransportStatus::InTransit);
        transport_active.dispatched_at = Set(Some(now));
        transport_active.update(&txn).await?;
        transport_event::new_entry(
            transport_row.id,
            TransportStatus::InTransit,
            now,
            Some("picked up from customer".to_string()),
        )
        .insert(&txn)
        .await?;

        let updated = self
            .set_status(&txn, return_row, ReturnStatus::PickedUp, now)
            .await?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(return_id = %return_id, "Return picked up");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::ReturnPickedUp(return_id)).await {
                warn!(error = %e, return_id = %return_id, "Failed to send return picked up event");
            }
        }

        self.with_lines(updated).await
    }

    /// Records arrival of the returned goods back at the warehouse.
    #[instrument(skip(self), fields(return_id = %return_id))]
    pub async fn mark_received(&self, return_id: Uuid) -> Result<ReturnResponse, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let return_row = self
            .require_status(&txn, return_id, &[ReturnStatus::PickedUp], "mark_received")
            .await?;

        let transport_row = reverse_transport(&txn, return_row.package_id).await?;
        let mut transport_active: transport::ActiveModel = transport_row.clone().into();
        transport_active.status = Set(TransportStatus::Delivered);
        transport_active.delivered_at = Set(Some(now));
        transport_active.update(&txn).await?;
        transport_event::new_entry(
            transport_row.id,
            TransportStatus::Delivered,
            now,
            Some("arrived at warehouse".to_string()),
        )
        .insert(&txn)
        .await?;

        let updated = self
            .set_status(&txn, return_row, ReturnStatus::Received, now)
            .await?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(return_id = %return_id, "Return received at warehouse");

        self.with_lines(updated).await
    }

    /// Processes a picked-up return: every restockable unit goes back to
    /// `in_stock` with its aggregate increment, non-restockable units are
    /// retired, and the package closes as `returned`. Atomic across all
    /// lines; conflicts are retried a bounded number of times.
    #[instrument(skip(self), fields(return_id = %return_id))]
    pub async fn process_return(
        &self,
        return_id: Uuid,
        processed_by: Option<Uuid>,
    ) -> Result<ReturnProcessOutcome, ServiceError> {
        let mut attempt = 0;
        loop {
            match self.try_process_return(return_id, processed_by).await {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        return_id = %return_id,
                        attempt = attempt,
                        error = %e,
                        "Restock conflict, retrying return processing"
                    );
                }
                other => return other,
            }
        }
    }

    async fn try_process_return(
        &self,
        return_id: Uuid,
        processed_by: Option<Uuid>,
    ) -> Result<ReturnProcessOutcome, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let return_row = self
            .require_status(
                &txn,
                return_id,
                &[ReturnStatus::PickedUp, ReturnStatus::Received],
                "process",
            )
            .await?;

        let lines = return_line::Entity::find()
            .filter(return_line::Column::ReturnId.eq(return_id))
            .all(&txn)
            .await?;

        let mut restocked = 0;
        let mut retired = 0;
        // Lines for the same (product, batch) must claim disjoint items.
        let mut claimed: std::collections::HashSet<Uuid> = std::collections::HashSet::new();
        for line in &lines {
            let item_ids: Vec<Uuid> = package_item::Entity::find()
                .filter(package_item::Column::PackageId.eq(return_row.package_id))
                .filter(package_item::Column::ProductId.eq(line.product_id))
                .filter(package_item::Column::BatchId.eq(line.batch_id))
                .all(&txn)
                .await?
                .into_iter()
                .map(|pi| pi.item_id)
                .filter(|id| !claimed.contains(id))
                .take(line.quantity as usize)
                .collect();
            claimed.extend(item_ids.iter().copied());

            if item_ids.len() < line.quantity as usize {
                return Err(ServiceError::TransactionConflict(format!(
                    "return {} references {} units of product {} in batch {}, found {}",
                    return_id,
                    line.quantity,
                    line.product_id,
                    line.batch_id,
                    item_ids.len()
                )));
            }

            if line.restock {
                allocation::restock_items(&txn, line.batch_id, &item_ids, processed_by).await?;
                restocked += line.quantity;
            } else {
                let moved = item::Entity::update_many()
                    .col_expr(item::Column::Status, Expr::value(ItemStatus::Returned))
                    .col_expr(item::Column::UpdatedAt, Expr::value(now))
                    .filter(item::Column::Id.is_in(item_ids.clone()))
                    .filter(item::Column::Status.eq(ItemStatus::Delivered))
                    .exec(&txn)
                    .await?;
                if moved.rows_affected != item_ids.len() as u64 {
                    return Err(ServiceError::TransactionConflict(format!(
                        "retired {} of {} items for return {}",
                        moved.rows_affected,
                        item_ids.len(),
                        return_id
                    )));
                }
                let entries: Vec<item_event::ActiveModel> = item_ids
                    .iter()
                    .map(|id| {
                        item_event::new_entry(
                            *id,
                            ItemAction::Returned,
                            now,
                            None,
                            Some("retired on return, not restocked".to_string()),
                            processed_by,
                        )
                    })
                    .collect();
                item_event::Entity::insert_many(entries).exec(&txn).await?;
                retired += line.quantity;
            }
        }

        let package_row = package::Entity::find_by_id(return_row.package_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Package {} not found", return_row.package_id))
            })?;
        let mut package_active: package::ActiveModel = package_row.into();
        package_active.status = Set(PackageStatus::Returned);
        package_active.updated_at = Set(Some(now));
        package_active.update(&txn).await?;

        let mut return_active: return_entity::ActiveModel = return_row.into();
        return_active.status = Set(ReturnStatus::Processed);
        return_active.processed_at = Set(Some(now));
        return_active.processed_by = Set(processed_by);
        return_active.updated_at = Set(Some(now));
        return_active.update(&txn).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, return_id = %return_id, "Failed to commit return processing");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            return_id = %return_id,
            restocked = restocked,
            retired = retired,
            "Return processed"
        );

        if let Some(event_sender) = &self.event_sender {
            let event = Event::ReturnProcessed {
                return_id,
                restocked,
            };
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, return_id = %return_id, "Failed to send return processed event");
            }
        }

        Ok(ReturnProcessOutcome {
            return_id,
            restocked,
            retired,
        })
    }

    /// Gets a return by id with its lines.
    #[instrument(skip(self), fields(return_id = %return_id))]
    pub async fn get_return(
        &self,
        return_id: Uuid,
    ) -> Result<Option<ReturnResponse>, ServiceError> {
        let db = &*self.db_pool;
        let Some(row) = return_entity::Entity::find_by_id(return_id).one(db).await? else {
            return Ok(None);
        };
        Ok(Some(self.with_lines(row).await?))
    }

    async fn require_status(
        &self,
        txn: &DatabaseTransaction,
        return_id: Uuid,
        allowed: &[ReturnStatus],
        attempted: &str,
    ) -> Result<return_entity::Model, ServiceError> {
        let row = return_entity::Entity::find_by_id(return_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Return {} not found", return_id)))?;

        if !allowed.contains(&row.status) {
            return Err(ServiceError::InvalidStateTransition {
                entity: "return",
                id: return_id,
                current: row.status.to_string(),
                attempted: attempted.to_string(),
            });
        }
        Ok(row)
    }

    async fn set_status(
        &self,
        txn: &DatabaseTransaction,
        row: return_entity::Model,
        to: ReturnStatus,
        now: DateTime<Utc>,
    ) -> Result<return_entity::Model, ServiceError> {
        let mut active: return_entity::ActiveModel = row.into();
        active.status = Set(to);
        active.updated_at = Set(Some(now));
        Ok(active.update(txn).await?)
    }

    async fn with_lines(
        &self,
        row: return_entity::Model,
    ) -> Result<ReturnResponse, ServiceError> {
        let db = &*self.db_pool;
        let lines = return_line::Entity::find()
            .filter(return_line::Column::ReturnId.eq(row.id))
            .all(db)
            .await?;
        let line_requests: Vec<ReturnLineRequest> = lines
            .iter()
            .map(|l| ReturnLineRequest {
                product_id: l.product_id,
                batch_id: l.batch_id,
                quantity: l.quantity,
                restock: l.restock,
            })
            .collect();
        self.to_response(row, &line_requests)
    }

    fn to_response(
        &self,
        model: return_entity::Model,
        lines: &[ReturnLineRequest],
    ) -> Result<ReturnResponse, ServiceError> {
        Ok(ReturnResponse {
            id: model.id,
            package_id: model.package_id,
            reason: model.reason,
            status: model.status.to_string(),
            requested_at: model.requested_at,
            lines: lines
                .iter()
                .map(|l| ReturnLineResponse {
                    product_id: l.product_id,
                    batch_id: l.batch_id,
                    quantity: l.quantity,
                    restock: l.restock,
                })
                .collect(),
            processed_at: model.processed_at,
            processed_by: model.processed_by,
        })
    }
}

/// Fetches the reverse transport or fails with `TransportNotFound`.
async fn reverse_transport(
    txn: &DatabaseTransaction,
    package_id: Uuid,
) -> Result<transport::Model, ServiceError> {
    transport::Entity::find()
        .filter(transport::Column::PackageId.eq(package_id))
        .filter(transport::Column::Direction.eq(TransportDirection::Reverse))
        .one(txn)
        .await?
        .ok_or(ServiceError::TransportNotFound(package_id))
}
