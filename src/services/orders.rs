use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
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
        order_line,
        package::{self, PackageStatus},
        package_item, product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::allocation,
};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 64, message = "External order id is required"))]
    pub external_order_id: String,
    #[validate(length(min = 1, message = "Order must have at least one line"))]
    pub lines: Vec<OrderLineRequest>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Line quantity must be positive"))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderLineResponse {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub external_order_id: String,
    pub status: String,
    pub placed_at: DateTime<Utc>,
    pub lines: Vec<OrderLineResponse>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// One (product, batch) slice of a processed order's package.
#[derive(Debug, Serialize, Deserialize)]
pub struct AllocationSummary {
    pub product_id: Uuid,
    pub batch_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PackageResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub warehouse_id: Uuid,
    pub status: String,
    pub item_count: i32,
    pub total_weight: Decimal,
    pub total_volume: Decimal,
    pub total_value: Decimal,
    pub allocations: Vec<AllocationSummary>,
    pub created_at: DateTime<Utc>,
}

/// Service driving order intake and processing (allocation + packaging).
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    max_retries: u32,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        max_retries: u32,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            max_retries,
        }
    }

    /// Persists a new order in `pending`. Touches no inventory.
    #[instrument(skip(self, request), fields(external_order_id = %request.external_order_id))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
        created_by: Option<Uuid>,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let existing = order::Entity::find()
            .filter(order::Column::ExternalOrderId.eq(request.external_order_id.clone()))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::DuplicateOrder(request.external_order_id));
        }

        for line in &request.lines {
            if line.quantity < 1 {
                return Err(ServiceError::ValidationError(format!(
                    "Line quantity for product {} must be positive",
                    line.product_id
                )));
            }
            let product = product::Entity::find_by_id(line.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", line.product_id))
                })?;
            if !product.is_active {
                return Err(ServiceError::InvalidInput(format!(
                    "Product {} is inactive",
                    product.sku
                )));
            }
        }

        let order_model = order::ActiveModel {
            id: Set(order_id),
            external_order_id: Set(request.external_order_id.clone()),
            status: Set(OrderStatus::Pending),
            placed_at: Set(now),
            created_by: Set(created_by),
            notes: Set(request.notes.clone()),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            version: Set(1),
        }
        .insert(&txn)
        .await?;

        let lines: Vec<order_line::ActiveModel> = request
            .lines
            .iter()
            .map(|line| order_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity),
            })
            .collect();
        order_line::Entity::insert_many(lines).exec(&txn).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, external_order_id = %order_model.external_order_id, "Order created");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::OrderCreated(order_id)).await {
                warn!(error = %e, order_id = %order_id, "Failed to send order created event");
            }
        }

        self.to_order_response(order_model, &request.lines)
    }

    /// Processes a pending order: allocates every line FIFO, packs the
    /// allocated items into one package, and moves the order to
    /// `processing`. Atomic: a shortfall on any line rolls everything back
    /// and the order stays `pending`. Conflicts with concurrent allocations
    /// are retried a bounded number of times.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn process_order(
        &self,
        order_id: Uuid,
        processed_by: Option<Uuid>,
    ) -> Result<PackageResponse, ServiceError> {
        let mut attempt = 0;
        loop {
            match self.try_process_order(order_id, processed_by).await {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        order_id = %order_id,
                        attempt = attempt,
                        error = %e,
                        "Allocation conflict, retrying order processing"
                    );
                }
                other => return other,
            }
        }
    }

    async fn try_process_order(
        &self,
        order_id: Uuid,
        processed_by: Option<Uuid>,
    ) -> Result<PackageResponse, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let order_row = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order_row.status != OrderStatus::Pending {
            return Err(ServiceError::InvalidStateTransition {
                entity: "order",
                id: order_id,
                current: order_row.status.to_string(),
                attempted: "process".to_string(),
            });
        }

        let lines = order_line::Entity::find()
            .filter(order_line::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;
        if lines.is_empty() {
            return Err(ServiceError::InvalidInput(format!(
                "Order {} has no lines",
                order_id
            )));
        }

        let package_id = Uuid::new_v4();
        let mut package_rows: Vec<package_item::ActiveModel> = Vec::new();
        let mut summaries: Vec<AllocationSummary> = Vec::new();
        let mut all_item_ids: Vec<Uuid> = Vec::new();
        let mut warehouse_id: Option<Uuid> = None;
        let mut total_weight = Decimal::ZERO;
        let mut total_volume = Decimal::ZERO;
        let mut total_value = Decimal::ZERO;

        for line in &lines {
            let allocations =
                allocation::allocate_line(&txn, line.product_id, line.quantity, processed_by)
                    .await?;

            let product = product::Entity::find_by_id(line.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", line.product_id))
                })?;
            let qty = Decimal::from(line.quantity);
            total_weight += product.unit_weight * qty;
            total_volume += product.unit_volume * qty;
            total_value += product.unit_price * qty;

            for alloc in allocations {
                warehouse_id.get_or_insert(alloc.warehouse_id);
                summaries.push(AllocationSummary {
                    product_id: line.product_id,
                    batch_id: alloc.batch_id,
                    quantity: alloc.quantity(),
                });
                for item_id in &alloc.item_ids {
                    package_rows.push(package_item::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        package_id: Set(package_id),
                        product_id: Set(line.product_id),
                        batch_id: Set(alloc.batch_id),
                        item_id: Set(*item_id),
                    });
                    all_item_ids.push(*item_id);
                }
            }
        }

        // Pack the freshly allocated items. Guarded on `allocated` so a
        // concurrent writer shows up as a row-count mismatch.
        let packed = item::Entity::update_many()
            .col_expr(item::Column::Status, Expr::value(ItemStatus::Packed))
            .col_expr(item::Column::UpdatedAt, Expr::value(now))
            .filter(item::Column::Id.is_in(all_item_ids.clone()))
            .filter(item::Column::Status.eq(ItemStatus::Allocated))
            .exec(&txn)
            .await?;
        if packed.rows_affected != all_item_ids.len() as u64 {
            return Err(ServiceError::TransactionConflict(format!(
                "packed {} of {} allocated items",
                packed.rows_affected,
                all_item_ids.len()
            )));
        }
        let entries: Vec<item_event::ActiveModel> = all_item_ids
            .iter()
            .map(|id| {
                item_event::new_entry(
                    *id,
                    ItemAction::Packed,
                    now,
                    None,
                    Some(format!("packed into package {}", package_id)),
                    processed_by,
                )
            })
            .collect();
        item_event::Entity::insert_many(entries).exec(&txn).await?;

        let warehouse_id = warehouse_id.ok_or_else(|| {
            ServiceError::InternalError(format!("order {} produced no allocations", order_id))
        })?;
        let package_model = package::ActiveModel {
            id: Set(package_id),
            order_id: Set(order_id),
            warehouse_id: Set(warehouse_id),
            status: Set(PackageStatus::Created),
            item_count: Set(all_item_ids.len() as i32),
            total_weight: Set(total_weight),
            total_volume: Set(total_volume),
            total_value: Set(total_value),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await?;
        package_item::Entity::insert_many(package_rows)
            .exec(&txn)
            .await?;

        let mut order_active: order::ActiveModel = order_row.clone().into();
        order_active.status = Set(OrderStatus::Processing);
        order_active.updated_at = Set(Some(now));
        order_active.version = Set(order_row.version + 1);
        order_active.update(&txn).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order processing");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id = %order_id,
            package_id = %package_id,
            item_count = all_item_ids.len(),
            "Order processed into package"
        );

        if let Some(event_sender) = &self.event_sender {
            let event = Event::OrderProcessed {
                order_id,
                package_id,
            };
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, order_id = %order_id, "Failed to send order processed event");
            }
        }

        Ok(PackageResponse {
            id: package_model.id,
            order_id,
            warehouse_id,
            status: package_model.status.to_string(),
            item_count: package_model.item_count,
            total_weight: package_model.total_weight,
            total_volume: package_model.total_volume,
            total_value: package_model.total_value,
            allocations: summaries,
            created_at: package_model.created_at,
        })
    }

    /// Retrieves an order with its lines.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<OrderResponse>, ServiceError> {
        let db = &*self.db_pool;

        let Some(order_model) = order::Entity::find_by_id(order_id).one(db).await? else {
            return Ok(None);
        };

        let lines = order_line::Entity::find()
            .filter(order_line::Column::OrderId.eq(order_id))
            .all(db)
            .await?;
        let line_requests: Vec<OrderLineRequest> = lines
            .iter()
            .map(|l| OrderLineRequest {
                product_id: l.product_id,
                quantity: l.quantity,
            })
            .collect();

        Ok(Some(self.to_order_response(order_model, &line_requests)?))
    }

    /// Lists orders with pagination, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let db = &*self.db_pool;

        let paginator = order::Entity::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(db, per_page);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        let mut out = Vec::with_capacity(orders.len());
        for order_model in orders {
            let lines = order_line::Entity::find()
                .filter(order_line::Column::OrderId.eq(order_model.id))
                .all(db)
                .await?;
            let line_requests: Vec<OrderLineRequest> = lines
                .iter()
                .map(|l| OrderLineRequest {
                    product_id: l.product_id,
                    quantity: l.quantity,
                })
                .collect();
            out.push(self.to_order_response(order_model, &line_requests)?);
        }

        Ok(OrderListResponse {
            orders: out,
            total,
            page,
            per_page,
        })
    }

    fn to_order_response(
        &self,
        model: order::Model,
        lines: &[OrderLineRequest],
    ) -> Result<OrderResponse, ServiceError> {
        Ok(OrderResponse {
            id: model.id,
            external_order_id: model.external_order_id,
            status: model.status.to_string(),
            placed_at: model.placed_at,
            lines: lines
                .iter()
                .map(|l| OrderLineResponse {
                    product_id: l.product_id,
                    quantity: l.quantity,
                })
                .collect(),
            notes: model.notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
            version: model.version,
        })
    }
}
