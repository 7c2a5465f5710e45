use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        batch,
        item::{self, ItemStatus},
        item_event::{self, ItemAction},
        stock_level,
        product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Supply intake request: one received lot.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ReceiveBatchRequest {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    #[validate(length(min = 1, message = "Supplier name is required"))]
    pub supplier_name: String,
    #[validate(range(min = 1, max = 100_000, message = "Quantity must be between 1 and 100000"))]
    pub quantity: i32,
    pub manufacture_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchReceipt {
    pub batch_id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: i32,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchStock {
    pub batch_id: Uuid,
    pub warehouse_id: Uuid,
    pub manufacture_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub on_hand: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductStock {
    pub product_id: Uuid,
    pub total_on_hand: i32,
    /// Batches in allocation (FIFO) order.
    pub batches: Vec<BatchStock>,
}

/// Service for supply intake and stock queries.
#[derive(Clone)]
pub struct InventoryService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl InventoryService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Receives a lot into the warehouse: one immutable batch row, one item
    /// row per physical unit (each with a `received` history entry), and the
    /// batch's stock level, all in one transaction.
    #[instrument(skip(self, request), fields(product_id = %request.product_id, quantity = request.quantity))]
    pub async fn receive_batch(
        &self,
        request: ReceiveBatchRequest,
        received_by: Option<Uuid>,
    ) -> Result<BatchReceipt, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let now = Utc::now();
        let batch_id = Uuid::new_v4();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for batch intake");
            ServiceError::DatabaseError(e)
        })?;

        let product = product::Entity::find_by_id(request.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", request.product_id))
            })?;
        if !product.is_active {
            return Err(ServiceError::InvalidInput(format!(
                "Product {} is inactive and cannot receive stock",
                product.sku
            )));
        }

        batch::ActiveModel {
            id: Set(batch_id),
            product_id: Set(request.product_id),
            warehouse_id: Set(request.warehouse_id),
            supplier_name: Set(request.supplier_name.clone()),
            quantity_received: Set(request.quantity),
            manufacture_date: Set(request.manufacture_date),
            expiry_date: Set(request.expiry_date),
            received_at: Set(now),
            received_by: Set(received_by),
        }
        .insert(&txn)
        .await?;

        let serial_prefix = batch_id.simple().to_string()[..8].to_string();
        let mut items = Vec::with_capacity(request.quantity as usize);
        let mut entries = Vec::with_capacity(request.quantity as usize);
        for n in 1..=request.quantity {
            let item_id = Uuid::new_v4();
            items.push(item::ActiveModel {
                id: Set(item_id),
                batch_id: Set(batch_id),
                serial: Set(format!("{}-{:04}", serial_prefix, n)),
                status: Set(ItemStatus::InStock),
                updated_at: Set(now),
            });
            entries.push(item_event::new_entry(
                item_id,
                ItemAction::Received,
                now,
                None,
                Some(format!("received in batch {}", batch_id)),
                received_by,
            ));
        }
        item::Entity::insert_many(items).exec(&txn).await?;
        item_event::Entity::insert_many(entries).exec(&txn).await?;

        stock_level::ActiveModel {
            id: Set(Uuid::new_v4()),
            batch_id: Set(batch_id),
            warehouse_id: Set(request.warehouse_id),
            on_hand: Set(request.quantity),
            version: Set(1),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, batch_id = %batch_id, "Failed to commit batch intake");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            batch_id = %batch_id,
            product_id = %request.product_id,
            quantity = request.quantity,
            "Batch received"
        );

        if let Some(event_sender) = &self.event_sender {
            let event = Event::BatchReceived {
                batch_id,
                product_id: request.product_id,
                quantity: request.quantity,
            };
            if let Err(e) = event_sender.send(event).await {
                tracing::warn!(error = %e, batch_id = %batch_id, "Failed to send batch received event");
            }
        }

        Ok(BatchReceipt {
            batch_id,
            product_id: request.product_id,
            warehouse_id: request.warehouse_id,
            quantity: request.quantity,
            received_at: now,
        })
    }

    /// Current on-hand stock for a product, batch by batch in FIFO order.
    #[instrument(skip(self))]
    pub async fn get_stock(&self, product_id: Uuid) -> Result<ProductStock, ServiceError> {
        let db = &*self.db_pool;

        let batches = batch::Entity::find()
            .filter(batch::Column::ProductId.eq(product_id))
            .order_by_asc(batch::Column::ManufactureDate)
            .order_by_asc(batch::Column::ReceivedAt)
            .all(db)
            .await?;

        let mut out = Vec::with_capacity(batches.len());
        let mut total = 0;
        for b in batches {
            let on_hand = stock_level::Entity::find()
                .filter(stock_level::Column::BatchId.eq(b.id))
                .one(db)
                .await?
                .map(|l| l.on_hand)
                .unwrap_or(0);
            total += on_hand;
            out.push(BatchStock {
                batch_id: b.id,
                warehouse_id: b.warehouse_id,
                manufacture_date: b.manufacture_date,
                expiry_date: b.expiry_date,
                on_hand,
            });
        }

        Ok(ProductStock {
            product_id,
            total_on_hand: total,
            batches: out,
        })
    }

    /// Writes off a stocked unit as damaged: terminal status, history entry,
    /// and the aggregate decrement in one transaction.
    #[instrument(skip(self))]
    pub async fn mark_item_damaged(
        &self,
        item_id: Uuid,
        notes: Option<String>,
        recorded_by: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let item_row = item::Entity::find_by_id(item_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", item_id)))?;

        let (updated, entry) =
            item::transition(&item_row, ItemStatus::Damaged, now, None, notes, recorded_by)?;
        updated.update(&txn).await?;
        entry.insert(&txn).await?;

        let level = stock_level::Entity::find()
            .filter(stock_level::Column::BatchId.eq(item_row.batch_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "stock level for batch {} not found",
                    item_row.batch_id
                ))
            })?;

        let adjusted = stock_level::Entity::update_many()
            .col_expr(stock_level::Column::OnHand, Expr::value(level.on_hand - 1))
            .col_expr(stock_level::Column::Version, Expr::value(level.version + 1))
            .col_expr(stock_level::Column::UpdatedAt, Expr::value(now))
            .filter(stock_level::Column::Id.eq(level.id))
            .filter(stock_level::Column::Version.eq(level.version))
            .exec(&txn)
            .await?;
        if adjusted.rows_affected != 1 {
            return Err(ServiceError::TransactionConflict(format!(
                "stock level for batch {} changed concurrently",
                item_row.batch_id
            )));
        }

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(item_id = %item_id, batch_id = %item_row.batch_id, "Item written off as damaged");

        if let Some(event_sender) = &self.event_sender {
            let event = Event::ItemDamaged {
                item_id,
                batch_id: item_row.batch_id,
            };
            if let Err(e) = event_sender.send(event).await {
                tracing::warn!(error = %e, item_id = %item_id, "Failed to send item damaged event");
            }
        }

        Ok(())
    }

    /// Full append-only history for one item, oldest first. Read surface for
    /// audit and the analytics collaborator.
    #[instrument(skip(self))]
    pub async fn get_item_history(
        &self,
        item_id: Uuid,
    ) -> Result<Vec<item_event::Model>, ServiceError> {
        let db = &*self.db_pool;

        item::Entity::find_by_id(item_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", item_id)))?;

        let events = item_event::Entity::find()
            .filter(item_event::Column::ItemId.eq(item_id))
            .order_by_asc(item_event::Column::OccurredAt)
            .all(db)
            .await?;

        Ok(events)
    }
}
