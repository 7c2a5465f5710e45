use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::{
        batch,
        item::{self, ItemStatus},
        item_event::{self, ItemAction},
        stock_level,
    },
    errors::ServiceError,
};

/// Items claimed from one batch while satisfying an allocation request.
#[derive(Debug, Clone)]
pub struct BatchAllocation {
    pub batch_id: Uuid,
    pub warehouse_id: Uuid,
    pub item_ids: Vec<Uuid>,
}

impl BatchAllocation {
    pub fn quantity(&self) -> i32 {
        self.item_ids.len() as i32
    }
}

/// Allocates `quantity` units of a product FIFO across its batches, oldest
/// manufacture date first. Runs on the caller's transaction: the caller owns
/// the atomicity boundary, so a shortfall or conflict rolls back every claim
/// made here along with the caller's other writes.
///
/// Item claims and stock-level decrements are guarded updates; a concurrent
/// request claiming the same rows surfaces as `TransactionConflict`, which
/// callers retry in a fresh transaction.
#[instrument(skip(txn), fields(product_id = %product_id, quantity = quantity))]
pub async fn allocate_line(
    txn: &DatabaseTransaction,
    product_id: Uuid,
    quantity: i32,
    recorded_by: Option<Uuid>,
) -> Result<Vec<BatchAllocation>, ServiceError> {
    if quantity <= 0 {
        return Err(ServiceError::InvalidInput(format!(
            "allocation quantity must be positive, got {}",
            quantity
        )));
    }

    // FIFO contract: oldest manufacture date first; receipt time breaks ties
    // deterministically.
    let batches = batch::Entity::find()
        .filter(batch::Column::ProductId.eq(product_id))
        .order_by_asc(batch::Column::ManufactureDate)
        .order_by_asc(batch::Column::ReceivedAt)
        .all(txn)
        .await?;

    let now = Utc::now();
    let mut remaining = quantity;
    let mut total_available: i32 = 0;
    let mut allocations: Vec<BatchAllocation> = Vec::new();

    for batch_row in &batches {
        if remaining == 0 {
            break;
        }

        let Some(level) = stock_level::Entity::find()
            .filter(stock_level::Column::BatchId.eq(batch_row.id))
            .one(txn)
            .await?
        else {
            continue;
        };

        if level.on_hand <= 0 {
            continue;
        }
        total_available += level.on_hand;

        let take = remaining.min(level.on_hand);

        // Item selection within a batch is unordered; any in_stock units do.
        let candidates: Vec<Uuid> = item::Entity::find()
            .filter(item::Column::BatchId.eq(batch_row.id))
            .filter(item::Column::Status.eq(ItemStatus::InStock))
            .limit(take as u64)
            .all(txn)
            .await?
            .into_iter()
            .map(|i| i.id)
            .collect();

        if candidates.len() < take as usize {
            // The aggregate promised more units than the registry holds.
            // Either a concurrent claim or cache drift; retry resolves both.
            warn!(
                batch_id = %batch_row.id,
                on_hand = level.on_hand,
                found = candidates.len(),
                "Stock level ahead of in_stock item rows"
            );
            return Err(ServiceError::TransactionConflict(format!(
                "batch {} stock level out of step with item registry",
                batch_row.id
            )));
        }

        // Guarded bulk claim: exactly one requester may move a given item out
        // of in_stock. A short row count means a concurrent winner.
        let claimed = item::Entity::update_many()
            .col_expr(item::Column::Status, Expr::value(ItemStatus::Allocated))
            .col_expr(item::Column::UpdatedAt, Expr::value(now))
            .filter(item::Column::Id.is_in(candidates.clone()))
            .filter(item::Column::Status.eq(ItemStatus::InStock))
            .exec(txn)
            .await?;

        if claimed.rows_affected != take as u64 {
            return Err(ServiceError::TransactionConflict(format!(
                "claimed {} of {} items in batch {}",
                claimed.rows_affected, take, batch_row.id
            )));
        }

        let entries: Vec<item_event::ActiveModel> = candidates
            .iter()
            .map(|item_id| {
                item_event::new_entry(*item_id, ItemAction::Allocated, now, None, None, recorded_by)
            })
            .collect();
        item_event::Entity::insert_many(entries).exec(txn).await?;

        // Version-guarded aggregate decrement, same transaction as the item
        // claims it mirrors.
        let updated = stock_level::Entity::update_many()
            .col_expr(
                stock_level::Column::OnHand,
                Expr::value(level.on_hand - take),
            )
            .col_expr(
                stock_level::Column::Version,
                Expr::value(level.version + 1),
            )
            .col_expr(stock_level::Column::UpdatedAt, Expr::value(now))
            .filter(stock_level::Column::Id.eq(level.id))
            .filter(stock_level::Column::Version.eq(level.version))
            .exec(txn)
            .await?;

        if updated.rows_affected != 1 {
            return Err(ServiceError::TransactionConflict(format!(
                "stock level for batch {} changed concurrently",
                batch_row.id
            )));
        }

        debug!(
            batch_id = %batch_row.id,
            taken = take,
            left_on_hand = level.on_hand - take,
            "Allocated from batch"
        );

        allocations.push(BatchAllocation {
            batch_id: batch_row.id,
            warehouse_id: batch_row.warehouse_id,
            item_ids: candidates,
        });
        remaining -= take;
    }

    if remaining > 0 {
        return Err(ServiceError::InsufficientInventory {
            product_id,
            requested: quantity,
            available: total_available,
        });
    }

    Ok(allocations)
}

/// Restores `quantity` previously delivered units of a (product, batch) back
/// to stock, appending `returned` history entries and incrementing the
/// aggregate. The counterpart of `allocate_line` used by return processing;
/// same transaction discipline, same conflict semantics.
#[instrument(skip(txn), fields(batch_id = %batch_id, quantity = item_ids.len()))]
pub async fn restock_items(
    txn: &DatabaseTransaction,
    batch_id: Uuid,
    item_ids: &[Uuid],
    recorded_by: Option<Uuid>,
) -> Result<(), ServiceError> {
    if item_ids.is_empty() {
        return Ok(());
    }
    let now = Utc::now();

    let restored = item::Entity::update_many()
        .col_expr(item::Column::Status, Expr::value(ItemStatus::InStock))
        .col_expr(item::Column::UpdatedAt, Expr::value(now))
        .filter(item::Column::Id.is_in(item_ids.to_vec()))
        .filter(item::Column::Status.eq(ItemStatus::Delivered))
        .exec(txn)
        .await?;

    if restored.rows_affected != item_ids.len() as u64 {
        return Err(ServiceError::TransactionConflict(format!(
            "restored {} of {} items for batch {}",
            restored.rows_affected,
            item_ids.len(),
            batch_id
        )));
    }

    let entries: Vec<item_event::ActiveModel> = item_ids
        .iter()
        .map(|item_id| {
            item_event::new_entry(*item_id, ItemAction::Returned, now, None, None, recorded_by)
        })
        .collect();
    item_event::Entity::insert_many(entries).exec(txn).await?;

    let level = stock_level::Entity::find()
        .filter(stock_level::Column::BatchId.eq(batch_id))
        .one(txn)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("stock level for batch {} not found", batch_id))
        })?;

    let updated = stock_level::Entity::update_many()
        .col_expr(
            stock_level::Column::OnHand,
            Expr::value(level.on_hand + item_ids.len() as i32),
        )
        .col_expr(stock_level::Column::Version, Expr::value(level.version + 1))
        .col_expr(stock_level::Column::UpdatedAt, Expr::value(now))
        .filter(stock_level::Column::Id.eq(level.id))
        .filter(stock_level::Column::Version.eq(level.version))
        .exec(txn)
        .await?;

    if updated.rows_affected != 1 {
        return Err(ServiceError::TransactionConflict(format!(
            "stock level for batch {} changed concurrently",
            batch_id
        )));
    }

    Ok(())
}
