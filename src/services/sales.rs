use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{
        order::{self, OrderStatus},
        package::{self, PackageStatus},
        sales_record,
        transport::{self, TransportDirection},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Actor stamped on scheduler-driven confirmations.
pub const AUTO_CONFIRM_ACTOR: &str = "auto-confirm";

#[derive(Debug, Serialize, Deserialize)]
pub struct SalesRecordResponse {
    pub id: Uuid,
    pub package_id: Uuid,
    pub order_id: Uuid,
    pub warehouse_id: Uuid,
    pub item_count: i32,
    pub total_value: rust_decimal::Decimal,
    pub delivered_at: chrono::DateTime<chrono::Utc>,
    pub confirmed_at: chrono::DateTime<chrono::Utc>,
    pub confirmed_by: String,
}

impl From<sales_record::Model> for SalesRecordResponse {
    fn from(model: sales_record::Model) -> Self {
        Self {
            id: model.id,
            package_id: model.package_id,
            order_id: model.order_id,
            warehouse_id: model.warehouse_id,
            item_count: model.item_count,
            total_value: model.total_value,
            delivered_at: model.delivered_at,
            confirmed_at: model.confirmed_at,
            confirmed_by: model.confirmed_by,
        }
    }
}

/// Service finalizing delivered packages into the immutable sales ledger.
/// Shared by the auto-confirmation scheduler and the manual path.
#[derive(Clone)]
pub struct SalesService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl SalesService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Confirms one delivered package into a permanent sales record.
    ///
    /// The order-status move is a claim: a conditional update from
    /// `delivered` to `sale_confirmed` whose row count decides the winner.
    /// Losing the claim (already confirmed, or returned meanwhile) returns
    /// `Ok(None)` and writes nothing, which makes re-runs and racing
    /// confirmers no-ops rather than double-writers.
    #[instrument(skip(self), fields(package_id = %package_id, confirmed_by = confirmed_by))]
    pub async fn confirm_package(
        &self,
        package_id: Uuid,
        confirmed_by: &str,
    ) -> Result<Option<SalesRecordResponse>, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

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
                attempted: "confirm_sale".to_string(),
            });
        }

        let transport_row = transport::Entity::find()
            .filter(transport::Column::PackageId.eq(package_id))
            .filter(transport::Column::Direction.eq(TransportDirection::Forward))
            .one(&txn)
            .await?
            .ok_or(ServiceError::TransportNotFound(package_id))?;
        let delivered_at = transport_row.delivered_at.ok_or_else(|| {
            ServiceError::InternalError(format!(
                "delivered package {} has no delivery timestamp",
                package_id
            ))
        })?;

        let claim = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(OrderStatus::SaleConfirmed))
            .col_expr(order::Column::UpdatedAt, Expr::value(Some(now)))
            .col_expr(
                order::Column::Version,
                Expr::col(order::Column::Version).add(1),
            )
            .filter(order::Column::Id.eq(package_row.order_id))
            .filter(order::Column::Status.eq(OrderStatus::Delivered))
            .exec(&txn)
            .await?;

        if claim.rows_affected == 0 {
            // Already confirmed or returned; nothing to write.
            info!(
                package_id = %package_id,
                order_id = %package_row.order_id,
                "Confirmation claim lost, skipping"
            );
            return Ok(None);
        }

        let record = sales_record::ActiveModel {
            id: Set(Uuid::new_v4()),
            package_id: Set(package_id),
            order_id: Set(package_row.order_id),
            warehouse_id: Set(package_row.warehouse_id),
            item_count: Set(package_row.item_count),
            total_value: Set(package_row.total_value),
            delivered_at: Set(delivered_at),
            confirmed_at: Set(now),
            confirmed_by: Set(confirmed_by.to_string()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, package_id = %package_id, "Failed to commit sale confirmation");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            package_id = %package_id,
            sales_record_id = %record.id,
            confirmed_by = confirmed_by,
            "Sale confirmed"
        );

        if let Some(event_sender) = &self.event_sender {
            let event = Event::SaleConfirmed {
                package_id,
                sales_record_id: record.id,
                confirmed_by: confirmed_by.to_string(),
            };
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, package_id = %package_id, "Failed to send sale confirmed event");
            }
        }

        Ok(Some(record.into()))
    }

    /// Manual confirmation path. Unlike the scheduler it does not wait out
    /// the grace period, and losing the claim is surfaced as an error so the
    /// caller learns the order already left `delivered`.
    #[instrument(skip(self), fields(package_id = %package_id))]
    pub async fn confirm_sale(
        &self,
        package_id: Uuid,
        confirmed_by: Uuid,
    ) -> Result<SalesRecordResponse, ServiceError> {
        match self
            .confirm_package(package_id, &confirmed_by.to_string())
            .await?
        {
            Some(record) => Ok(record),
            None => {
                let db = &*self.db_pool;
                let current = package::Entity::find_by_id(package_id)
                    .one(db)
                    .await?
                    .map(|p| p.status.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                Err(ServiceError::InvalidStateTransition {
                    entity: "order",
                    id: package_id,
                    current,
                    attempted: "confirm_sale".to_string(),
                })
            }
        }
    }

    /// The sales ledger, newest first. Read surface for the analytics
    /// collaborator.
    #[instrument(skip(self))]
    pub async fn list_sales(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<SalesRecordResponse>, u64), ServiceError> {
        use sea_orm::PaginatorTrait;

        let db = &*self.db_pool;
        let paginator = sales_record::Entity::find()
            .order_by_desc(sales_record::Column::ConfirmedAt)
            .paginate(db, per_page);

        let total = paginator.num_items().await?;
        let records = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((records.into_iter().map(Into::into).collect(), total))
    }
}
