use chrono::{Duration as ChronoDuration, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info, instrument, warn};

use crate::{
    db::DbPool,
    entities::{
        package::{self, PackageStatus},
        transport::{self, TransportDirection, TransportStatus},
    },
    errors::ServiceError,
    services::sales::{SalesService, AUTO_CONFIRM_ACTOR},
};

/// What one scheduler pass did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub scanned: usize,
    pub confirmed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Spawns the recurring auto-confirmation worker. Once per interval it
/// finalizes delivered, unreturned packages whose grace period has elapsed.
pub fn start(
    db: Arc<DbPool>,
    sales: Arc<SalesService>,
    grace_days: i64,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(interval_secs));
        info!(
            grace_days = grace_days,
            interval_secs = interval_secs,
            "Auto-confirmation worker started"
        );
        loop {
            ticker.tick().await;
            match run_tick(&db, &sales, grace_days).await {
                Ok(summary) => {
                    info!(
                        scanned = summary.scanned,
                        confirmed = summary.confirmed,
                        skipped = summary.skipped,
                        failed = summary.failed,
                        "Auto-confirmation tick finished"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Auto-confirmation tick failed to scan candidates");
                }
            }
        }
    })
}

/// One scheduler pass. Finds packages delivered longer ago than the grace
/// period and confirms each in its own transaction; a single package's
/// failure is logged and skipped, never aborting the rest of the run.
///
/// Idempotent: the confirmation claim inside `SalesService::confirm_package`
/// makes a second pass over an already-confirmed order a no-op, so re-runs
/// and racing scheduler instances never double-write the ledger.
#[instrument(skip(db, sales))]
pub async fn run_tick(
    db: &DbPool,
    sales: &SalesService,
    grace_days: i64,
) -> Result<TickSummary, ServiceError> {
    let cutoff = Utc::now() - ChronoDuration::days(grace_days);

    let candidates = transport::Entity::find()
        .filter(transport::Column::Direction.eq(TransportDirection::Forward))
        .filter(transport::Column::Status.eq(TransportStatus::Delivered))
        .filter(transport::Column::DeliveredAt.lt(cutoff))
        .all(db)
        .await?;

    let mut summary = TickSummary::default();
    for candidate in candidates {
        summary.scanned += 1;

        let Some(package_row) = package::Entity::find_by_id(candidate.package_id)
            .one(db)
            .await?
        else {
            warn!(package_id = %candidate.package_id, "Transport references missing package");
            summary.skipped += 1;
            continue;
        };
        if package_row.status != PackageStatus::Delivered {
            summary.skipped += 1;
            continue;
        }

        match sales.confirm_package(package_row.id, AUTO_CONFIRM_ACTOR).await {
            Ok(Some(record)) => {
                info!(
                    package_id = %package_row.id,
                    sales_record_id = %record.id,
                    "Auto-confirmed sale"
                );
                summary.confirmed += 1;
            }
            Ok(None) => {
                summary.skipped += 1;
            }
            Err(e) => {
                // Log and move on to the next candidate.
                error!(
                    package_id = %package_row.id,
                    error = %e,
                    "Failed to auto-confirm package"
                );
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}
