//! Auto-confirmation scheduler: grace-period gating, idempotency of the
//! tick, and the interplay with returns and manual confirmation.

mod common;

use chrono::Duration;
use common::{mfg, TestEngine};
use fulfillment_engine::errors::ServiceError;
use fulfillment_engine::jobs::auto_confirm;
use fulfillment_engine::services::returns::{InitiateReturnRequest, ReturnLineRequest};
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
async fn tick_confirms_packages_past_grace_period_exactly_once() {
    let engine = TestEngine::new().await;
    let warehouse = Uuid::new_v4();
    let product = engine.seed_product("CONF-SKU", dec!(20.00)).await;
    engine
        .seed_batch(product.id, warehouse, 5, mfg(2024, 6, 1))
        .await;
    let grace = engine.config.confirm_grace_days;

    let package = engine.place_and_process("ORD-CONF-1", product.id, 2).await;
    engine.deliver_package(package.id).await;
    engine
        .backdate_delivery(package.id, Duration::days(grace) + Duration::days(1))
        .await;

    let summary = auto_confirm::run_tick(&engine.db, &engine.services.sales, grace)
        .await
        .expect("first tick");
    assert_eq!(summary.confirmed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(engine.order_status(package.order_id).await, "sale_confirmed");
    assert_eq!(engine.sales_record_count(package.id).await, 1);

    // Re-running the tick is a no-op: same single ledger row, same status.
    let summary = auto_confirm::run_tick(&engine.db, &engine.services.sales, grace)
        .await
        .expect("second tick");
    assert_eq!(summary.confirmed, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(engine.sales_record_count(package.id).await, 1);
    assert_eq!(engine.order_status(package.order_id).await, "sale_confirmed");
}

#[tokio::test]
async fn recent_deliveries_are_left_alone() {
    let engine = TestEngine::new().await;
    let warehouse = Uuid::new_v4();
    let product = engine.seed_product("RECENT-SKU", dec!(20.00)).await;
    engine
        .seed_batch(product.id, warehouse, 5, mfg(2024, 6, 1))
        .await;
    let grace = engine.config.confirm_grace_days;

    let package = engine.place_and_process("ORD-RECENT", product.id, 1).await;
    engine.deliver_package(package.id).await;
    engine.backdate_delivery(package.id, Duration::days(1)).await;

    let summary = auto_confirm::run_tick(&engine.db, &engine.services.sales, grace)
        .await
        .expect("tick");
    assert_eq!(summary.scanned, 0);
    assert_eq!(summary.confirmed, 0);
    assert_eq!(engine.order_status(package.order_id).await, "delivered");
    assert_eq!(engine.sales_record_count(package.id).await, 0);
}

#[tokio::test]
async fn returned_orders_are_never_confirmed() {
    let engine = TestEngine::new().await;
    let warehouse = Uuid::new_v4();
    let product = engine.seed_product("RETCONF-SKU", dec!(20.00)).await;
    let batch = engine
        .seed_batch(product.id, warehouse, 5, mfg(2024, 6, 1))
        .await;
    let grace = engine.config.confirm_grace_days;

    let package = engine.place_and_process("ORD-RETCONF", product.id, 1).await;
    engine.deliver_package(package.id).await;

    engine
        .services
        .returns
        .initiate_return(
            InitiateReturnRequest {
                package_id: package.id,
                lines: vec![ReturnLineRequest {
                    product_id: product.id,
                    batch_id: batch.batch_id,
                    quantity: 1,
                    restock: true,
                }],
                reason: "Changed my mind".to_string(),
            },
            None,
        )
        .await
        .expect("initiate return");

    // Even long past the grace period, the returned order is not finalized.
    engine
        .backdate_delivery(package.id, Duration::days(grace * 2))
        .await;
    let summary = auto_confirm::run_tick(&engine.db, &engine.services.sales, grace)
        .await
        .expect("tick");
    assert_eq!(summary.confirmed, 0);
    assert_eq!(engine.sales_record_count(package.id).await, 0);
    assert_eq!(engine.order_status(package.order_id).await, "returned");
}

#[tokio::test]
async fn manual_confirmation_shares_the_ledger_guarantees() {
    let engine = TestEngine::new().await;
    let warehouse = Uuid::new_v4();
    let product = engine.seed_product("MANUAL-SKU", dec!(20.00)).await;
    let batch = engine
        .seed_batch(product.id, warehouse, 5, mfg(2024, 6, 1))
        .await;
    let grace = engine.config.confirm_grace_days;

    let package = engine.place_and_process("ORD-MANUAL", product.id, 1).await;
    engine.deliver_package(package.id).await;

    let actor = Uuid::new_v4();
    let record = engine
        .services
        .sales
        .confirm_sale(package.id, actor)
        .await
        .expect("manual confirm");
    assert_eq!(record.confirmed_by, actor.to_string());
    assert_eq!(engine.order_status(package.order_id).await, "sale_confirmed");

    // A confirmed sale closes the return window early, even while the
    // window itself is still open.
    let err = engine
        .services
        .returns
        .initiate_return(
            InitiateReturnRequest {
                package_id: package.id,
                lines: vec![ReturnLineRequest {
                    product_id: product.id,
                    batch_id: batch.batch_id,
                    quantity: 1,
                    restock: true,
                }],
                reason: "Too late".to_string(),
            },
            None,
        )
        .await
        .expect_err("sale already confirmed");
    assert!(matches!(err, ServiceError::InvalidStateTransition { .. }));

    // A second manual confirmation surfaces the state, not a double write.
    let err = engine
        .services
        .sales
        .confirm_sale(package.id, actor)
        .await
        .expect_err("already confirmed");
    assert!(matches!(err, ServiceError::InvalidStateTransition { .. }));

    // The scheduler cannot double-write after a manual confirmation.
    engine
        .backdate_delivery(package.id, Duration::days(grace) + Duration::days(1))
        .await;
    let summary = auto_confirm::run_tick(&engine.db, &engine.services.sales, grace)
        .await
        .expect("tick");
    assert_eq!(summary.confirmed, 0);
    assert_eq!(engine.sales_record_count(package.id).await, 1);
}
