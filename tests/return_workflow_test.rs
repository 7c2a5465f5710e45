//! Return pipeline: window gating, duplicate and quantity checks, the
//! pickup leg, and atomic restock processing.

mod common;

use chrono::Duration;
use common::{mfg, TestEngine};
use fulfillment_engine::entities::item::ItemStatus;
use fulfillment_engine::errors::ServiceError;
use fulfillment_engine::services::returns::{InitiateReturnRequest, ReturnLineRequest};
use rust_decimal_macros::dec;
use uuid::Uuid;

fn full_return(package_id: Uuid, product_id: Uuid, batch_id: Uuid, quantity: i32) -> InitiateReturnRequest {
    InitiateReturnRequest {
        package_id,
        lines: vec![ReturnLineRequest {
            product_id,
            batch_id,
            quantity,
            restock: true,
        }],
        reason: "Wrong size".to_string(),
    }
}

#[tokio::test]
async fn full_quantity_return_round_trip_restores_stock() {
    let engine = TestEngine::new().await;
    let warehouse = Uuid::new_v4();
    let product = engine.seed_product("RET-SKU", dec!(12.00)).await;
    let batch = engine
        .seed_batch(product.id, warehouse, 6, mfg(2024, 5, 1))
        .await;

    let package = engine.place_and_process("ORD-RET-1", product.id, 4).await;
    engine.deliver_package(package.id).await;
    assert_eq!(engine.stock_on_hand(batch.batch_id).await, 2);

    let ret = engine
        .services
        .returns
        .initiate_return(
            full_return(package.id, product.id, batch.batch_id, 4),
            None,
        )
        .await
        .expect("initiate return");
    assert_eq!(ret.status, "initiated");
    // The order reflects the return request immediately.
    assert_eq!(engine.order_status(package.order_id).await, "returned");

    let ret = engine
        .services
        .returns
        .schedule_pickup(ret.id, Uuid::new_v4())
        .await
        .expect("schedule pickup");
    assert_eq!(ret.status, "pickup_scheduled");

    let ret = engine
        .services
        .returns
        .mark_picked_up(ret.id)
        .await
        .expect("mark picked up");
    assert_eq!(ret.status, "picked_up");

    let outcome = engine
        .services
        .returns
        .process_return(ret.id, None)
        .await
        .expect("process return");
    assert_eq!(outcome.restocked, 4);
    assert_eq!(outcome.retired, 0);

    // Every unit is back in stock and the aggregate matches its
    // pre-allocation value.
    assert_eq!(engine.stock_on_hand(batch.batch_id).await, 6);
    assert_eq!(engine.count_items(batch.batch_id, ItemStatus::InStock).await, 6);
    assert_eq!(engine.package_status(package.id).await, "returned");

    let stored = engine
        .services
        .returns
        .get_return(ret.id)
        .await
        .expect("get return")
        .expect("return exists");
    assert_eq!(stored.status, "processed");
    assert!(stored.processed_at.is_some());
}

#[tokio::test]
async fn return_window_boundary() {
    let engine = TestEngine::new().await;
    let warehouse = Uuid::new_v4();
    let product = engine.seed_product("WINDOW-SKU", dec!(3.00)).await;
    let batch = engine
        .seed_batch(product.id, warehouse, 4, mfg(2024, 5, 1))
        .await;
    let window = engine.config.return_window_days;

    // Delivered just inside the window: initiation succeeds.
    let inside = engine.place_and_process("ORD-WIN-IN", product.id, 1).await;
    engine.deliver_package(inside.id).await;
    engine
        .backdate_delivery(inside.id, Duration::days(window) - Duration::seconds(1))
        .await;
    engine
        .services
        .returns
        .initiate_return(full_return(inside.id, product.id, batch.batch_id, 1), None)
        .await
        .expect("inside the window");

    // Delivered just past the window: initiation fails.
    let outside = engine.place_and_process("ORD-WIN-OUT", product.id, 1).await;
    engine.deliver_package(outside.id).await;
    engine
        .backdate_delivery(outside.id, Duration::days(window) + Duration::seconds(1))
        .await;
    let err = engine
        .services
        .returns
        .initiate_return(full_return(outside.id, product.id, batch.batch_id, 1), None)
        .await
        .expect_err("outside the window");
    match err {
        ServiceError::ReturnWindowExpired {
            package_id,
            window_days,
            ..
        } => {
            assert_eq!(package_id, outside.id);
            assert_eq!(window_days, window);
        }
        other => panic!("expected ReturnWindowExpired, got {:?}", other),
    }
}

#[tokio::test]
async fn only_one_return_per_package() {
    let engine = TestEngine::new().await;
    let warehouse = Uuid::new_v4();
    let product = engine.seed_product("ONE-RET", dec!(3.00)).await;
    let batch = engine
        .seed_batch(product.id, warehouse, 4, mfg(2024, 5, 1))
        .await;

    let package = engine.place_and_process("ORD-ONE-RET", product.id, 2).await;
    engine.deliver_package(package.id).await;

    engine
        .services
        .returns
        .initiate_return(full_return(package.id, product.id, batch.batch_id, 1), None)
        .await
        .expect("first return");
    let err = engine
        .services
        .returns
        .initiate_return(full_return(package.id, product.id, batch.batch_id, 1), None)
        .await
        .expect_err("second return");
    assert!(matches!(err, ServiceError::DuplicateReturn(id) if id == package.id));
}

#[tokio::test]
async fn return_quantity_capped_by_allocation() {
    let engine = TestEngine::new().await;
    let warehouse = Uuid::new_v4();
    let product = engine.seed_product("CAP-RET", dec!(3.00)).await;
    let batch = engine
        .seed_batch(product.id, warehouse, 10, mfg(2024, 5, 1))
        .await;

    let package = engine.place_and_process("ORD-CAP-RET", product.id, 3).await;
    engine.deliver_package(package.id).await;

    let err = engine
        .services
        .returns
        .initiate_return(full_return(package.id, product.id, batch.batch_id, 5), None)
        .await
        .expect_err("more than allocated");
    match err {
        ServiceError::QuantityExceedsAllocation {
            requested,
            allocated,
            ..
        } => {
            assert_eq!(requested, 5);
            assert_eq!(allocated, 3);
        }
        other => panic!("expected QuantityExceedsAllocation, got {:?}", other),
    }
}

#[tokio::test]
async fn return_requires_a_delivered_package() {
    let engine = TestEngine::new().await;
    let warehouse = Uuid::new_v4();
    let product = engine.seed_product("UNDELIV-RET", dec!(3.00)).await;
    let batch = engine
        .seed_batch(product.id, warehouse, 4, mfg(2024, 5, 1))
        .await;

    let package = engine.place_and_process("ORD-UNDELIV", product.id, 1).await;

    let err = engine
        .services
        .returns
        .initiate_return(full_return(package.id, product.id, batch.batch_id, 1), None)
        .await
        .expect_err("package not delivered");
    assert!(matches!(err, ServiceError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn pipeline_stages_enforce_order() {
    let engine = TestEngine::new().await;
    let warehouse = Uuid::new_v4();
    let product = engine.seed_product("STAGE-RET", dec!(3.00)).await;
    let batch = engine
        .seed_batch(product.id, warehouse, 4, mfg(2024, 5, 1))
        .await;

    let package = engine.place_and_process("ORD-STAGE", product.id, 1).await;
    engine.deliver_package(package.id).await;
    let ret = engine
        .services
        .returns
        .initiate_return(full_return(package.id, product.id, batch.batch_id, 1), None)
        .await
        .expect("initiate");

    // Skipping straight to pickup or processing is illegal.
    let err = engine
        .services
        .returns
        .mark_picked_up(ret.id)
        .await
        .expect_err("pickup not scheduled");
    assert!(matches!(err, ServiceError::InvalidStateTransition { .. }));

    let err = engine
        .services
        .returns
        .process_return(ret.id, None)
        .await
        .expect_err("not picked up");
    assert!(matches!(err, ServiceError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn non_restockable_units_are_retired() {
    let engine = TestEngine::new().await;
    let warehouse = Uuid::new_v4();
    let product = engine.seed_product("RETIRE-SKU", dec!(3.00)).await;
    let batch = engine
        .seed_batch(product.id, warehouse, 4, mfg(2024, 5, 1))
        .await;

    let package = engine.place_and_process("ORD-RETIRE", product.id, 3).await;
    engine.deliver_package(package.id).await;

    let ret = engine
        .services
        .returns
        .initiate_return(
            InitiateReturnRequest {
                package_id: package.id,
                lines: vec![
                    ReturnLineRequest {
                        product_id: product.id,
                        batch_id: batch.batch_id,
                        quantity: 2,
                        restock: true,
                    },
                    ReturnLineRequest {
                        product_id: product.id,
                        batch_id: batch.batch_id,
                        quantity: 1,
                        restock: false,
                    },
                ],
                reason: "One unit arrived broken".to_string(),
            },
            None,
        )
        .await
        .expect("initiate");
    let ret = engine
        .services
        .returns
        .schedule_pickup(ret.id, Uuid::new_v4())
        .await
        .expect("schedule");
    let ret = engine
        .services
        .returns
        .mark_picked_up(ret.id)
        .await
        .expect("picked up");
    let outcome = engine
        .services
        .returns
        .process_return(ret.id, None)
        .await
        .expect("process");

    assert_eq!(outcome.restocked, 2);
    assert_eq!(outcome.retired, 1);
    // 1 unit never sold, 2 restocked, 1 retired for audit.
    assert_eq!(engine.stock_on_hand(batch.batch_id).await, 3);
    assert_eq!(engine.count_items(batch.batch_id, ItemStatus::InStock).await, 3);
    assert_eq!(engine.count_items(batch.batch_id, ItemStatus::Returned).await, 1);
}

#[tokio::test]
async fn received_leg_is_optional_but_ordered() {
    let engine = TestEngine::new().await;
    let warehouse = Uuid::new_v4();
    let product = engine.seed_product("RECV-SKU", dec!(3.00)).await;
    let batch = engine
        .seed_batch(product.id, warehouse, 4, mfg(2024, 5, 1))
        .await;

    let package = engine.place_and_process("ORD-RECV", product.id, 2).await;
    engine.deliver_package(package.id).await;
    let ret = engine
        .services
        .returns
        .initiate_return(full_return(package.id, product.id, batch.batch_id, 2), None)
        .await
        .expect("initiate");
    let ret = engine
        .services
        .returns
        .schedule_pickup(ret.id, Uuid::new_v4())
        .await
        .expect("schedule");
    let ret = engine
        .services
        .returns
        .mark_picked_up(ret.id)
        .await
        .expect("picked up");
    let ret = engine
        .services
        .returns
        .mark_received(ret.id)
        .await
        .expect("received");
    assert_eq!(ret.status, "received");

    let outcome = engine
        .services
        .returns
        .process_return(ret.id, None)
        .await
        .expect("process after receipt");
    assert_eq!(outcome.restocked, 2);
}
