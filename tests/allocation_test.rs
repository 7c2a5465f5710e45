//! FIFO allocation invariants: batch ordering, atomicity of multi-line
//! processing, conservation of quantities, and shortfall reporting.

mod common;

use common::{mfg, TestEngine};
use fulfillment_engine::entities::item::ItemStatus;
use fulfillment_engine::errors::ServiceError;
use fulfillment_engine::services::allocation;
use fulfillment_engine::services::orders::{CreateOrderRequest, OrderLineRequest};
use rust_decimal_macros::dec;
use sea_orm::TransactionTrait;
use uuid::Uuid;

#[tokio::test]
async fn allocates_oldest_batch_first_and_spills_into_newer() {
    let engine = TestEngine::new().await;
    let warehouse = Uuid::new_v4();
    let product = engine.seed_product("FIFO-SKU", dec!(10.00)).await;

    let batch_a = engine
        .seed_batch(product.id, warehouse, 5, mfg(2024, 1, 1))
        .await;
    let batch_b = engine
        .seed_batch(product.id, warehouse, 10, mfg(2024, 2, 1))
        .await;

    let package = engine.place_and_process("ORD-FIFO-1", product.id, 8).await;

    assert_eq!(package.item_count, 8);
    assert_eq!(package.allocations.len(), 2);
    let from_a = package
        .allocations
        .iter()
        .find(|a| a.batch_id == batch_a.batch_id)
        .expect("older batch used");
    let from_b = package
        .allocations
        .iter()
        .find(|a| a.batch_id == batch_b.batch_id)
        .expect("newer batch used");
    assert_eq!(from_a.quantity, 5);
    assert_eq!(from_b.quantity, 3);

    assert_eq!(engine.stock_on_hand(batch_a.batch_id).await, 0);
    assert_eq!(engine.stock_on_hand(batch_b.batch_id).await, 7);
}

#[tokio::test]
async fn small_allocation_never_touches_newer_batch() {
    let engine = TestEngine::new().await;
    let warehouse = Uuid::new_v4();
    let product = engine.seed_product("FIFO-SMALL", dec!(4.50)).await;

    let batch_a = engine
        .seed_batch(product.id, warehouse, 5, mfg(2024, 1, 1))
        .await;
    let batch_b = engine
        .seed_batch(product.id, warehouse, 10, mfg(2024, 2, 1))
        .await;

    let package = engine.place_and_process("ORD-FIFO-2", product.id, 3).await;

    assert_eq!(package.allocations.len(), 1);
    assert_eq!(package.allocations[0].batch_id, batch_a.batch_id);
    assert_eq!(engine.stock_on_hand(batch_a.batch_id).await, 2);
    assert_eq!(engine.stock_on_hand(batch_b.batch_id).await, 10);
    assert_eq!(
        engine.count_items(batch_b.batch_id, ItemStatus::InStock).await,
        10
    );
}

#[tokio::test]
async fn shortfall_fails_and_preserves_prior_state() {
    let engine = TestEngine::new().await;
    let warehouse = Uuid::new_v4();
    let product = engine.seed_product("FIFO-SHORT", dec!(7.25)).await;

    let batch_a = engine
        .seed_batch(product.id, warehouse, 5, mfg(2024, 1, 1))
        .await;
    let batch_b = engine
        .seed_batch(product.id, warehouse, 10, mfg(2024, 2, 1))
        .await;

    // First call drains batch A and part of B.
    engine.place_and_process("ORD-SHORT-1", product.id, 8).await;

    // Second call wants 10 with only 7 left: must fail whole and leave the
    // first call's effects untouched.
    let order = engine
        .services
        .orders
        .create_order(
            CreateOrderRequest {
                external_order_id: "ORD-SHORT-2".to_string(),
                lines: vec![OrderLineRequest {
                    product_id: product.id,
                    quantity: 10,
                }],
                notes: None,
            },
            None,
        )
        .await
        .expect("create order");

    let err = engine
        .services
        .orders
        .process_order(order.id, None)
        .await
        .expect_err("allocation must fail");
    match err {
        ServiceError::InsufficientInventory {
            product_id,
            requested,
            available,
        } => {
            assert_eq!(product_id, product.id);
            assert_eq!(requested, 10);
            assert_eq!(available, 7);
        }
        other => panic!("expected InsufficientInventory, got {:?}", other),
    }

    assert_eq!(engine.order_status(order.id).await, "pending");
    assert_eq!(engine.stock_on_hand(batch_a.batch_id).await, 0);
    assert_eq!(engine.stock_on_hand(batch_b.batch_id).await, 7);
}

#[tokio::test]
async fn failing_line_rolls_back_earlier_lines() {
    let engine = TestEngine::new().await;
    let warehouse = Uuid::new_v4();
    let product_a = engine.seed_product("ATOMIC-A", dec!(3.00)).await;
    let product_b = engine.seed_product("ATOMIC-B", dec!(9.00)).await;

    let batch_a = engine
        .seed_batch(product_a.id, warehouse, 5, mfg(2024, 3, 1))
        .await;
    let batch_b = engine
        .seed_batch(product_b.id, warehouse, 2, mfg(2024, 3, 1))
        .await;

    let order = engine
        .services
        .orders
        .create_order(
            CreateOrderRequest {
                external_order_id: "ORD-ATOMIC".to_string(),
                lines: vec![
                    OrderLineRequest {
                        product_id: product_a.id,
                        quantity: 3,
                    },
                    OrderLineRequest {
                        product_id: product_b.id,
                        quantity: 5,
                    },
                ],
                notes: None,
            },
            None,
        )
        .await
        .expect("create order");

    let err = engine
        .services
        .orders
        .process_order(order.id, None)
        .await
        .expect_err("second line is short");
    assert!(matches!(err, ServiceError::InsufficientInventory { .. }));

    // No partial allocation observable: first line fully rolled back.
    assert_eq!(engine.order_status(order.id).await, "pending");
    assert_eq!(engine.stock_on_hand(batch_a.batch_id).await, 5);
    assert_eq!(engine.stock_on_hand(batch_b.batch_id).await, 2);
    assert_eq!(
        engine.count_items(batch_a.batch_id, ItemStatus::InStock).await,
        5
    );
    assert_eq!(
        engine.count_items(batch_a.batch_id, ItemStatus::Allocated).await,
        0
    );
}

#[tokio::test]
async fn conservation_of_allocated_quantities() {
    let engine = TestEngine::new().await;
    let warehouse = Uuid::new_v4();
    let product_a = engine.seed_product("CONS-A", dec!(2.00)).await;
    let product_b = engine.seed_product("CONS-B", dec!(8.00)).await;

    engine
        .seed_batch(product_a.id, warehouse, 4, mfg(2024, 1, 15))
        .await;
    engine
        .seed_batch(product_a.id, warehouse, 4, mfg(2024, 2, 15))
        .await;
    engine
        .seed_batch(product_b.id, warehouse, 6, mfg(2024, 1, 15))
        .await;

    let order = engine
        .services
        .orders
        .create_order(
            CreateOrderRequest {
                external_order_id: "ORD-CONS".to_string(),
                lines: vec![
                    OrderLineRequest {
                        product_id: product_a.id,
                        quantity: 6,
                    },
                    OrderLineRequest {
                        product_id: product_b.id,
                        quantity: 2,
                    },
                ],
                notes: None,
            },
            None,
        )
        .await
        .expect("create order");
    let package = engine
        .services
        .orders
        .process_order(order.id, None)
        .await
        .expect("process order");

    let allocated: i32 = package.allocations.iter().map(|a| a.quantity).sum();
    assert_eq!(allocated, 8);
    assert_eq!(package.item_count, 8);

    // Aggregate totals follow the product attributes times quantity.
    assert_eq!(package.total_value, dec!(2.00) * dec!(6) + dec!(8.00) * dec!(2));
}

#[tokio::test]
async fn zero_quantity_allocation_is_invalid_input() {
    let engine = TestEngine::new().await;
    let product = engine.seed_product("ZERO-SKU", dec!(1.00)).await;

    let txn = engine.db.begin().await.expect("begin");
    let err = allocation::allocate_line(&txn, product.id, 0, None)
        .await
        .expect_err("zero quantity rejected");
    assert!(matches!(err, ServiceError::InvalidInput(_)));
    txn.rollback().await.expect("rollback");
}

#[tokio::test]
async fn product_without_batches_reports_zero_available() {
    let engine = TestEngine::new().await;
    let product = engine.seed_product("EMPTY-SKU", dec!(1.00)).await;

    let txn = engine.db.begin().await.expect("begin");
    let err = allocation::allocate_line(&txn, product.id, 1, None)
        .await
        .expect_err("nothing to allocate");
    match err {
        ServiceError::InsufficientInventory { available, .. } => assert_eq!(available, 0),
        other => panic!("expected InsufficientInventory, got {:?}", other),
    }
    txn.rollback().await.expect("rollback");
}
