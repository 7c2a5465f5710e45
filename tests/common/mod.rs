#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use uuid::Uuid;

use fulfillment_engine::{
    config::AppConfig,
    db::{self, DbPool},
    entities::{
        item::{self, ItemStatus},
        package,
        product,
        sales_record,
        stock_level,
        transport::{self, TransportDirection},
    },
    services::{
        inventory::{BatchReceipt, ReceiveBatchRequest},
        orders::{CreateOrderRequest, OrderLineRequest, PackageResponse},
        AppServices,
    },
};

/// Test harness: in-memory SQLite with migrations applied and services
/// invoked directly.
pub struct TestEngine {
    pub db: Arc<DbPool>,
    pub services: AppServices,
    pub config: AppConfig,
}

impl TestEngine {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:");
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.ensure_valid().expect("test config valid");

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool).await.expect("migrations apply");

        let db = Arc::new(pool);
        let services = AppServices::build(db.clone(), None, &cfg);

        Self {
            db,
            services,
            config: cfg,
        }
    }

    /// Seeds a catalog product. The catalog is an external collaborator, so
    /// tests insert reference rows directly.
    pub async fn seed_product(&self, sku: &str, price: Decimal) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            sku: Set(sku.to_string()),
            name: Set(format!("Product {}", sku)),
            unit_weight: Set(Decimal::new(5, 1)),
            unit_volume: Set(Decimal::new(2, 1)),
            unit_price: Set(price),
            reorder_threshold: Set(5),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("seed product")
    }

    /// Receives a batch through the intake path.
    pub async fn seed_batch(
        &self,
        product_id: Uuid,
        warehouse_id: Uuid,
        quantity: i32,
        manufacture_date: NaiveDate,
    ) -> BatchReceipt {
        self.services
            .inventory
            .receive_batch(
                ReceiveBatchRequest {
                    product_id,
                    warehouse_id,
                    supplier_name: "Acme Supply".to_string(),
                    quantity,
                    manufacture_date,
                    expiry_date: None,
                },
                None,
            )
            .await
            .expect("seed batch")
    }

    /// Creates and processes a single-line order, returning the package.
    pub async fn place_and_process(
        &self,
        external_order_id: &str,
        product_id: Uuid,
        quantity: i32,
    ) -> PackageResponse {
        let order = self
            .services
            .orders
            .create_order(
                CreateOrderRequest {
                    external_order_id: external_order_id.to_string(),
                    lines: vec![OrderLineRequest {
                        product_id,
                        quantity,
                    }],
                    notes: None,
                },
                None,
            )
            .await
            .expect("create order");
        self.services
            .orders
            .process_order(order.id, None)
            .await
            .expect("process order")
    }

    /// Walks a package through assign -> dispatch -> deliver.
    pub async fn deliver_package(&self, package_id: Uuid) {
        let transporter = Uuid::new_v4();
        self.services
            .shipments
            .assign_transport(package_id, transporter, None)
            .await
            .expect("assign transport");
        self.services
            .shipments
            .dispatch_package(package_id, None)
            .await
            .expect("dispatch package");
        self.services
            .shipments
            .mark_delivered(package_id, None)
            .await
            .expect("mark delivered");
    }

    /// Rewrites the forward transport's delivery timestamp to `ago` before
    /// now, for window and grace period tests.
    pub async fn backdate_delivery(&self, package_id: Uuid, ago: Duration) {
        let row = transport::Entity::find()
            .filter(transport::Column::PackageId.eq(package_id))
            .filter(transport::Column::Direction.eq(TransportDirection::Forward))
            .one(&*self.db)
            .await
            .expect("query transport")
            .expect("forward transport exists");
        let mut active: transport::ActiveModel = row.into();
        active.delivered_at = Set(Some(Utc::now() - ago));
        active.update(&*self.db).await.expect("backdate delivery");
    }

    pub async fn stock_on_hand(&self, batch_id: Uuid) -> i32 {
        stock_level::Entity::find()
            .filter(stock_level::Column::BatchId.eq(batch_id))
            .one(&*self.db)
            .await
            .expect("query stock level")
            .map(|l| l.on_hand)
            .unwrap_or(0)
    }

    pub async fn count_items(&self, batch_id: Uuid, status: ItemStatus) -> u64 {
        item::Entity::find()
            .filter(item::Column::BatchId.eq(batch_id))
            .filter(item::Column::Status.eq(status))
            .count(&*self.db)
            .await
            .expect("count items")
    }

    pub async fn package_status(&self, package_id: Uuid) -> String {
        package::Entity::find_by_id(package_id)
            .one(&*self.db)
            .await
            .expect("query package")
            .expect("package exists")
            .status
            .to_string()
    }

    pub async fn order_status(&self, order_id: Uuid) -> String {
        fulfillment_engine::entities::order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await
            .expect("query order")
            .expect("order exists")
            .status
            .to_string()
    }

    pub async fn sales_record_count(&self, package_id: Uuid) -> u64 {
        sales_record::Entity::find()
            .filter(sales_record::Column::PackageId.eq(package_id))
            .count(&*self.db)
            .await
            .expect("count sales records")
    }
}

pub fn mfg(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}
