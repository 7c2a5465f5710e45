pub mod allocation;
pub mod inventory;
pub mod orders;
pub mod returns;
pub mod sales;
pub mod shipments;

use std::sync::Arc;

use crate::{config::AppConfig, db::DbPool, events::EventSender};

/// All engine services wired against one pool and event channel.
#[derive(Clone)]
pub struct AppServices {
    pub inventory: Arc<inventory::InventoryService>,
    pub orders: Arc<orders::OrderService>,
    pub shipments: Arc<shipments::ShipmentService>,
    pub returns: Arc<returns::ReturnService>,
    pub sales: Arc<sales::SalesService>,
}

impl AppServices {
    pub fn build(
        db: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        config: &AppConfig,
    ) -> Self {
        Self {
            inventory: Arc::new(inventory::InventoryService::new(
                db.clone(),
                event_sender.clone(),
            )),
            orders: Arc::new(orders::OrderService::new(
                db.clone(),
                event_sender.clone(),
                config.allocation_max_retries,
            )),
            shipments: Arc::new(shipments::ShipmentService::new(
                db.clone(),
                event_sender.clone(),
            )),
            returns: Arc::new(returns::ReturnService::new(
                db.clone(),
                event_sender.clone(),
                config.return_window_days,
                config.allocation_max_retries,
            )),
            sales: Arc::new(sales::SalesService::new(db, event_sender)),
        }
    }
}
