pub mod batch;
pub mod item;
pub mod item_event;
pub mod order;
pub mod order_line;
pub mod package;
pub mod package_item;
pub mod product;
pub mod return_entity;
pub mod return_line;
pub mod sales_record;
pub mod stock_level;
pub mod transport;
pub mod transport_event;
