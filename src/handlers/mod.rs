pub mod inventory;
pub mod orders;
pub mod packages;
pub mod returns;

use axum::http::HeaderMap;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::AppState;

/// Actor identity stamped by the auth collaborator. Parsed, never
/// authorized, here.
pub(crate) fn actor_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Assembles the engine's HTTP surface.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/v1/orders",
            post(orders::create_order).get(orders::list_orders),
        )
        .route("/api/v1/orders/:id", get(orders::get_order))
        .route("/api/v1/orders/:id/process", post(orders::process_order))
        .route(
            "/api/v1/packages/:id/transport",
            post(packages::assign_transport).get(packages::get_transport),
        )
        .route(
            "/api/v1/packages/:id/dispatch",
            post(packages::dispatch_package),
        )
        .route(
            "/api/v1/packages/:id/deliver",
            post(packages::mark_delivered),
        )
        .route("/api/v1/packages/:id/confirm", post(packages::confirm_sale))
        .route("/api/v1/sales", get(packages::list_sales))
        .route("/api/v1/returns", post(returns::initiate_return))
        .route("/api/v1/returns/:id", get(returns::get_return))
        .route(
            "/api/v1/returns/:id/schedule-pickup",
            post(returns::schedule_pickup),
        )
        .route("/api/v1/returns/:id/pickup", post(returns::mark_picked_up))
        .route("/api/v1/returns/:id/receive", post(returns::mark_received))
        .route("/api/v1/returns/:id/process", post(returns::process_return))
        .route(
            "/api/v1/inventory/receive",
            post(inventory::receive_batch),
        )
        .route(
            "/api/v1/inventory/stock/:product_id",
            get(inventory::get_stock),
        )
        .route(
            "/api/v1/inventory/items/:id/history",
            get(inventory::get_item_history),
        )
        .route(
            "/api/v1/inventory/items/:id/damage",
            post(inventory::mark_item_damaged),
        )
        .with_state(state)
}
