use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    entities::item_event,
    services::inventory::{BatchReceipt, ProductStock, ReceiveBatchRequest},
    ApiResponse, ApiResult, AppState,
};

use super::actor_from_headers;

#[derive(Debug, Deserialize)]
pub struct DamageRequest {
    pub notes: Option<String>,
}

pub async fn receive_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ReceiveBatchRequest>,
) -> ApiResult<BatchReceipt> {
    let actor = actor_from_headers(&headers);
    let receipt = state.services.inventory.receive_batch(payload, actor).await?;
    Ok(Json(ApiResponse::success(receipt)))
}

pub async fn get_stock(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> ApiResult<ProductStock> {
    let stock = state.services.inventory.get_stock(product_id).await?;
    Ok(Json(ApiResponse::success(stock)))
}

pub async fn get_item_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<item_event::Model>> {
    let history = state.services.inventory.get_item_history(id).await?;
    Ok(Json(ApiResponse::success(history)))
}

pub async fn mark_item_damaged(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<DamageRequest>,
) -> ApiResult<()> {
    let actor = actor_from_headers(&headers);
    state
        .services
        .inventory
        .mark_item_damaged(id, payload.notes, actor)
        .await?;
    Ok(Json(ApiResponse::message("Item written off as damaged")))
}
