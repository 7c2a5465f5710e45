use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    services::orders::{
        CreateOrderRequest, OrderListResponse, OrderResponse, PackageResponse,
    },
    ApiResponse, ApiResult, AppState, ListQuery,
};

use super::actor_from_headers;

pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateOrderRequest>,
) -> ApiResult<OrderResponse> {
    let actor = actor_from_headers(&headers);
    let created = state.services.orders.create_order(payload, actor).await?;
    Ok(Json(ApiResponse::success(created)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderResponse> {
    match state.services.orders.get_order(id).await? {
        Some(order) => Ok(Json(ApiResponse::success(order))),
        None => Err(ServiceError::NotFound(format!("Order {} not found", id))),
    }
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<OrderListResponse> {
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, 100);
    let list = state.services.orders.list_orders(page, limit).await?;
    Ok(Json(ApiResponse::success(list)))
}

pub async fn process_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<PackageResponse> {
    let actor = actor_from_headers(&headers);
    let package = state.services.orders.process_order(id, actor).await?;
    Ok(Json(ApiResponse::success(package)))
}
