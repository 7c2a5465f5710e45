use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    services::sales::SalesRecordResponse,
    services::shipments::TransportResponse,
    ApiResponse, ApiResult, AppState, ListQuery,
};

use super::actor_from_headers;

#[derive(Debug, Deserialize)]
pub struct AssignTransportRequest {
    pub transporter_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SalesListResponse {
    pub sales: Vec<SalesRecordResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

pub async fn assign_transport(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignTransportRequest>,
) -> ApiResult<TransportResponse> {
    let actor = actor_from_headers(&headers);
    let transport = state
        .services
        .shipments
        .assign_transport(id, payload.transporter_id, actor)
        .await?;
    Ok(Json(ApiResponse::success(transport)))
}

pub async fn get_transport(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<TransportResponse> {
    match state.services.shipments.get_transport(id).await? {
        Some(transport) => Ok(Json(ApiResponse::success(transport))),
        None => Err(ServiceError::TransportNotFound(id)),
    }
}

pub async fn dispatch_package(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<TransportResponse> {
    let actor = actor_from_headers(&headers);
    let transport = state.services.shipments.dispatch_package(id, actor).await?;
    Ok(Json(ApiResponse::success(transport)))
}

pub async fn mark_delivered(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<TransportResponse> {
    let actor = actor_from_headers(&headers);
    let transport = state.services.shipments.mark_delivered(id, actor).await?;
    Ok(Json(ApiResponse::success(transport)))
}

pub async fn confirm_sale(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<SalesRecordResponse> {
    let actor = actor_from_headers(&headers).ok_or_else(|| {
        ServiceError::InvalidInput("X-Actor-Id header is required for manual confirmation".into())
    })?;
    let record = state.services.sales.confirm_sale(id, actor).await?;
    Ok(Json(ApiResponse::success(record)))
}

pub async fn list_sales(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<SalesListResponse> {
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, 100);
    let (sales, total) = state.services.sales.list_sales(page, limit).await?;
    Ok(Json(ApiResponse::success(SalesListResponse {
        sales,
        total,
        page,
        per_page: limit,
    })))
}
