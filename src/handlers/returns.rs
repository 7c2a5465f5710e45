use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    services::returns::{InitiateReturnRequest, ReturnProcessOutcome, ReturnResponse},
    ApiResponse, ApiResult, AppState,
};

use super::actor_from_headers;

#[derive(Debug, Deserialize)]
pub struct SchedulePickupRequest {
    pub transporter_id: Uuid,
}

pub async fn initiate_return(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<InitiateReturnRequest>,
) -> ApiResult<ReturnResponse> {
    let actor = actor_from_headers(&headers);
    let created = state.services.returns.initiate_return(payload, actor).await?;
    Ok(Json(ApiResponse::success(created)))
}

pub async fn get_return(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ReturnResponse> {
    match state.services.returns.get_return(id).await? {
        Some(ret) => Ok(Json(ApiResponse::success(ret))),
        None => Err(ServiceError::NotFound(format!("Return {} not found", id))),
    }
}

pub async fn schedule_pickup(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SchedulePickupRequest>,
) -> ApiResult<ReturnResponse> {
    let updated = state
        .services
        .returns
        .schedule_pickup(id, payload.transporter_id)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn mark_picked_up(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ReturnResponse> {
    let updated = state.services.returns.mark_picked_up(id).await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn mark_received(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ReturnResponse> {
    let updated = state.services.returns.mark_received(id).await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn process_return(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> ApiResult<ReturnProcessOutcome> {
    let actor = actor_from_headers(&headers);
    let outcome = state.services.returns.process_return(id, actor).await?;
    Ok(Json(ApiResponse::success(outcome)))
}
