//! Notification routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::{Channel, DeliveryRecord};
use herald_engine::NotificationRequest;
use herald_engine::stats::DeliveryStatistics;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications/message", post(send_message))
        .route("/api/notifications/bulletin", post(send_bulletin))
        .route("/api/notifications/bulk", post(send_bulk))
        .route("/api/notifications/{id}/status", get(get_status))
        .route(
            "/api/notifications/guardian/{id}/history",
            get(get_history),
        )
        .route("/api/notifications/retry-failed", post(retry_failed))
        .route("/api/notifications/cleanup", post(cleanup))
        .route("/api/notifications/statistics", get(statistics))
}

#[derive(Debug, Deserialize)]
pub struct MessageParams {
    pub guardian_id: Uuid,
    #[serde(flatten)]
    pub request: NotificationRequest,
}

#[derive(Debug, Deserialize)]
pub struct BulletinParams {
    pub guardian_id: Uuid,
    pub student_name: String,
    pub period: String,
    #[serde(default)]
    pub channel: Option<Channel>,
}

#[derive(Debug, Deserialize)]
pub struct BulkParams {
    pub guardian_ids: Vec<Uuid>,
    #[serde(flatten)]
    pub request: NotificationRequest,
}

#[derive(Debug, Deserialize)]
pub struct CleanupQuery {
    pub days_to_keep: Option<i64>,
}

/// POST /api/notifications/message: Send to one guardian.
async fn send_message(
    State(state): State<AppState>,
    Json(params): Json<MessageParams>,
) -> Result<Json<DeliveryRecord>, AppError> {
    let record = state
        .service
        .dispatch(params.guardian_id, &params.request)
        .await?;
    Ok(Json(record))
}

/// POST /api/notifications/bulletin: Announce an available bulletin.
async fn send_bulletin(
    State(state): State<AppState>,
    Json(params): Json<BulletinParams>,
) -> Result<Json<DeliveryRecord>, AppError> {
    let record = state
        .service
        .send_bulletin(
            params.guardian_id,
            &params.student_name,
            &params.period,
            params.channel,
        )
        .await?;
    Ok(Json(record))
}

/// POST /api/notifications/bulk: Send to many guardians.
async fn send_bulk(
    State(state): State<AppState>,
    Json(params): Json<BulkParams>,
) -> Result<Json<Vec<DeliveryRecord>>, AppError> {
    let records = state
        .service
        .dispatch_bulk(&params.guardian_ids, &params.request)
        .await?;
    Ok(Json(records))
}

/// GET /api/notifications/:id/status
async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryRecord>, AppError> {
    Ok(Json(state.service.get_status(id).await?))
}

/// GET /api/notifications/guardian/:id/history: Newest first.
async fn get_history(
    State(state): State<AppState>,
    Path(guardian_id): Path<Uuid>,
) -> Result<Json<Vec<DeliveryRecord>>, AppError> {
    Ok(Json(state.service.get_history(guardian_id).await?))
}

/// POST /api/notifications/retry-failed: Start a retry sweep without waiting.
async fn retry_failed(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    // The sweep keeps running after the ticket is dropped.
    let _ticket = state.service.trigger_retry_sweep_now();
    (
        StatusCode::ACCEPTED,
        Json(json!({ "status": "accepted", "job": "retry-sweep" })),
    )
}

/// POST /api/notifications/cleanup: Purge old records.
async fn cleanup(
    State(state): State<AppState>,
    Query(query): Query<CleanupQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let days_to_keep = query
        .days_to_keep
        .unwrap_or(state.service.engine().config().retention_days);
    let deleted = state.service.trigger_cleanup(days_to_keep).await?;
    Ok(Json(json!({ "deleted": deleted, "days_to_keep": days_to_keep })))
}

/// GET /api/notifications/statistics
async fn statistics(
    State(state): State<AppState>,
) -> Result<Json<DeliveryStatistics>, AppError> {
    Ok(Json(state.service.get_statistics().await?))
}
