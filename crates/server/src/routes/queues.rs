use axum::Router;
use axum::extract::{Path, Query, State};
use axum::response::Json as ResponseJson;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use sparkq_db::models::{Queue, QueueStats};
use sparkq_utils::response::ApiResponse;

use crate::error::ApiError;
use crate::routes::sessions::DeleteResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/queues", get(list_queues).post(create_queue))
        .route("/queues/{id}", get(get_queue).patch(update_queue).delete(delete_queue))
        .route("/queues/{id}/end", post(end_queue))
        .route("/queues/{id}/archive", post(archive_queue))
        .route("/queues/{id}/unarchive", post(unarchive_queue))
}

#[derive(Debug, Deserialize)]
pub struct CreateQueueRequest {
    pub session_id: String,
    pub name: String,
    pub instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQueueRequest {
    pub name: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub session_id: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct QueueWithStats {
    #[serde(flatten)]
    pub queue: Queue,
    pub stats: QueueStats,
}

pub async fn create_queue(
    State(state): State<AppState>,
    ResponseJson(body): ResponseJson<CreateQueueRequest>,
) -> Result<ResponseJson<ApiResponse<Queue>>, ApiError> {
    let queue = state
        .queue_manager
        .create_queue(&body.session_id, &body.name, body.instructions.as_deref())
        .await?;
    Ok(ResponseJson(ApiResponse::success(queue)))
}

pub async fn list_queues(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<QueueWithStats>>>, ApiError> {
    let queues = state
        .queue_manager
        .list_queues(query.session_id.as_deref(), query.limit.unwrap_or(100), query.offset.unwrap_or(0))
        .await?;
    let result = queues
        .into_iter()
        .map(|(queue, stats)| QueueWithStats { queue, stats })
        .collect();
    Ok(ResponseJson(ApiResponse::success(result)))
}

pub async fn get_queue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ResponseJson<ApiResponse<QueueWithStats>>, ApiError> {
    let queue = state.queue_manager.get_queue(&id).await?;
    let stats = state.queue_manager.queue_stats(&id).await?;
    Ok(ResponseJson(ApiResponse::success(QueueWithStats { queue, stats })))
}

pub async fn update_queue(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ResponseJson(body): ResponseJson<UpdateQueueRequest>,
) -> Result<ResponseJson<ApiResponse<Queue>>, ApiError> {
    let queue = state
        .queue_manager
        .update_queue(&id, body.name.as_deref(), body.instructions.as_deref())
        .await?;
    Ok(ResponseJson(ApiResponse::success(queue)))
}

pub async fn end_queue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ResponseJson<ApiResponse<Queue>>, ApiError> {
    let queue = state.queue_manager.end_queue(&id).await?;
    Ok(ResponseJson(ApiResponse::success(queue)))
}

pub async fn archive_queue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ResponseJson<ApiResponse<Queue>>, ApiError> {
    let queue = state.queue_manager.archive_queue(&id).await?;
    Ok(ResponseJson(ApiResponse::success(queue)))
}

pub async fn unarchive_queue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ResponseJson<ApiResponse<Queue>>, ApiError> {
    let queue = state.queue_manager.unarchive_queue(&id).await?;
    Ok(ResponseJson(ApiResponse::success(queue)))
}

pub async fn delete_queue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ResponseJson<ApiResponse<DeleteResponse>>, ApiError> {
    state.queue_manager.delete_queue(&id).await?;
    Ok(ResponseJson(ApiResponse::success(DeleteResponse { deleted: true })))
}
