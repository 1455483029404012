use axum::extract::{Path, Query, State};
use axum::response::Json as ResponseJson;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use sparkq_db::models::Session;
use sparkq_utils::response::ApiResponse;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions).post(create_session))
        .route(
            "/sessions/{id}",
            get(get_session).patch(update_session).delete(delete_session),
        )
        .route("/sessions/{id}/end", post(end_session))
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSessionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

pub async fn create_session(
    State(state): State<AppState>,
    ResponseJson(body): ResponseJson<CreateSessionRequest>,
) -> Result<ResponseJson<ApiResponse<Session>>, ApiError> {
    let session = state
        .queue_manager
        .create_session(&state.project.id, &body.name, body.description.as_deref())
        .await?;
    Ok(ResponseJson(ApiResponse::success(session)))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Session>>>, ApiError> {
    let sessions = state
        .queue_manager
        .list_sessions(&state.project.id, query.limit.unwrap_or(100), query.offset.unwrap_or(0))
        .await?;
    Ok(ResponseJson(ApiResponse::success(sessions)))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ResponseJson<ApiResponse<Session>>, ApiError> {
    let session = state.queue_manager.get_session(&id).await?;
    Ok(ResponseJson(ApiResponse::success(session)))
}

pub async fn update_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ResponseJson(body): ResponseJson<UpdateSessionRequest>,
) -> Result<ResponseJson<ApiResponse<Session>>, ApiError> {
    let session = state
        .queue_manager
        .update_session(&id, body.name.as_deref(), body.description.as_deref())
        .await?;
    Ok(ResponseJson(ApiResponse::success(session)))
}

pub async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ResponseJson<ApiResponse<Session>>, ApiError> {
    let session = state.queue_manager.end_session(&id).await?;
    Ok(ResponseJson(ApiResponse::success(session)))
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ResponseJson<ApiResponse<DeleteResponse>>, ApiError> {
    state.queue_manager.delete_session(&id).await?;
    Ok(ResponseJson(ApiResponse::success(DeleteResponse { deleted: true })))
}
