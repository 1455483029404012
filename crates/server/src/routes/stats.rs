use axum::Router;
use axum::extract::State;
use axum::response::Json as ResponseJson;
use axum::routing::get;
use sparkq_core::ProjectStats;
use sparkq_utils::response::ApiResponse;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/stats", get(project_stats))
}

pub async fn project_stats(State(state): State<AppState>) -> Result<ResponseJson<ApiResponse<ProjectStats>>, ApiError> {
    let stats = state.queue_manager.project_stats().await?;
    Ok(ResponseJson(ApiResponse::success(stats)))
}
