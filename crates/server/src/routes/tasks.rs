use axum::Router;
use axum::extract::{Path, Query, State};
use axum::response::Json as ResponseJson;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use sparkq_core::{ClaimResult, QuickAdd};
use sparkq_db::models::{Task, TaskListFilter, TaskStatus};
use sparkq_utils::response::ApiResponse;

use crate::error::ApiError;
use crate::routes::sessions::DeleteResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/{id}", get(get_task).patch(update_task).delete(delete_task))
        .route("/tasks/claim", post(claim_task))
        .route("/tasks/{id}/complete", post(complete_task))
        .route("/tasks/{id}/fail", post(fail_task))
        .route("/tasks/{id}/requeue", post(requeue_task))
        .route("/tasks/quick-add", post(quick_add_task))
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub queue_id: String,
    pub tool_name: String,
    pub task_class: String,
    pub timeout: Option<i64>,
    pub payload: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub tool_name: Option<String>,
    pub task_class: Option<String>,
    pub payload: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub queue_id: Option<String>,
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub queue_id: String,
    pub worker_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub result_summary: String,
    pub result: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FailRequest {
    pub error_message: String,
    pub error_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum QuickAddRequest {
    Llm { queue_id: String, prompt: String, tool_name: String },
    Script { queue_id: String, script_path: String, #[serde(default)] script_args: Vec<String> },
}

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub task: Option<Task>,
    pub worker_id: Option<String>,
}

impl From<Option<ClaimResult>> for ClaimResponse {
    fn from(result: Option<ClaimResult>) -> Self {
        match result {
            Some(r) => Self {
                task: Some(r.task),
                worker_id: r.worker_id,
            },
            None => Self {
                task: None,
                worker_id: None,
            },
        }
    }
}

pub async fn create_task(
    State(state): State<AppState>,
    ResponseJson(body): ResponseJson<CreateTaskRequest>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = state
        .lifecycle
        .enqueue(
            &body.queue_id,
            &body.tool_name,
            &body.task_class,
            body.timeout,
            body.payload.as_deref(),
        )
        .await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let filter = TaskListFilter {
        queue_id: query.queue_id.as_deref(),
        status: query.status,
    };
    let tasks = Task::list(&state.pool, filter, query.limit.unwrap_or(100), query.offset.unwrap_or(0)).await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = Task::find_by_id(&state.pool, &id)
        .await?
        .ok_or_else(|| sparkq_core::SparkQError::not_found("task", id))?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ResponseJson(body): ResponseJson<UpdateTaskRequest>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = Task::update(
        &state.pool,
        &id,
        body.tool_name.as_deref(),
        body.task_class.as_deref(),
        body.payload.as_deref(),
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ResponseJson<ApiResponse<DeleteResponse>>, ApiError> {
    Task::delete(&state.pool, &id).await?;
    Ok(ResponseJson(ApiResponse::success(DeleteResponse { deleted: true })))
}

pub async fn claim_task(
    State(state): State<AppState>,
    ResponseJson(body): ResponseJson<ClaimRequest>,
) -> Result<ResponseJson<ApiResponse<ClaimResponse>>, ApiError> {
    let result = state.lifecycle.claim(&body.queue_id, body.worker_id.as_deref()).await?;
    Ok(ResponseJson(ApiResponse::success(ClaimResponse::from(result))))
}

pub async fn complete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ResponseJson(body): ResponseJson<CompleteRequest>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = state
        .lifecycle
        .complete(&id, &body.result_summary, body.result.as_deref())
        .await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn fail_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ResponseJson(body): ResponseJson<FailRequest>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = state.lifecycle.fail(&id, &body.error_message, body.error_type.as_deref()).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn requeue_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = state.lifecycle.requeue(&id).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn quick_add_task(
    State(state): State<AppState>,
    ResponseJson(body): ResponseJson<QuickAddRequest>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let (queue_id, quick) = match body {
        QuickAddRequest::Llm { queue_id, prompt, tool_name } => (queue_id, QuickAdd::Llm { prompt, tool_name }),
        QuickAddRequest::Script { queue_id, script_path, script_args } => {
            (queue_id, QuickAdd::Script { script_path, script_args })
        }
    };
    let task = state.lifecycle.quick_add(&queue_id, quick).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}
