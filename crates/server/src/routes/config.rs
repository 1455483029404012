use axum::Router;
use axum::extract::{Path, State};
use axum::response::Json as ResponseJson;
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::Value;
use sparkq_utils::response::ApiResponse;

use crate::error::ApiError;
use crate::routes::sessions::DeleteResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/config", get(get_config))
        .route("/config/reload", post(reload_config))
        .route("/config/validate", post(validate_config))
        .route("/config/{namespace}/{key}", get(get_entry).put(put_entry).delete(delete_entry))
}

#[derive(Debug, Deserialize)]
pub struct PutEntryRequest {
    pub value: Value,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub namespace: String,
    pub key: String,
    pub value: Value,
}

pub async fn get_config(State(state): State<AppState>) -> Result<ResponseJson<ApiResponse<Value>>, ApiError> {
    let config = state.config.get_full_config().await?;
    Ok(ResponseJson(ApiResponse::success(config)))
}

pub async fn get_entry(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> Result<ResponseJson<ApiResponse<Value>>, ApiError> {
    let full = state.config.get_full_config().await?;
    let value = full
        .get("raw_entries")
        .and_then(|entries| entries.as_array())
        .and_then(|entries| entries.iter().find(|e| e["namespace"] == namespace && e["key"] == key))
        .cloned()
        .unwrap_or(Value::Null);
    Ok(ResponseJson(ApiResponse::success(value)))
}

/// Encode a request-supplied JSON value into the raw string `ConfigRegistry`
/// stores. Scalar strings (e.g. `server.host`, feature flags) are stored
/// unquoted so the typed accessors' raw-string reads and literal `"true"`/
/// `"false"` checks round-trip; objects (`tools.all`/`task_classes.all`
/// entries) keep their JSON encoding since the projection rebuilders parse
/// it back with `serde_json::from_str`.
fn encode_entry_value(value: &Value) -> Result<String, ApiError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => serde_json::to_string(other)
            .map_err(sparkq_core::SparkQError::from)
            .map_err(ApiError::from),
    }
}

pub async fn put_entry(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
    ResponseJson(body): ResponseJson<PutEntryRequest>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let raw = encode_entry_value(&body.value)?;
    state.config.put(&namespace, &key, &raw).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> Result<ResponseJson<ApiResponse<DeleteResponse>>, ApiError> {
    state.config.delete(&namespace, &key).await?;
    Ok(ResponseJson(ApiResponse::success(DeleteResponse { deleted: true })))
}

pub async fn validate_config(
    State(state): State<AppState>,
    ResponseJson(body): ResponseJson<ValidateRequest>,
) -> Result<ResponseJson<ApiResponse<bool>>, ApiError> {
    let raw = encode_entry_value(&body.value)?;
    state.config.validate(&body.namespace, &body.key, &raw).await?;
    Ok(ResponseJson(ApiResponse::success(true)))
}

pub async fn reload_config(State(state): State<AppState>) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.config.reload().await?;
    Ok(ResponseJson(ApiResponse::success(())))
}
