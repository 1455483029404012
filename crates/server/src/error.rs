use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sparkq_core::SparkQError;
use sparkq_utils::response::ApiResponse;

/// Transport-facing wrapper around [`SparkQError`]. Maps the core's
/// four-kind taxonomy (spec §7) onto an HTTP status code and a structured
/// JSON body; the core itself never touches a status code.
#[derive(Debug)]
pub struct ApiError(pub SparkQError);

impl From<SparkQError> for ApiError {
    fn from(err: SparkQError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SparkQError::Validation(_) => StatusCode::BAD_REQUEST,
            SparkQError::NotFound { .. } => StatusCode::NOT_FOUND,
            SparkQError::Conflict(_) => StatusCode::CONFLICT,
            SparkQError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if matches!(self.0, SparkQError::Internal(_)) {
            tracing::error!(error = %self.0, "internal error");
        }

        (status, Json(ApiResponse::<()>::error(self.0.to_string()))).into_response()
    }
}
