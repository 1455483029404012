use sparkq_db::StoreError;
use thiserror::Error;

/// The four-kind error taxonomy at the core/adapter boundary (spec §7).
///
/// Every component error (`StoreError`, and the few validation/conflict
/// cases components raise directly) folds into this single enum so
/// adapters have one thing to map to a transport representation.
#[derive(Debug, Error)]
pub enum SparkQError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SparkQError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// A short machine-readable tag, matching the shape an adapter's JSON
    /// error body exposes alongside the human-readable message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for SparkQError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(msg) => Self::Validation(msg),
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::Database(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<sqlx::Error> for SparkQError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<std::io::Error> for SparkQError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<toml::de::Error> for SparkQError {
    fn from(err: toml::de::Error) -> Self {
        Self::Internal(format!("invalid config file: {err}"))
    }
}

impl From<serde_json::Error> for SparkQError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("invalid JSON: {err}"))
    }
}
