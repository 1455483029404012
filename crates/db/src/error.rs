use thiserror::Error;

/// Store-level failures (§4.1 Failure modes).
///
/// Higher layers (`sparkq-core`) fold this into the four-kind error
/// taxonomy from spec §7; the Store itself only distinguishes "this was a
/// constraint violation", "the row doesn't exist", "the caller asked for
/// an illegal transition", and "everything else".
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}
