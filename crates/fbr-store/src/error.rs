use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic-concurrency or serialization failure. Retryable.
    #[error("transaction conflict")]
    Conflict,

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Backend detail. Log it; do not show it to operators verbatim.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict)
    }
}
