use fbr_schemas::SessionStatus;
use thiserror::Error;
use uuid::Uuid;

/// Caller-visible failures of the session state machine and reconciliation.
///
/// Messages name the violated field or condition and never carry raw
/// storage-backend detail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DistributionError {
    #[error("invalid input: {field} {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("invalid range: {field}={value} must be within [{min}, {max}]")]
    InvalidRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("invalid state: cannot {operation} session {session_id} in status {status}")]
    InvalidState {
        session_id: Uuid,
        status: SessionStatus,
        operation: &'static str,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("recipe {recipe_id} already has an active session {session_id}")]
    ActiveSessionExists { recipe_id: String, session_id: Uuid },

    #[error("reconciliation failed after {attempts} attempt(s); no changes were committed")]
    ReconciliationFailed { attempts: u32 },

    #[error("storage unavailable during {operation}")]
    Storage { operation: &'static str },
}

impl DistributionError {
    pub fn invalid_input(field: &'static str, reason: impl Into<String>) -> Self {
        DistributionError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}
