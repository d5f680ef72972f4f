use crate::locks::WorkflowLock;

/// Domain errors for the coordination core.
///
/// Every variant maps to a stable symbolic code via [`CoreError::code`] so
/// the API layer can translate failures without string-matching messages.
/// No core operation panics across the crate boundary.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CoreError {
    /// The workflow is locked by another user and `force` was not requested.
    /// Carries the holder's lock so callers can report who owns it.
    #[error("Workflow {} is locked by user {} until {}", holder.workflow_id, holder.user_id, holder.expires_at)]
    WorkflowLocked { holder: WorkflowLock },

    /// A release was attempted on a workflow with no live lock.
    #[error("No live lock exists for this workflow")]
    NoLock,

    /// The caller is not allowed to perform this operation.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// An operation referenced an unknown id.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An operation was attempted on a request already past `pending`.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A required field was missing or malformed.
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl CoreError {
    /// Stable symbolic error kind surfaced to adapters.
    pub fn code(&self) -> &'static str {
        match self {
            Self::WorkflowLocked { .. } => "WORKFLOW_LOCKED",
            Self::NoLock => "NO_LOCK",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::Validation(_) => "VALIDATION",
        }
    }
}
