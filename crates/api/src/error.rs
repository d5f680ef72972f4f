use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use flowguard_core::error::CoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses
/// of the shape `{ "error": <message>, "code": <symbolic kind> }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `flowguard-core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            AppError::Core(core) => {
                let status = match core {
                    CoreError::WorkflowLocked { .. } => StatusCode::CONFLICT,
                    CoreError::NoLock | CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                    CoreError::Unauthorized(_) => StatusCode::FORBIDDEN,
                    CoreError::InvalidState(_) => StatusCode::CONFLICT,
                    CoreError::Validation(_) => StatusCode::BAD_REQUEST,
                };
                // Conflicts carry the holder's lock so the client can show
                // who owns it and until when.
                let details = match core {
                    CoreError::WorkflowLocked { holder } => serde_json::to_value(holder).ok(),
                    _ => None,
                };
                (status, core.code(), core.to_string(), details)
            }

            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None)
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let (Some(details), Some(obj)) = (details, body.as_object_mut()) {
            obj.insert("details".to_string(), details);
        }

        (status, axum::Json(body)).into_response()
    }
}

/// Reject empty or overlong id fields before they reach the core.
///
/// The core tolerates arbitrary strings; this is purely hygiene at the
/// transport boundary, reported as a `VALIDATION` kind.
pub fn require_id(field: &'static str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(format!(
            "{field} must not be empty"
        ))));
    }
    if value.len() > 256 {
        return Err(AppError::Core(CoreError::Validation(format!(
            "{field} must be at most 256 characters"
        ))));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_id_rejects_blank_and_overlong() {
        assert!(require_id("workflow_id", "wf-1").is_ok());
        assert!(require_id("workflow_id", "  ").is_err());
        assert!(require_id("user_id", &"x".repeat(300)).is_err());
    }
}
