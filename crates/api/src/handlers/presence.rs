//! Handlers for presence queries.
//!
//! Sessions are created and torn down by the WebSocket layer; HTTP only
//! reads them.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::{require_id, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/collaboration/users
///
/// All active sessions, most recently active first.
pub async fn get_all_users(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let users = state.coordinator.get_all_users().await;
    Ok(Json(DataResponse { data: users }))
}

/// GET /api/v1/collaboration/users/{user_id}
///
/// The stored session for a user, active or not, or null.
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    require_id("user_id", &user_id)?;

    let user = state.coordinator.get_user(&user_id).await;
    Ok(Json(DataResponse { data: user }))
}

/// GET /api/v1/collaboration/workflows/{workflow_id}/users
///
/// Active sessions currently viewing a workflow.
pub async fn get_workflow_users(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    require_id("workflow_id", &workflow_id)?;

    let users = state.coordinator.get_workflow_users(&workflow_id).await;
    Ok(Json(DataResponse { data: users }))
}
