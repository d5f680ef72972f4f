//! Handlers for exclusive workflow locks: request, release, and queries.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use flowguard_core::locks::GrantReason;
use flowguard_events::CollabEvent;

use crate::error::{require_id, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body for `POST /locks/request`.
#[derive(Debug, Deserialize)]
pub struct RequestLockBody {
    pub workflow_id: String,
    pub user_id: String,
    #[serde(default)]
    pub force: bool,
}

/// Body for `POST /locks/release`.
#[derive(Debug, Deserialize)]
pub struct ReleaseLockBody {
    pub workflow_id: String,
    pub user_id: String,
}

/// POST /api/v1/collaboration/locks/request
///
/// Request (or refresh, or forcibly take over) the exclusive lock on a
/// workflow. Returns 409 with the holder's lock info when the workflow is
/// locked by another user and `force` is not set.
pub async fn request_lock(
    State(state): State<AppState>,
    Json(input): Json<RequestLockBody>,
) -> AppResult<impl IntoResponse> {
    require_id("workflow_id", &input.workflow_id)?;
    require_id("user_id", &input.user_id)?;

    let grant = state
        .coordinator
        .request_lock(&input.workflow_id, &input.user_id, input.force)
        .await?;

    let event_type = match grant.reason {
        GrantReason::Acquired => "lock.acquired",
        GrantReason::Refreshed => "lock.refreshed",
        GrantReason::Takeover => "lock.takeover",
    };
    tracing::info!(
        user_id = %input.user_id,
        workflow_id = %input.workflow_id,
        reason = event_type,
        "Lock granted"
    );
    state.event_bus.publish(
        CollabEvent::new(event_type)
            .with_workflow(input.workflow_id)
            .with_actor(input.user_id)
            .with_payload(serde_json::json!({
                "expires_at": grant.lock.expires_at,
            })),
    );

    Ok(Json(DataResponse { data: grant }))
}

/// POST /api/v1/collaboration/locks/release
///
/// Release a held lock. Only the lock holder can release.
pub async fn release_lock(
    State(state): State<AppState>,
    Json(input): Json<ReleaseLockBody>,
) -> AppResult<impl IntoResponse> {
    require_id("workflow_id", &input.workflow_id)?;
    require_id("user_id", &input.user_id)?;

    let released = state
        .coordinator
        .release_lock(&input.workflow_id, &input.user_id)
        .await?;

    tracing::info!(
        user_id = %input.user_id,
        workflow_id = %input.workflow_id,
        "Lock released"
    );
    state.event_bus.publish(
        CollabEvent::new("lock.released")
            .with_workflow(input.workflow_id)
            .with_actor(input.user_id)
            .with_payload(serde_json::json!({ "reason": "released" })),
    );

    Ok(Json(DataResponse { data: released }))
}

/// GET /api/v1/collaboration/locks
///
/// All live locks. Expired entries are purged as a side effect.
pub async fn get_all_locks(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let locks = state.coordinator.get_all_locks().await;
    Ok(Json(DataResponse { data: locks }))
}

/// GET /api/v1/collaboration/locks/{workflow_id}
///
/// The live lock on a workflow, or null.
pub async fn get_workflow_lock(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    require_id("workflow_id", &workflow_id)?;

    let lock = state.coordinator.get_workflow_lock(&workflow_id).await;
    Ok(Json(DataResponse { data: lock }))
}

/// GET /api/v1/collaboration/users/{user_id}/locks
///
/// All live locks held by one user.
pub async fn get_user_locks(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    require_id("user_id", &user_id)?;

    let locks = state.coordinator.get_user_locks(&user_id).await;
    Ok(Json(DataResponse { data: locks }))
}
