//! Handlers for edit requests: create, respond, cancel, and queries.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use flowguard_core::error::CoreError;
use flowguard_events::CollabEvent;

use crate::error::{require_id, AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Longest accepted request/response message.
const MAX_MESSAGE_LEN: usize = 1_000;

/// Body for `POST /requests`.
#[derive(Debug, Deserialize)]
pub struct CreateRequestBody {
    pub workflow_id: String,
    pub requester_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body for `POST /requests/{id}/respond`.
#[derive(Debug, Deserialize)]
pub struct RespondBody {
    pub responder_id: String,
    pub approved: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body for `POST /requests/{id}/cancel`.
#[derive(Debug, Deserialize)]
pub struct CancelBody {
    pub user_id: String,
}

fn check_message(message: &Option<String>) -> Result<(), AppError> {
    if let Some(message) = message {
        if message.len() > MAX_MESSAGE_LEN {
            return Err(AppError::Core(CoreError::Validation(format!(
                "message must be at most {MAX_MESSAGE_LEN} characters"
            ))));
        }
    }
    Ok(())
}

/// POST /api/v1/collaboration/requests
///
/// Ask the current lock holder of a workflow to yield. The target is derived
/// from the live lock; 404 NO_LOCK when the workflow is unheld.
pub async fn create_request(
    State(state): State<AppState>,
    Json(input): Json<CreateRequestBody>,
) -> AppResult<impl IntoResponse> {
    require_id("workflow_id", &input.workflow_id)?;
    require_id("requester_id", &input.requester_id)?;
    check_message(&input.message)?;

    let request = state
        .coordinator
        .create_edit_request(&input.workflow_id, &input.requester_id, input.message)
        .await?;

    tracing::info!(
        request_id = %request.id,
        requester_id = %request.requester_id,
        target_user_id = %request.target_user_id,
        workflow_id = %request.workflow_id,
        "Edit request created"
    );
    state.event_bus.publish(
        CollabEvent::new("request.created")
            .with_workflow(request.workflow_id.clone())
            .with_actor(request.requester_id.clone())
            .with_target(request.target_user_id.clone())
            .with_payload(serde_json::json!({
                "request_id": request.id,
                "message": request.message,
                "expires_at": request.expires_at,
            })),
    );

    Ok(Json(DataResponse { data: request }))
}

/// POST /api/v1/collaboration/requests/{id}/respond
///
/// Approve or deny a pending edit request. Only the targeted holder may
/// respond; approval releases their lock as a follow-on effect.
pub async fn respond_to_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    Json(input): Json<RespondBody>,
) -> AppResult<impl IntoResponse> {
    require_id("responder_id", &input.responder_id)?;
    check_message(&input.message)?;

    let outcome = state
        .coordinator
        .respond_to_request(&request_id, &input.responder_id, input.approved, input.message)
        .await?;

    tracing::info!(
        request_id = %request_id,
        responder_id = %input.responder_id,
        approved = input.approved,
        "Edit request answered"
    );
    state.event_bus.publish(
        CollabEvent::new("request.responded")
            .with_workflow(outcome.request.workflow_id.clone())
            .with_actor(input.responder_id.clone())
            .with_target(outcome.request.requester_id.clone())
            .with_payload(serde_json::json!({
                "request_id": outcome.request.id,
                "approved": input.approved,
                "response_message": outcome.request.response_message,
            })),
    );
    if let Some(released) = &outcome.released_lock {
        state.event_bus.publish(
            CollabEvent::new("lock.released")
                .with_workflow(released.workflow_id.clone())
                .with_actor(released.user_id.clone())
                .with_payload(serde_json::json!({ "reason": "request_approved" })),
        );
    }

    Ok(Json(DataResponse { data: outcome }))
}

/// POST /api/v1/collaboration/requests/{id}/cancel
///
/// Withdraw a pending edit request. Only the original requester may cancel.
pub async fn cancel_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    Json(input): Json<CancelBody>,
) -> AppResult<impl IntoResponse> {
    require_id("user_id", &input.user_id)?;

    let cancelled = state
        .coordinator
        .cancel_request(&request_id, &input.user_id)
        .await?;

    if cancelled {
        tracing::info!(request_id = %request_id, user_id = %input.user_id, "Edit request cancelled");
        // The target no longer needs to answer; tell them it is gone.
        let target = state
            .coordinator
            .get_request(&request_id)
            .await
            .map(|request| request.target_user_id);
        let mut event = CollabEvent::new("request.cancelled")
            .with_actor(input.user_id)
            .with_payload(serde_json::json!({ "request_id": request_id }));
        if let Some(target) = target {
            event = event.with_target(target);
        }
        state.event_bus.publish(event);
    }

    Ok(Json(DataResponse {
        data: serde_json::json!({ "cancelled": cancelled }),
    }))
}

/// GET /api/v1/collaboration/requests/{id}
///
/// One request in whatever state it is in, or 404.
pub async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let request = state
        .coordinator
        .get_request(&request_id)
        .await
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Edit request",
            id: request_id,
        }))?;
    Ok(Json(DataResponse { data: request }))
}

/// GET /api/v1/collaboration/users/{user_id}/requests/incoming
///
/// Requests asking this user to yield, newest first.
pub async fn get_requests_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    require_id("user_id", &user_id)?;

    let requests = state.coordinator.get_requests_for_user(&user_id).await;
    Ok(Json(DataResponse { data: requests }))
}

/// GET /api/v1/collaboration/users/{user_id}/requests/outgoing
///
/// Requests this user created, newest first.
pub async fn get_requests_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    require_id("user_id", &user_id)?;

    let requests = state.coordinator.get_requests_by_user(&user_id).await;
    Ok(Json(DataResponse { data: requests }))
}

/// GET /api/v1/collaboration/workflows/{workflow_id}/requests
///
/// Requests concerning a workflow, newest first.
pub async fn get_workflow_requests(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    require_id("workflow_id", &workflow_id)?;

    let requests = state.coordinator.get_workflow_requests(&workflow_id).await;
    Ok(Json(DataResponse { data: requests }))
}
