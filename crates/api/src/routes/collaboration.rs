//! Route definitions for workflow lock coordination.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{locks, presence, requests, stats};
use crate::state::AppState;

/// Collaboration routes mounted at `/collaboration`.
///
/// ```text
/// POST /locks/request                          -> request_lock
/// POST /locks/release                          -> release_lock
/// GET  /locks                                  -> get_all_locks
/// GET  /locks/{workflow_id}                    -> get_workflow_lock
///
/// GET  /users                                  -> get_all_users
/// GET  /users/{user_id}                        -> get_user
/// GET  /users/{user_id}/locks                  -> get_user_locks
/// GET  /users/{user_id}/requests/incoming      -> get_requests_for_user
/// GET  /users/{user_id}/requests/outgoing      -> get_requests_by_user
///
/// POST /requests                               -> create_request
/// POST /requests/{id}/respond                  -> respond_to_request
/// POST /requests/{id}/cancel                   -> cancel_request
/// GET  /requests/{id}                          -> get_request
///
/// GET  /workflows/{workflow_id}/users          -> get_workflow_users
/// GET  /workflows/{workflow_id}/requests       -> get_workflow_requests
///
/// GET  /stats                                  -> get_stats
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/locks/request", post(locks::request_lock))
        .route("/locks/release", post(locks::release_lock))
        .route("/locks", get(locks::get_all_locks))
        .route("/locks/{workflow_id}", get(locks::get_workflow_lock))
        .route("/users", get(presence::get_all_users))
        .route("/users/{user_id}", get(presence::get_user))
        .route("/users/{user_id}/locks", get(locks::get_user_locks))
        .route(
            "/users/{user_id}/requests/incoming",
            get(requests::get_requests_for_user),
        )
        .route(
            "/users/{user_id}/requests/outgoing",
            get(requests::get_requests_by_user),
        )
        .route("/requests", post(requests::create_request))
        .route("/requests/{id}/respond", post(requests::respond_to_request))
        .route("/requests/{id}/cancel", post(requests::cancel_request))
        .route("/requests/{id}", get(requests::get_request))
        .route(
            "/workflows/{workflow_id}/users",
            get(presence::get_workflow_users),
        )
        .route(
            "/workflows/{workflow_id}/requests",
            get(requests::get_workflow_requests),
        )
        .route("/stats", get(stats::get_stats))
}
