pub mod collaboration;
pub mod health;

use axum::routing::any;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                          WebSocket session channel
/// /collaboration/...           locks, presence, edit requests, stats
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", any(ws::ws_handler))
        .nest("/collaboration", collaboration::router())
}
