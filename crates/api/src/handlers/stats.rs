//! Combined stats endpoint.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use flowguard_core::coordinator::StatsSnapshot;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Stats payload: coordination tables plus the socket registry.
#[derive(Debug, Serialize)]
pub struct ServiceStats {
    #[serde(flatten)]
    pub coordination: StatsSnapshot,
    pub ws_connections: usize,
}

/// GET /api/v1/collaboration/stats
///
/// Point-in-time counters across all tables. Reading purges expired locks,
/// so polling this endpoint also bounds the lock table's size.
pub async fn get_stats(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let coordination = state.coordinator.stats_snapshot().await;
    let ws_connections = state.ws_manager.connection_count().await;
    Ok(Json(DataResponse {
        data: ServiceStats {
            coordination,
            ws_connections,
        },
    }))
}
