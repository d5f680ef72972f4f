//! WebSocket heartbeat.

use std::sync::Arc;
use std::time::Duration;

use crate::ws::WsManager;

/// Spawn a background task that periodically pings all connected WebSocket
/// clients and prunes connections whose channels have closed.
///
/// The returned `JoinHandle` can be used to abort the task during shutdown.
pub fn start_heartbeat(
    ws_manager: Arc<WsManager>,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

        loop {
            interval.tick().await;
            let pruned = ws_manager.prune_closed().await;
            if pruned > 0 {
                tracing::debug!(pruned, "Pruned dead WebSocket connections");
            }
            let count = ws_manager.connection_count().await;
            tracing::debug!(count, "WebSocket heartbeat ping");
            ws_manager.ping_all().await;
        }
    })
}
