//! Event-to-WebSocket routing.
//!
//! [`NotificationRouter`] subscribes to the event bus and forwards each
//! [`CollabEvent`] to clients: targeted events go only to the named user's
//! connections, everything else is broadcast to all.

use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::broadcast;

use flowguard_events::CollabEvent;

use crate::ws::WsManager;

/// Routes coordination events to WebSocket clients.
pub struct NotificationRouter {
    ws_manager: Arc<WsManager>,
}

impl NotificationRouter {
    /// Create a new router over the given connection manager.
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run the main routing loop.
    ///
    /// Subscribes to the event bus via `receiver` and processes each event.
    /// The loop exits when the channel is closed (i.e. the
    /// [`EventBus`](flowguard_events::EventBus) is dropped).
    pub async fn run(self, mut receiver: broadcast::Receiver<CollabEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => self.route_event(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification router lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification router shutting down");
                    break;
                }
            }
        }
    }

    /// Deliver a single event.
    async fn route_event(&self, event: &CollabEvent) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, event_type = %event.event_type, "Failed to serialize event");
                return;
            }
        };
        let message = Message::Text(json.into());

        match &event.target_user_id {
            Some(user_id) => {
                let delivered = self.ws_manager.send_to_user(user_id, message).await;
                tracing::debug!(
                    event_type = %event.event_type,
                    target_user_id = %user_id,
                    delivered,
                    "Routed targeted event"
                );
            }
            None => {
                self.ws_manager.broadcast(message).await;
                tracing::trace!(event_type = %event.event_type, "Broadcast event");
            }
        }
    }
}
