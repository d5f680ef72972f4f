use std::sync::Arc;

use flowguard_core::coordinator::Coordinator;
use flowguard_events::EventBus;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// The coordination core: locks, presence, edit requests.
    pub coordinator: Arc<Coordinator>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager.
    pub ws_manager: Arc<WsManager>,
    /// Event bus for publishing coordination events.
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// Assemble state from its parts.
    pub fn new(
        coordinator: Arc<Coordinator>,
        config: Arc<ServerConfig>,
        ws_manager: Arc<WsManager>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            coordinator,
            config,
            ws_manager,
            event_bus,
        }
    }
}
