//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`CollabEvent`]s.
//! It is designed to be shared via `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use flowguard_core::types::{UserId, WorkflowId};

// ---------------------------------------------------------------------------
// CollabEvent
// ---------------------------------------------------------------------------

/// A coordination event.
///
/// Constructed via [`CollabEvent::new`] and enriched with the builder
/// methods [`with_workflow`](CollabEvent::with_workflow),
/// [`with_actor`](CollabEvent::with_actor),
/// [`with_target`](CollabEvent::with_target), and
/// [`with_payload`](CollabEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollabEvent {
    /// Dot-separated event name, e.g. `"lock.acquired"`.
    pub event_type: String,

    /// Workflow the event concerns, if any.
    pub workflow_id: Option<WorkflowId>,

    /// User whose action produced the event.
    pub actor_user_id: Option<UserId>,

    /// When set, the event is delivered only to this user's connections
    /// instead of being broadcast.
    pub target_user_id: Option<UserId>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl CollabEvent {
    /// Create a new event with only the required `event_type`.
    ///
    /// All optional fields default to `None` / empty object.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            workflow_id: None,
            actor_user_id: None,
            target_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Attach the workflow the event concerns.
    pub fn with_workflow(mut self, workflow_id: impl Into<WorkflowId>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    /// Attach the acting user.
    pub fn with_actor(mut self, user_id: impl Into<UserId>) -> Self {
        self.actor_user_id = Some(user_id.into());
        self
    }

    /// Restrict delivery to a single user instead of broadcasting.
    pub fn with_target(mut self, user_id: impl Into<UserId>) -> Self {
        self.target_user_id = Some(user_id.into());
        self
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`CollabEvent`].
pub struct EventBus {
    sender: broadcast::Sender<CollabEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: CollabEvent) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<CollabEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let event = CollabEvent::new("lock.acquired")
            .with_workflow("wf-1")
            .with_actor("alice")
            .with_payload(serde_json::json!({"reason": "acquired"}));

        bus.publish(event);

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, "lock.acquired");
        assert_eq!(received.workflow_id.as_deref(), Some("wf-1"));
        assert_eq!(received.actor_user_id.as_deref(), Some("alice"));
        assert!(received.target_user_id.is_none());
        assert_eq!(received.payload["reason"], "acquired");
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(CollabEvent::new("request.created").with_target("alice"));

        assert_eq!(rx1.recv().await.unwrap().event_type, "request.created");
        assert_eq!(
            rx2.recv().await.unwrap().target_user_id.as_deref(),
            Some("alice")
        );
    }

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let bus = EventBus::default();
        bus.publish(CollabEvent::new("lock.released"));
    }
}
