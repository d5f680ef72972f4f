//! Periodic maintenance sweep.
//!
//! The core enforces expiry lazily; this task owns the cadence that bounds
//! how stale an unread table entry can get. Each tick runs the four
//! independent sweeps (lock expiry, presence inactivity, request expiry,
//! request retention) and publishes events for whatever was swept so clients
//! learn about expirations they would otherwise only discover on their next
//! read.

use std::sync::Arc;
use std::time::Duration;

use flowguard_core::coordinator::Coordinator;
use flowguard_events::{CollabEvent, EventBus};

/// Spawn the maintenance task. The returned handle can be used to abort it
/// during shutdown.
pub fn start_maintenance(
    coordinator: Arc<Coordinator>,
    event_bus: Arc<EventBus>,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

        loop {
            interval.tick().await;
            let report = coordinator.run_maintenance().await;

            if report.is_empty() {
                tracing::debug!("Maintenance sweep: nothing to do");
                continue;
            }
            tracing::info!(
                expired_locks = report.expired_locks.len(),
                inactive_users = report.inactive_users.len(),
                expired_requests = report.expired_requests.len(),
                pruned_requests = report.pruned_requests,
                "Maintenance sweep"
            );

            for (workflow_id, user_id) in report.expired_locks {
                event_bus.publish(
                    CollabEvent::new("lock.expired")
                        .with_workflow(workflow_id)
                        .with_actor(user_id),
                );
            }
            for user_id in report.inactive_users {
                event_bus.publish(CollabEvent::new("presence.inactive").with_actor(user_id));
            }
            for request_id in report.expired_requests {
                event_bus.publish(
                    CollabEvent::new("request.expired")
                        .with_payload(serde_json::json!({ "request_id": request_id })),
                );
            }
            // Retention pruning is internal bookkeeping; no event.
        }
    })
}
