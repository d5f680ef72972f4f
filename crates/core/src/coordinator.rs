//! Cross-table sequencing.
//!
//! The [`Coordinator`] owns one [`LockTable`], one [`PresenceTable`] and one
//! [`RequestLedger`] behind a single coarse mutex, held for the duration of
//! each logical operation. Check-then-act sequences (conflict checks, the
//! approve → release cascade, the disconnect cascade) therefore never
//! interleave, even on a multithreaded runtime.
//!
//! The ledger never calls into the lock table; the coordinator observes the
//! ledger's transition result and issues the follow-on lock call itself.

use tokio::sync::Mutex;

use serde::Serialize;

use crate::error::CoreError;
use crate::locks::{LockGrant, LockStats, LockTable, WorkflowLock};
use crate::presence::{PresenceStats, PresenceTable, UserInfo, UserSession};
use crate::requests::{EditRequest, RequestLedger, RequestStats};
use crate::types::{RequestId, UserId, WorkflowId};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Outcome of responding to an edit request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestOutcome {
    pub request: EditRequest,
    /// The lock released as a follow-on effect of an approval, if any.
    pub released_lock: Option<WorkflowLock>,
}

/// What a disconnect cascade touched.
#[derive(Debug, Clone, Serialize)]
pub struct DisconnectSummary {
    pub user_id: UserId,
    /// Whether a session was actually removed.
    pub removed: bool,
    /// Locks released by the cascade, as (workflow, owner) pairs.
    pub released_locks: Vec<(WorkflowId, UserId)>,
}

/// What one maintenance pass swept.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MaintenanceReport {
    pub expired_locks: Vec<(WorkflowId, UserId)>,
    pub inactive_users: Vec<UserId>,
    pub expired_requests: Vec<RequestId>,
    pub pruned_requests: usize,
}

impl MaintenanceReport {
    pub fn is_empty(&self) -> bool {
        self.expired_locks.is_empty()
            && self.inactive_users.is_empty()
            && self.expired_requests.is_empty()
            && self.pruned_requests == 0
    }
}

/// Combined three-table snapshot for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub locks: LockStats,
    pub presence: PresenceStats,
    pub requests: RequestStats,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

struct Tables {
    locks: LockTable,
    presence: PresenceTable,
    requests: RequestLedger,
}

/// The single entry point the adapter calls into.
///
/// Designed to be wrapped in `Arc` and shared across handlers and background
/// tasks.
pub struct Coordinator {
    tables: Mutex<Tables>,
}

impl Coordinator {
    /// Coordinator over fresh tables with the default timeouts.
    pub fn new() -> Self {
        Self::with_tables(LockTable::new(), PresenceTable::new(), RequestLedger::new())
    }

    /// Coordinator over caller-constructed tables (used by tests to shrink
    /// the expiry windows).
    pub fn with_tables(locks: LockTable, presence: PresenceTable, requests: RequestLedger) -> Self {
        Self {
            tables: Mutex::new(Tables {
                locks,
                presence,
                requests,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Locks
    // -----------------------------------------------------------------------

    /// Request the exclusive lock on a workflow. Any attempt, successful or
    /// not, counts as user activity.
    pub async fn request_lock(
        &self,
        workflow_id: &str,
        user_id: &str,
        force: bool,
    ) -> Result<LockGrant, CoreError> {
        let mut tables = self.tables.lock().await;
        let result = tables.locks.request_lock(workflow_id, user_id, force);
        tables.presence.update_user_activity(user_id);
        result
    }

    /// Release a held lock. Counts as user activity.
    pub async fn release_lock(
        &self,
        workflow_id: &str,
        user_id: &str,
    ) -> Result<WorkflowLock, CoreError> {
        let mut tables = self.tables.lock().await;
        let result = tables.locks.release_lock(workflow_id, user_id);
        tables.presence.update_user_activity(user_id);
        result
    }

    pub async fn get_workflow_lock(&self, workflow_id: &str) -> Option<WorkflowLock> {
        self.tables
            .lock()
            .await
            .locks
            .get_workflow_lock(workflow_id)
            .cloned()
    }

    pub async fn get_all_locks(&self) -> Vec<WorkflowLock> {
        self.tables.lock().await.locks.get_all_locks()
    }

    pub async fn get_user_locks(&self, user_id: &str) -> Vec<WorkflowLock> {
        self.tables.lock().await.locks.get_user_locks(user_id)
    }

    // -----------------------------------------------------------------------
    // Presence
    // -----------------------------------------------------------------------

    pub async fn register_user(&self, user_id: &str, info: UserInfo) -> UserSession {
        self.tables
            .lock()
            .await
            .presence
            .register_user(user_id, info)
            .clone()
    }

    pub async fn touch_user(&self, user_id: &str) -> bool {
        self.tables.lock().await.presence.update_user_activity(user_id)
    }

    pub async fn set_user_workflow(&self, user_id: &str, workflow_id: Option<WorkflowId>) -> bool {
        self.tables
            .lock()
            .await
            .presence
            .update_user_workflow(user_id, workflow_id)
    }

    pub async fn update_user_metadata(&self, user_id: &str, patch: serde_json::Value) -> bool {
        self.tables
            .lock()
            .await
            .presence
            .update_user_metadata(user_id, patch)
    }

    pub async fn get_user(&self, user_id: &str) -> Option<UserSession> {
        self.tables.lock().await.presence.get_user(user_id).cloned()
    }

    pub async fn get_all_users(&self) -> Vec<UserSession> {
        self.tables.lock().await.presence.get_all_users()
    }

    pub async fn get_workflow_users(&self, workflow_id: &str) -> Vec<UserSession> {
        self.tables.lock().await.presence.get_workflow_users(workflow_id)
    }

    pub async fn get_user_by_socket_id(&self, socket_id: &str) -> Option<UserSession> {
        self.tables
            .lock()
            .await
            .presence
            .get_user_by_socket_id(socket_id)
            .cloned()
    }

    // -----------------------------------------------------------------------
    // Edit requests
    // -----------------------------------------------------------------------

    /// Create an edit request against the current holder of a workflow's
    /// lock. The target is derived from the live lock; the ledger itself
    /// never validates cross-table state.
    pub async fn create_edit_request(
        &self,
        workflow_id: &str,
        requester_id: &str,
        message: Option<String>,
    ) -> Result<EditRequest, CoreError> {
        let mut tables = self.tables.lock().await;
        let holder = match tables.locks.get_workflow_lock(workflow_id) {
            Some(lock) => lock.clone(),
            None => return Err(CoreError::NoLock),
        };
        if holder.user_id == requester_id {
            return Err(CoreError::Validation(
                "Requester already holds the lock on this workflow".to_string(),
            ));
        }
        let request =
            tables
                .requests
                .create_request(workflow_id, requester_id, &holder.user_id, message);
        tables.presence.update_user_activity(requester_id);
        Ok(request)
    }

    /// Approve or deny an edit request. Only the targeted lock holder may
    /// respond.
    ///
    /// On approval the coordinator releases the responder's lock on the
    /// request's workflow as a follow-on effect. The release is best-effort:
    /// if the lock is already gone or has changed hands, the failure is
    /// logged and swallowed — the approval stands.
    pub async fn respond_to_request(
        &self,
        request_id: &str,
        responder_id: &str,
        approved: bool,
        message: Option<String>,
    ) -> Result<RequestOutcome, CoreError> {
        let mut tables = self.tables.lock().await;

        match tables.requests.get_request(request_id) {
            None => {
                return Err(CoreError::NotFound {
                    entity: "Edit request",
                    id: request_id.to_owned(),
                })
            }
            Some(request) if request.target_user_id != responder_id => {
                return Err(CoreError::Unauthorized(
                    "Only the user targeted by this request can respond".to_string(),
                ));
            }
            Some(_) => {}
        }

        let request = tables.requests.respond_to_request(request_id, approved, message)?;

        let released_lock = if approved {
            match tables.locks.release_lock(&request.workflow_id, responder_id) {
                Ok(lock) => Some(lock),
                Err(err) => {
                    tracing::debug!(
                        code = err.code(),
                        workflow_id = %request.workflow_id,
                        "Follow-on lock release skipped"
                    );
                    None
                }
            }
        } else {
            None
        };

        tables.presence.update_user_activity(responder_id);
        Ok(RequestOutcome {
            request,
            released_lock,
        })
    }

    /// Cancel a pending edit request. Counts as requester activity.
    pub async fn cancel_request(&self, request_id: &str, user_id: &str) -> Result<bool, CoreError> {
        let mut tables = self.tables.lock().await;
        let result = tables.requests.cancel_request(request_id, user_id);
        tables.presence.update_user_activity(user_id);
        result
    }

    pub async fn get_request(&self, request_id: &str) -> Option<EditRequest> {
        self.tables.lock().await.requests.get_request(request_id).cloned()
    }

    pub async fn get_requests_for_user(&self, user_id: &str) -> Vec<EditRequest> {
        self.tables.lock().await.requests.get_requests_for_user(user_id)
    }

    pub async fn get_requests_by_user(&self, user_id: &str) -> Vec<EditRequest> {
        self.tables.lock().await.requests.get_requests_by_user(user_id)
    }

    pub async fn get_workflow_requests(&self, workflow_id: &str) -> Vec<EditRequest> {
        self.tables
            .lock()
            .await
            .requests
            .get_workflow_requests(workflow_id)
    }

    // -----------------------------------------------------------------------
    // Disconnect cascade
    // -----------------------------------------------------------------------

    /// Disconnect whatever session owns `socket_id`, if any.
    ///
    /// Returns `None` when no session is bound to the socket — which is the
    /// normal case after the user re-identified on a newer connection.
    pub async fn disconnect_socket(&self, socket_id: &str) -> Option<DisconnectSummary> {
        let mut tables = self.tables.lock().await;
        let user_id = tables
            .presence
            .get_user_by_socket_id(socket_id)?
            .user_id
            .clone();
        Some(Self::disconnect_locked(&mut tables, &user_id))
    }

    /// Release all of a user's locks and remove their session, as one
    /// logical unit.
    pub async fn disconnect_user(&self, user_id: &str) -> DisconnectSummary {
        let mut tables = self.tables.lock().await;
        Self::disconnect_locked(&mut tables, user_id)
    }

    fn disconnect_locked(tables: &mut Tables, user_id: &str) -> DisconnectSummary {
        let released_locks = tables.locks.release_user_locks(user_id);
        let removed = tables.presence.remove_user(user_id).is_some();
        DisconnectSummary {
            user_id: user_id.to_owned(),
            removed,
            released_locks,
        }
    }

    // -----------------------------------------------------------------------
    // Maintenance & stats
    // -----------------------------------------------------------------------

    /// Run the four independent sweeps once. The surrounding scheduler owns
    /// the cadence; nothing in the core fires on a timer.
    pub async fn run_maintenance(&self) -> MaintenanceReport {
        let mut tables = self.tables.lock().await;
        MaintenanceReport {
            expired_locks: tables.locks.cleanup_expired_locks(),
            inactive_users: tables.presence.cleanup_inactive_users(),
            expired_requests: tables.requests.cleanup_expired_requests(),
            pruned_requests: tables.requests.cleanup_old_requests(),
        }
    }

    /// Combined snapshot of all three tables. The lock counters purge
    /// expired entries as a side effect.
    pub async fn stats_snapshot(&self) -> StatsSnapshot {
        let mut tables = self.tables.lock().await;
        StatsSnapshot {
            locks: tables.locks.stats_snapshot(),
            presence: tables.presence.stats_snapshot(),
            requests: tables.requests.stats_snapshot(),
        }
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
