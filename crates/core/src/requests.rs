//! Edit request ledger.
//!
//! An edit request lets a user blocked by someone else's lock ask the holder
//! to yield. Requests move through a terminal state machine:
//!
//! ```text
//! pending ──► approved | denied | expired | cancelled
//! ```
//!
//! Once a request leaves `pending` it never changes again; terminal entries
//! are only removed by the retention sweep. Expiry is lazy: a pending request
//! past its window stays in the map until a read, response, or sweep touches
//! it, and the filtered reads hide such entries without mutating them.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::{RequestId, Timestamp, UserId, WorkflowId};

/// How long a request stays answerable (5 minutes).
pub const REQUEST_TIMEOUT_SECS: i64 = 300;

/// How long terminal requests are retained before pruning (1 hour).
pub const REQUEST_RETENTION_SECS: i64 = 3600;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Lifecycle state of an edit request. Everything except `Pending` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
    Expired,
    Cancelled,
}

impl RequestStatus {
    /// Wire/database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A request from `requester_id` asking `target_user_id` to yield their lock
/// on `workflow_id`.
#[derive(Debug, Clone, Serialize)]
pub struct EditRequest {
    pub id: RequestId,
    pub workflow_id: WorkflowId,
    pub requester_id: UserId,
    pub target_user_id: UserId,
    pub message: Option<String>,
    pub status: RequestStatus,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub responded_at: Option<Timestamp>,
    pub approved: Option<bool>,
    pub response_message: Option<String>,
}

impl EditRequest {
    /// A pending request past its window is logically expired even before a
    /// sweep flips its status.
    fn is_logically_expired(&self, now: Timestamp) -> bool {
        self.status == RequestStatus::Pending && now > self.expires_at
    }
}

/// Point-in-time ledger counters, by status.
#[derive(Debug, Clone, Serialize)]
pub struct RequestStats {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub denied: usize,
    pub expired: usize,
    pub cancelled: usize,
}

// ---------------------------------------------------------------------------
// RequestLedger
// ---------------------------------------------------------------------------

/// Owns the request-id → request mapping.
///
/// The ledger never reads the lock or presence tables; validating that a
/// request targets the actual lock holder is the coordinator's job.
#[derive(Debug)]
pub struct RequestLedger {
    requests: HashMap<RequestId, EditRequest>,
    expiry: Duration,
    retention: Duration,
}

impl RequestLedger {
    /// Create an empty ledger with the default 5-minute expiry and 1-hour
    /// retention window.
    pub fn new() -> Self {
        Self::with_timeouts(
            Duration::seconds(REQUEST_TIMEOUT_SECS),
            Duration::seconds(REQUEST_RETENTION_SECS),
        )
    }

    /// Create an empty ledger with specific windows, fixed for the ledger's
    /// lifetime.
    pub fn with_timeouts(expiry: Duration, retention: Duration) -> Self {
        Self {
            requests: HashMap::new(),
            expiry,
            retention,
        }
    }

    /// Create a pending request. Always succeeds; the id is a fresh UUID.
    pub fn create_request(
        &mut self,
        workflow_id: &str,
        requester_id: &str,
        target_user_id: &str,
        message: Option<String>,
    ) -> EditRequest {
        let now = Utc::now();
        let request = EditRequest {
            id: Uuid::new_v4().to_string(),
            workflow_id: workflow_id.to_owned(),
            requester_id: requester_id.to_owned(),
            target_user_id: target_user_id.to_owned(),
            message,
            status: RequestStatus::Pending,
            created_at: now,
            expires_at: now + self.expiry,
            responded_at: None,
            approved: None,
            response_message: None,
        };
        self.requests.insert(request.id.clone(), request.clone());
        request
    }

    /// Approve or deny a pending request.
    ///
    /// Fails `NotFound` for unknown ids and `InvalidState` for requests
    /// already past `pending`. A pending request past its expiry window is
    /// flipped to `expired` AND the call fails — the one failure path that
    /// mutates state.
    pub fn respond_to_request(
        &mut self,
        request_id: &str,
        approved: bool,
        message: Option<String>,
    ) -> Result<EditRequest, CoreError> {
        let now = Utc::now();
        let Some(request) = self.requests.get_mut(request_id) else {
            return Err(CoreError::NotFound {
                entity: "Edit request",
                id: request_id.to_owned(),
            });
        };
        if request.status.is_terminal() {
            return Err(CoreError::InvalidState(format!(
                "Request was already {}",
                request.status.as_str()
            )));
        }
        if now > request.expires_at {
            request.status = RequestStatus::Expired;
            return Err(CoreError::InvalidState("Request has expired".to_string()));
        }

        request.status = if approved {
            RequestStatus::Approved
        } else {
            RequestStatus::Denied
        };
        request.responded_at = Some(now);
        request.approved = Some(approved);
        request.response_message = message;
        Ok(request.clone())
    }

    /// Cancel a pending request. Only the original requester may cancel.
    ///
    /// Returns `Ok(false)` for unknown ids (nothing to cancel), fails
    /// `Unauthorized` for anyone but the requester and `InvalidState` for
    /// requests already past `pending`.
    pub fn cancel_request(&mut self, request_id: &str, user_id: &str) -> Result<bool, CoreError> {
        let Some(request) = self.requests.get_mut(request_id) else {
            return Ok(false);
        };
        if request.requester_id != user_id {
            return Err(CoreError::Unauthorized(
                "Only the requester can cancel an edit request".to_string(),
            ));
        }
        if request.status.is_terminal() {
            return Err(CoreError::InvalidState(format!(
                "Request was already {}",
                request.status.as_str()
            )));
        }
        request.status = RequestStatus::Cancelled;
        request.responded_at = Some(Utc::now());
        Ok(true)
    }

    /// The stored request, in whatever state it is in.
    pub fn get_request(&self, request_id: &str) -> Option<&EditRequest> {
        self.requests.get(request_id)
    }

    /// Requests targeting a user (i.e. asking them to yield), newest first.
    /// Hides logically-expired pending entries without mutating them.
    pub fn get_requests_for_user(&self, user_id: &str) -> Vec<EditRequest> {
        self.filtered(|request| request.target_user_id == user_id)
    }

    /// Requests created by a user, newest first.
    pub fn get_requests_by_user(&self, user_id: &str) -> Vec<EditRequest> {
        self.filtered(|request| request.requester_id == user_id)
    }

    /// Requests concerning a workflow, newest first.
    pub fn get_workflow_requests(&self, workflow_id: &str) -> Vec<EditRequest> {
        self.filtered(|request| request.workflow_id == workflow_id)
    }

    /// Flip every pending request past its window to `expired`, returning the
    /// affected ids. Terminal requests are untouched regardless of age.
    pub fn cleanup_expired_requests(&mut self) -> Vec<RequestId> {
        let now = Utc::now();
        let mut expired = Vec::new();
        for request in self.requests.values_mut() {
            if request.is_logically_expired(now) {
                request.status = RequestStatus::Expired;
                expired.push(request.id.clone());
            }
        }
        expired
    }

    /// Delete terminal requests older than the retention window, returning
    /// how many were pruned. Pending requests are never deleted by age alone;
    /// the expiry sweep must move them out of `pending` first.
    pub fn cleanup_old_requests(&mut self) -> usize {
        let cutoff = Utc::now() - self.retention;
        let before = self.requests.len();
        self.requests
            .retain(|_, request| !(request.status.is_terminal() && request.created_at < cutoff));
        before - self.requests.len()
    }

    /// Counters for the stats endpoint. Pure read, no mutation.
    pub fn stats_snapshot(&self) -> RequestStats {
        let mut stats = RequestStats {
            total: self.requests.len(),
            pending: 0,
            approved: 0,
            denied: 0,
            expired: 0,
            cancelled: 0,
        };
        for request in self.requests.values() {
            match request.status {
                RequestStatus::Pending => stats.pending += 1,
                RequestStatus::Approved => stats.approved += 1,
                RequestStatus::Denied => stats.denied += 1,
                RequestStatus::Expired => stats.expired += 1,
                RequestStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    fn filtered(&self, predicate: impl Fn(&EditRequest) -> bool) -> Vec<EditRequest> {
        let now = Utc::now();
        let mut requests: Vec<EditRequest> = self
            .requests
            .values()
            .filter(|request| predicate(request) && !request.is_logically_expired(now))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        requests
    }
}

impl Default for RequestLedger {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Ledger whose requests expire almost immediately.
    fn short_lived_ledger() -> RequestLedger {
        RequestLedger::with_timeouts(
            Duration::milliseconds(10),
            Duration::seconds(REQUEST_RETENTION_SECS),
        )
    }

    fn wait_past_expiry() {
        std::thread::sleep(std::time::Duration::from_millis(20));
    }

    // -----------------------------------------------------------------------
    // Creation & response
    // -----------------------------------------------------------------------

    #[test]
    fn create_assigns_fresh_pending_request() {
        let mut ledger = RequestLedger::new();

        let request = ledger.create_request("wf-1", "bob", "alice", Some("mind if I edit?".into()));

        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.requester_id, "bob");
        assert_eq!(request.target_user_id, "alice");
        assert!(request.expires_at > request.created_at);

        let other = ledger.create_request("wf-1", "carol", "alice", None);
        assert_ne!(request.id, other.id);
    }

    #[test]
    fn approve_stamps_response_fields() {
        let mut ledger = RequestLedger::new();
        let request = ledger.create_request("wf-1", "bob", "alice", None);

        let responded = ledger
            .respond_to_request(&request.id, true, Some("all yours".into()))
            .unwrap();

        assert_eq!(responded.status, RequestStatus::Approved);
        assert_eq!(responded.approved, Some(true));
        assert_eq!(responded.response_message.as_deref(), Some("all yours"));
        assert!(responded.responded_at.is_some());
    }

    #[test]
    fn deny_is_terminal_too() {
        let mut ledger = RequestLedger::new();
        let request = ledger.create_request("wf-1", "bob", "alice", None);

        let responded = ledger.respond_to_request(&request.id, false, None).unwrap();
        assert_eq!(responded.status, RequestStatus::Denied);
        assert_eq!(responded.approved, Some(false));
    }

    #[test]
    fn respond_to_unknown_id_fails_not_found() {
        let mut ledger = RequestLedger::new();

        let err = ledger.respond_to_request("no-such-id", true, None).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    // -----------------------------------------------------------------------
    // Terminality
    // -----------------------------------------------------------------------

    #[test]
    fn responded_request_cannot_change_again() {
        let mut ledger = RequestLedger::new();
        let request = ledger.create_request("wf-1", "bob", "alice", None);
        ledger.respond_to_request(&request.id, true, None).unwrap();

        let err = ledger.respond_to_request(&request.id, false, None).unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");

        let err = ledger.cancel_request(&request.id, "bob").unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");

        // Status stayed approved through both rejected attempts.
        let stored = ledger.get_request(&request.id).unwrap();
        assert_eq!(stored.status, RequestStatus::Approved);
    }

    #[test]
    fn respond_past_expiry_fails_and_flips_to_expired() {
        let mut ledger = short_lived_ledger();
        let request = ledger.create_request("wf-1", "bob", "alice", None);
        wait_past_expiry();

        let err = ledger.respond_to_request(&request.id, true, None).unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");

        let stored = ledger.get_request(&request.id).unwrap();
        assert_eq!(stored.status, RequestStatus::Expired);
        assert!(stored.responded_at.is_none());
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    #[test]
    fn cancel_by_requester_succeeds() {
        let mut ledger = RequestLedger::new();
        let request = ledger.create_request("wf-1", "bob", "alice", None);

        assert!(ledger.cancel_request(&request.id, "bob").unwrap());
        let stored = ledger.get_request(&request.id).unwrap();
        assert_eq!(stored.status, RequestStatus::Cancelled);
        assert!(stored.responded_at.is_some());
    }

    #[test]
    fn cancel_unknown_id_is_false() {
        let mut ledger = RequestLedger::new();
        assert!(!ledger.cancel_request("no-such-id", "bob").unwrap());
    }

    #[test]
    fn cancel_by_someone_else_fails_unauthorized() {
        let mut ledger = RequestLedger::new();
        let request = ledger.create_request("wf-1", "bob", "alice", None);

        let err = ledger.cancel_request(&request.id, "mallory").unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
        assert_eq!(
            ledger.get_request(&request.id).unwrap().status,
            RequestStatus::Pending
        );
    }

    // -----------------------------------------------------------------------
    // Filtered reads
    // -----------------------------------------------------------------------

    #[test]
    fn filtered_reads_match_their_key() {
        let mut ledger = RequestLedger::new();
        ledger.create_request("wf-1", "bob", "alice", None);
        ledger.create_request("wf-2", "carol", "alice", None);
        ledger.create_request("wf-1", "alice", "dave", None);

        assert_eq!(ledger.get_requests_for_user("alice").len(), 2);
        assert_eq!(ledger.get_requests_by_user("carol").len(), 1);
        assert_eq!(ledger.get_workflow_requests("wf-1").len(), 2);
    }

    #[test]
    fn filtered_reads_hide_stale_pending_without_mutating() {
        let mut ledger = short_lived_ledger();
        let request = ledger.create_request("wf-1", "bob", "alice", None);
        wait_past_expiry();

        assert!(ledger.get_requests_for_user("alice").is_empty());
        // The read did not flip the stored status; only sweeps do that.
        assert_eq!(
            ledger.get_request(&request.id).unwrap().status,
            RequestStatus::Pending
        );
    }

    // -----------------------------------------------------------------------
    // Sweeps
    // -----------------------------------------------------------------------

    #[test]
    fn expiry_sweep_flips_only_stale_pending() {
        let mut ledger = short_lived_ledger();
        let stale = ledger.create_request("wf-1", "bob", "alice", None);
        let answered = ledger.create_request("wf-2", "carol", "alice", None);
        ledger.respond_to_request(&answered.id, false, None).unwrap();
        wait_past_expiry();

        let expired = ledger.cleanup_expired_requests();
        assert_eq!(expired, vec![stale.id.clone()]);
        assert_eq!(
            ledger.get_request(&stale.id).unwrap().status,
            RequestStatus::Expired
        );
        // The denied request kept its terminal status despite its age.
        assert_eq!(
            ledger.get_request(&answered.id).unwrap().status,
            RequestStatus::Denied
        );
    }

    #[test]
    fn retention_prunes_terminal_but_never_pending() {
        // Zero retention: any terminal request is immediately prunable.
        let mut ledger =
            RequestLedger::with_timeouts(Duration::seconds(REQUEST_TIMEOUT_SECS), Duration::zero());
        let pending = ledger.create_request("wf-1", "bob", "alice", None);
        let answered = ledger.create_request("wf-2", "carol", "alice", None);
        ledger.respond_to_request(&answered.id, true, None).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));

        let pruned = ledger.cleanup_old_requests();
        assert_eq!(pruned, 1);
        assert!(ledger.get_request(&answered.id).is_none());
        // Pending requests are never age-deleted.
        assert!(ledger.get_request(&pending.id).is_some());
    }

    #[test]
    fn stats_count_by_status() {
        let mut ledger = RequestLedger::new();
        ledger.create_request("wf-1", "bob", "alice", None);
        let denied = ledger.create_request("wf-2", "carol", "alice", None);
        ledger.respond_to_request(&denied.id, false, None).unwrap();

        let stats = ledger.stats_snapshot();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.denied, 1);
        assert_eq!(stats.approved, 0);
    }
}
