//! Exclusive workflow lock table.
//!
//! At most one lock exists per workflow. Liveness is expiry-based: a lock
//! whose `expires_at` has passed is treated as absent by every read and is
//! purged lazily at that point. Nothing fires on a timer here; the periodic
//! sweep (`cleanup_expired_locks`) bounds how long an expired entry can
//! linger in the map, and the surrounding scheduler owns the cadence.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use serde::Serialize;

use crate::error::CoreError;
use crate::types::{Timestamp, UserId, WorkflowId};

/// How long an acquired lock stays live without a refresh (5 minutes).
pub const LOCK_TIMEOUT_SECS: i64 = 300;

// ---------------------------------------------------------------------------
// Lock types
// ---------------------------------------------------------------------------

/// An exclusive edit lock on a single workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowLock {
    pub workflow_id: WorkflowId,
    pub user_id: UserId,
    pub acquired_at: Timestamp,
    pub expires_at: Timestamp,
}

impl WorkflowLock {
    /// A lock is live while `now` has not passed `expires_at`.
    pub fn is_live(&self, now: Timestamp) -> bool {
        now <= self.expires_at
    }
}

/// Why a lock request succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantReason {
    /// No live lock existed; a fresh one was created.
    Acquired,
    /// The caller already held the lock; its window was extended.
    Refreshed,
    /// Another user's live lock was overwritten (`force` was set).
    Takeover,
}

/// Successful outcome of [`LockTable::request_lock`].
#[derive(Debug, Clone, Serialize)]
pub struct LockGrant {
    pub lock: WorkflowLock,
    pub reason: GrantReason,
}

/// Point-in-time lock table counters.
#[derive(Debug, Clone, Serialize)]
pub struct LockStats {
    /// Live locks currently held.
    pub active_locks: usize,
}

// ---------------------------------------------------------------------------
// LockTable
// ---------------------------------------------------------------------------

/// Owns the workflow → lock mapping.
///
/// Entries are mutated only through these methods. Reads that can observe an
/// expired entry purge it first, so an expired lock is never visible as live.
#[derive(Debug)]
pub struct LockTable {
    locks: HashMap<WorkflowId, WorkflowLock>,
    timeout: Duration,
}

impl LockTable {
    /// Create an empty table with the default 5-minute lock timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::seconds(LOCK_TIMEOUT_SECS))
    }

    /// Create an empty table with a specific timeout, fixed for the table's
    /// lifetime. The timeout is never configurable per call.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            locks: HashMap::new(),
            timeout,
        }
    }

    /// Request the exclusive lock on a workflow.
    ///
    /// - No live lock: a fresh lock is created (`Acquired`).
    /// - Live lock held by the same user: the window is extended (`Refreshed`).
    /// - Live lock held by another user, `force` unset: fails with
    ///   [`CoreError::WorkflowLocked`] carrying the holder's lock.
    /// - Live lock held by another user, `force` set: the holder is replaced
    ///   (`Takeover`). Notifying the ousted holder is the caller's job.
    pub fn request_lock(
        &mut self,
        workflow_id: &str,
        user_id: &str,
        force: bool,
    ) -> Result<LockGrant, CoreError> {
        let now = Utc::now();
        self.purge_if_expired(workflow_id, now);

        if let Some(existing) = self.locks.get_mut(workflow_id) {
            if existing.user_id == user_id {
                existing.acquired_at = now;
                existing.expires_at = now + self.timeout;
                return Ok(LockGrant {
                    lock: existing.clone(),
                    reason: GrantReason::Refreshed,
                });
            }
            if !force {
                return Err(CoreError::WorkflowLocked {
                    holder: existing.clone(),
                });
            }
        }

        let reason = if self.locks.remove(workflow_id).is_some() {
            GrantReason::Takeover
        } else {
            GrantReason::Acquired
        };
        let lock = WorkflowLock {
            workflow_id: workflow_id.to_owned(),
            user_id: user_id.to_owned(),
            acquired_at: now,
            expires_at: now + self.timeout,
        };
        self.locks.insert(workflow_id.to_owned(), lock.clone());
        Ok(LockGrant { lock, reason })
    }

    /// Release a held lock. Only the holder may release.
    ///
    /// Fails with [`CoreError::NoLock`] when no live lock exists (an expired
    /// lock counts as absent and is purged) and [`CoreError::Unauthorized`]
    /// when the lock is owned by a different user.
    pub fn release_lock(
        &mut self,
        workflow_id: &str,
        user_id: &str,
    ) -> Result<WorkflowLock, CoreError> {
        let now = Utc::now();
        self.purge_if_expired(workflow_id, now);

        let owned = match self.locks.get(workflow_id) {
            None => return Err(CoreError::NoLock),
            Some(lock) => lock.user_id == user_id,
        };
        if !owned {
            return Err(CoreError::Unauthorized(format!(
                "Lock on workflow {workflow_id} is held by another user"
            )));
        }
        self.locks.remove(workflow_id).ok_or(CoreError::NoLock)
    }

    /// Current lock for a workflow, if live. Purges an expired entry.
    pub fn get_workflow_lock(&mut self, workflow_id: &str) -> Option<&WorkflowLock> {
        let now = Utc::now();
        self.purge_if_expired(workflow_id, now);
        self.locks.get(workflow_id)
    }

    /// All live locks. Every expired entry is purged as a side effect.
    pub fn get_all_locks(&mut self) -> Vec<WorkflowLock> {
        let now = Utc::now();
        self.locks.retain(|_, lock| lock.is_live(now));
        let mut locks: Vec<WorkflowLock> = self.locks.values().cloned().collect();
        locks.sort_by(|a, b| a.workflow_id.cmp(&b.workflow_id));
        locks
    }

    /// Live locks held by one user. Same purge-then-filter behavior as
    /// [`get_all_locks`](Self::get_all_locks).
    pub fn get_user_locks(&mut self, user_id: &str) -> Vec<WorkflowLock> {
        self.get_all_locks()
            .into_iter()
            .filter(|lock| lock.user_id == user_id)
            .collect()
    }

    /// Sweep the full table once, removing and returning every expired lock.
    /// Intended for periodic invocation by the coordinator.
    pub fn cleanup_expired_locks(&mut self) -> Vec<(WorkflowId, UserId)> {
        let now = Utc::now();
        let expired: Vec<(WorkflowId, UserId)> = self
            .locks
            .values()
            .filter(|lock| !lock.is_live(now))
            .map(|lock| (lock.workflow_id.clone(), lock.user_id.clone()))
            .collect();
        for (workflow_id, _) in &expired {
            self.locks.remove(workflow_id);
        }
        expired
    }

    /// Unconditionally remove every lock owned by a user, expired or not.
    /// Used on disconnect.
    pub fn release_user_locks(&mut self, user_id: &str) -> Vec<(WorkflowId, UserId)> {
        let released: Vec<(WorkflowId, UserId)> = self
            .locks
            .values()
            .filter(|lock| lock.user_id == user_id)
            .map(|lock| (lock.workflow_id.clone(), lock.user_id.clone()))
            .collect();
        for (workflow_id, _) in &released {
            self.locks.remove(workflow_id);
        }
        released
    }

    /// Counters for the stats endpoint. Purges expired entries first;
    /// callers rely on this to keep the table size bounded.
    pub fn stats_snapshot(&mut self) -> LockStats {
        let now = Utc::now();
        self.locks.retain(|_, lock| lock.is_live(now));
        LockStats {
            active_locks: self.locks.len(),
        }
    }

    fn purge_if_expired(&mut self, workflow_id: &str, now: Timestamp) {
        let expired = self
            .locks
            .get(workflow_id)
            .is_some_and(|lock| !lock.is_live(now));
        if expired {
            self.locks.remove(workflow_id);
        }
    }
}

impl Default for LockTable {
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

    /// A timeout short enough to expire within a test without a long wait.
    fn short_lived_table() -> LockTable {
        LockTable::with_timeout(Duration::milliseconds(10))
    }

    fn wait_past_expiry() {
        std::thread::sleep(std::time::Duration::from_millis(20));
    }

    // -----------------------------------------------------------------------
    // Acquisition
    // -----------------------------------------------------------------------

    #[test]
    fn acquire_on_empty_table() {
        let mut table = LockTable::new();

        let grant = table.request_lock("wf-1", "alice", false).unwrap();
        assert_eq!(grant.reason, GrantReason::Acquired);
        assert_eq!(grant.lock.workflow_id, "wf-1");
        assert_eq!(grant.lock.user_id, "alice");
        assert!(grant.lock.expires_at > grant.lock.acquired_at);
    }

    #[test]
    fn refresh_by_owner_extends_expiry() {
        let mut table = LockTable::new();

        let first = table.request_lock("wf-1", "alice", false).unwrap();
        let second = table.request_lock("wf-1", "alice", false).unwrap();

        assert_eq!(second.reason, GrantReason::Refreshed);
        assert_eq!(second.lock.user_id, "alice");
        assert!(second.lock.expires_at >= first.lock.expires_at);
    }

    #[test]
    fn conflict_without_force_reports_holder() {
        let mut table = LockTable::new();
        table.request_lock("wf-1", "alice", false).unwrap();

        let err = table.request_lock("wf-1", "bob", false).unwrap_err();
        match err {
            CoreError::WorkflowLocked { holder } => {
                assert_eq!(holder.user_id, "alice");
                assert_eq!(holder.workflow_id, "wf-1");
            }
            other => panic!("Expected WorkflowLocked, got: {other:?}"),
        }
    }

    #[test]
    fn forced_takeover_replaces_holder() {
        let mut table = LockTable::new();
        table.request_lock("wf-1", "alice", false).unwrap();

        let grant = table.request_lock("wf-1", "bob", true).unwrap();
        assert_eq!(grant.reason, GrantReason::Takeover);
        assert_eq!(grant.lock.user_id, "bob");

        // At most one lock per workflow: alice's lock is gone.
        let current = table.get_workflow_lock("wf-1").unwrap();
        assert_eq!(current.user_id, "bob");
        assert_eq!(table.get_all_locks().len(), 1);
    }

    #[test]
    fn acquiring_expired_lock_is_a_fresh_acquire() {
        let mut table = short_lived_table();
        table.request_lock("wf-1", "alice", false).unwrap();
        wait_past_expiry();

        let grant = table.request_lock("wf-1", "bob", false).unwrap();
        assert_eq!(grant.reason, GrantReason::Acquired);
        assert_eq!(grant.lock.user_id, "bob");
    }

    // -----------------------------------------------------------------------
    // Release
    // -----------------------------------------------------------------------

    #[test]
    fn release_by_owner_succeeds() {
        let mut table = LockTable::new();
        table.request_lock("wf-1", "alice", false).unwrap();

        let released = table.release_lock("wf-1", "alice").unwrap();
        assert_eq!(released.user_id, "alice");
        assert!(table.get_workflow_lock("wf-1").is_none());
    }

    #[test]
    fn release_absent_lock_fails_no_lock() {
        let mut table = LockTable::new();

        let err = table.release_lock("wf-1", "alice").unwrap_err();
        assert_eq!(err.code(), "NO_LOCK");
    }

    #[test]
    fn release_by_non_owner_fails_unauthorized() {
        let mut table = LockTable::new();
        table.request_lock("wf-1", "alice", false).unwrap();

        let err = table.release_lock("wf-1", "bob").unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");

        // The lock is untouched.
        assert_eq!(table.get_workflow_lock("wf-1").unwrap().user_id, "alice");
    }

    #[test]
    fn release_expired_lock_fails_no_lock() {
        let mut table = short_lived_table();
        table.request_lock("wf-1", "alice", false).unwrap();
        wait_past_expiry();

        let err = table.release_lock("wf-1", "alice").unwrap_err();
        assert_eq!(err.code(), "NO_LOCK");
    }

    // -----------------------------------------------------------------------
    // Expiry monotonicity
    // -----------------------------------------------------------------------

    #[test]
    fn expired_lock_is_never_read_as_live() {
        let mut table = short_lived_table();
        table.request_lock("wf-1", "alice", false).unwrap();
        table.request_lock("wf-2", "alice", false).unwrap();
        wait_past_expiry();

        assert!(table.get_workflow_lock("wf-1").is_none());
        assert!(table.get_all_locks().is_empty());
        assert!(table.get_user_locks("alice").is_empty());
    }

    #[test]
    fn stats_snapshot_purges_expired_entries() {
        let mut table = short_lived_table();
        table.request_lock("wf-1", "alice", false).unwrap();
        wait_past_expiry();

        let stats = table.stats_snapshot();
        assert_eq!(stats.active_locks, 0);
    }

    // -----------------------------------------------------------------------
    // Sweeps
    // -----------------------------------------------------------------------

    #[test]
    fn cleanup_returns_expired_pairs() {
        let mut table = short_lived_table();
        table.request_lock("wf-1", "alice", false).unwrap();
        table.request_lock("wf-2", "bob", false).unwrap();
        wait_past_expiry();

        let mut swept = table.cleanup_expired_locks();
        swept.sort();
        assert_eq!(
            swept,
            vec![
                ("wf-1".to_string(), "alice".to_string()),
                ("wf-2".to_string(), "bob".to_string()),
            ]
        );

        // Nothing left for a second sweep.
        assert!(table.cleanup_expired_locks().is_empty());
    }

    #[test]
    fn cleanup_leaves_live_locks_alone() {
        let mut table = LockTable::new();
        table.request_lock("wf-1", "alice", false).unwrap();

        assert!(table.cleanup_expired_locks().is_empty());
        assert_eq!(table.get_workflow_lock("wf-1").unwrap().user_id, "alice");
    }

    #[test]
    fn release_user_locks_removes_all_owned() {
        let mut table = LockTable::new();
        table.request_lock("wf-1", "carol", false).unwrap();
        table.request_lock("wf-2", "carol", false).unwrap();
        table.request_lock("wf-3", "dave", false).unwrap();

        let mut released = table.release_user_locks("carol");
        released.sort();
        assert_eq!(
            released,
            vec![
                ("wf-1".to_string(), "carol".to_string()),
                ("wf-2".to_string(), "carol".to_string()),
            ]
        );

        // Dave's lock survives.
        assert_eq!(table.get_all_locks().len(), 1);
        assert_eq!(table.get_workflow_lock("wf-3").unwrap().user_id, "dave");
    }
}
