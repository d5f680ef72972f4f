//! User presence table.
//!
//! One session per user; re-identification overwrites. "Active" is a derived
//! read-time predicate over `last_activity`, never a stored flag, so a
//! session cannot go stale silently — it either answers the predicate or has
//! been removed by the inactivity sweep.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{SocketId, Timestamp, UserId, WorkflowId};

/// Sessions idle longer than this are evicted by the sweep (10 minutes).
pub const INACTIVITY_TIMEOUT_SECS: i64 = 600;

// ---------------------------------------------------------------------------
// Session types
// ---------------------------------------------------------------------------

/// A connected user's session.
#[derive(Debug, Clone, Serialize)]
pub struct UserSession {
    pub user_id: UserId,
    pub socket_id: SocketId,
    pub user_name: String,
    pub email: Option<String>,
    /// Workflow the user is currently viewing, if any.
    pub workflow_id: Option<WorkflowId>,
    pub connected_at: Timestamp,
    /// Monotonically non-decreasing while the session exists.
    pub last_activity: Timestamp,
    /// Free-form client metadata, shallow-merged on update.
    pub metadata: serde_json::Value,
}

/// Registration payload for [`PresenceTable::register_user`].
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub socket_id: SocketId,
    pub user_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub workflow_id: Option<WorkflowId>,
    #[serde(default = "empty_metadata")]
    pub metadata: serde_json::Value,
}

fn empty_metadata() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

/// Point-in-time presence counters.
#[derive(Debug, Clone, Serialize)]
pub struct PresenceStats {
    /// Sessions currently stored, active or not.
    pub total_sessions: usize,
    /// Sessions within the inactivity window.
    pub active_sessions: usize,
}

// ---------------------------------------------------------------------------
// PresenceTable
// ---------------------------------------------------------------------------

/// Owns the user-id → session mapping.
#[derive(Debug)]
pub struct PresenceTable {
    sessions: HashMap<UserId, UserSession>,
    inactivity_timeout: Duration,
}

impl PresenceTable {
    /// Create an empty table with the default 10-minute inactivity timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::seconds(INACTIVITY_TIMEOUT_SECS))
    }

    /// Create an empty table with a specific inactivity timeout, fixed for
    /// the table's lifetime.
    pub fn with_timeout(inactivity_timeout: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            inactivity_timeout,
        }
    }

    /// Register (or re-register) a user. Always succeeds; an existing session
    /// for the same user is overwritten, resetting both timestamps to now.
    pub fn register_user(&mut self, user_id: &str, info: UserInfo) -> &UserSession {
        let now = Utc::now();
        let session = UserSession {
            user_id: user_id.to_owned(),
            socket_id: info.socket_id,
            user_name: info.user_name,
            email: info.email,
            workflow_id: info.workflow_id,
            connected_at: now,
            last_activity: now,
            metadata: info.metadata,
        };
        self.sessions.insert(user_id.to_owned(), session);
        // Just inserted under this key.
        &self.sessions[user_id]
    }

    /// Bump a user's `last_activity`. Returns false if the user is unknown.
    pub fn update_user_activity(&mut self, user_id: &str) -> bool {
        match self.sessions.get_mut(user_id) {
            Some(session) => {
                session.last_activity = Utc::now();
                true
            }
            None => false,
        }
    }

    /// The stored session, active or not. Activity filtering is the reader's
    /// concern; a stale cross-reference must read as "unknown user", not
    /// crash.
    pub fn get_user(&self, user_id: &str) -> Option<&UserSession> {
        self.sessions.get(user_id)
    }

    /// All active sessions, most recently active first. Filters without
    /// purging.
    pub fn get_all_users(&self) -> Vec<UserSession> {
        let now = Utc::now();
        let mut users: Vec<UserSession> = self
            .sessions
            .values()
            .filter(|session| self.is_active(session, now))
            .cloned()
            .collect();
        users.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        users
    }

    /// Active sessions currently viewing a workflow.
    pub fn get_workflow_users(&self, workflow_id: &str) -> Vec<UserSession> {
        self.get_all_users()
            .into_iter()
            .filter(|session| session.workflow_id.as_deref() == Some(workflow_id))
            .collect()
    }

    /// Move a user onto (or off of) a workflow. Counts as activity.
    pub fn update_user_workflow(&mut self, user_id: &str, workflow_id: Option<WorkflowId>) -> bool {
        match self.sessions.get_mut(user_id) {
            Some(session) => {
                session.workflow_id = workflow_id;
                session.last_activity = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Shallow-merge a metadata patch into the session. Non-object values
    /// replace the stored metadata wholesale. Counts as activity.
    pub fn update_user_metadata(&mut self, user_id: &str, patch: serde_json::Value) -> bool {
        let Some(session) = self.sessions.get_mut(user_id) else {
            return false;
        };
        match (&mut session.metadata, patch) {
            (serde_json::Value::Object(stored), serde_json::Value::Object(patch)) => {
                for (key, value) in patch {
                    stored.insert(key, value);
                }
            }
            (stored, patch) => *stored = patch,
        }
        session.last_activity = Utc::now();
        true
    }

    /// Remove a session, returning it if present.
    pub fn remove_user(&mut self, user_id: &str) -> Option<UserSession> {
        self.sessions.remove(user_id)
    }

    /// Resolve a session by its socket id. Linear scan; the table is small.
    pub fn get_user_by_socket_id(&self, socket_id: &str) -> Option<&UserSession> {
        self.sessions
            .values()
            .find(|session| session.socket_id == socket_id)
    }

    /// Sweep out every session past the inactivity window, returning the
    /// evicted user ids.
    pub fn cleanup_inactive_users(&mut self) -> Vec<UserId> {
        let now = Utc::now();
        let evicted: Vec<UserId> = self
            .sessions
            .values()
            .filter(|session| !self.is_active(session, now))
            .map(|session| session.user_id.clone())
            .collect();
        for user_id in &evicted {
            self.sessions.remove(user_id);
        }
        evicted
    }

    /// Counters for the stats endpoint. Pure read, no purge.
    pub fn stats_snapshot(&self) -> PresenceStats {
        let now = Utc::now();
        let active_sessions = self
            .sessions
            .values()
            .filter(|session| self.is_active(session, now))
            .count();
        PresenceStats {
            total_sessions: self.sessions.len(),
            active_sessions,
        }
    }

    fn is_active(&self, session: &UserSession, now: Timestamp) -> bool {
        now - session.last_activity <= self.inactivity_timeout
    }
}

impl Default for PresenceTable {
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

    fn info(socket_id: &str, user_name: &str) -> UserInfo {
        UserInfo {
            socket_id: socket_id.to_string(),
            user_name: user_name.to_string(),
            email: None,
            workflow_id: None,
            metadata: empty_metadata(),
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    #[test]
    fn register_creates_session() {
        let mut table = PresenceTable::new();

        table.register_user("alice", info("sock-1", "Alice"));

        let session = table.get_user("alice").unwrap();
        assert_eq!(session.socket_id, "sock-1");
        assert_eq!(session.user_name, "Alice");
        assert_eq!(session.connected_at, session.last_activity);
    }

    #[test]
    fn reregister_overwrites_session() {
        let mut table = PresenceTable::new();
        table.register_user("alice", info("sock-1", "Alice"));

        table.register_user("alice", info("sock-2", "Alice B."));

        assert_eq!(table.get_all_users().len(), 1);
        let session = table.get_user("alice").unwrap();
        assert_eq!(session.socket_id, "sock-2");
        assert_eq!(session.user_name, "Alice B.");
    }

    // -----------------------------------------------------------------------
    // Activity
    // -----------------------------------------------------------------------

    #[test]
    fn activity_bump_is_monotonic() {
        let mut table = PresenceTable::new();
        table.register_user("alice", info("sock-1", "Alice"));
        let before = table.get_user("alice").unwrap().last_activity;

        assert!(table.update_user_activity("alice"));
        let after = table.get_user("alice").unwrap().last_activity;
        assert!(after >= before);
    }

    #[test]
    fn activity_bump_for_unknown_user_is_false() {
        let mut table = PresenceTable::new();
        assert!(!table.update_user_activity("ghost"));
    }

    #[test]
    fn inactive_sessions_are_filtered_from_lists() {
        let mut table = PresenceTable::with_timeout(Duration::milliseconds(10));
        table.register_user("alice", info("sock-1", "Alice"));
        std::thread::sleep(std::time::Duration::from_millis(20));

        assert!(table.get_all_users().is_empty());
        // The stored session is still readable directly.
        assert!(table.get_user("alice").is_some());
    }

    // -----------------------------------------------------------------------
    // Workflow association
    // -----------------------------------------------------------------------

    #[test]
    fn workflow_users_match_on_workflow_id() {
        let mut table = PresenceTable::new();
        table.register_user("alice", info("sock-1", "Alice"));
        table.register_user("bob", info("sock-2", "Bob"));

        table.update_user_workflow("alice", Some("wf-1".to_string()));
        table.update_user_workflow("bob", Some("wf-2".to_string()));

        let users = table.get_workflow_users("wf-1");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user_id, "alice");
    }

    #[test]
    fn leaving_a_workflow_clears_the_association() {
        let mut table = PresenceTable::new();
        table.register_user("alice", info("sock-1", "Alice"));
        table.update_user_workflow("alice", Some("wf-1".to_string()));

        table.update_user_workflow("alice", None);

        assert!(table.get_workflow_users("wf-1").is_empty());
    }

    // -----------------------------------------------------------------------
    // Metadata
    // -----------------------------------------------------------------------

    #[test]
    fn metadata_patch_is_shallow_merged() {
        let mut table = PresenceTable::new();
        let mut user_info = info("sock-1", "Alice");
        user_info.metadata = serde_json::json!({"color": "red", "cursor": 5});
        table.register_user("alice", user_info);

        table.update_user_metadata("alice", serde_json::json!({"cursor": 9}));

        let metadata = &table.get_user("alice").unwrap().metadata;
        assert_eq!(metadata["color"], "red");
        assert_eq!(metadata["cursor"], 9);
    }

    // -----------------------------------------------------------------------
    // Socket lookup & eviction
    // -----------------------------------------------------------------------

    #[test]
    fn socket_lookup_finds_the_session() {
        let mut table = PresenceTable::new();
        table.register_user("alice", info("sock-1", "Alice"));
        table.register_user("bob", info("sock-2", "Bob"));

        let session = table.get_user_by_socket_id("sock-2").unwrap();
        assert_eq!(session.user_id, "bob");
        assert!(table.get_user_by_socket_id("sock-9").is_none());
    }

    #[test]
    fn inactivity_sweep_evicts_and_reports() {
        let mut table = PresenceTable::with_timeout(Duration::milliseconds(10));
        table.register_user("alice", info("sock-1", "Alice"));
        std::thread::sleep(std::time::Duration::from_millis(20));
        table.register_user("bob", info("sock-2", "Bob"));

        let evicted = table.cleanup_inactive_users();
        assert_eq!(evicted, vec!["alice".to_string()]);
        assert!(table.get_user("alice").is_none());
        assert!(table.get_user("bob").is_some());
    }

    #[test]
    fn stats_distinguish_total_from_active() {
        let mut table = PresenceTable::with_timeout(Duration::milliseconds(10));
        table.register_user("alice", info("sock-1", "Alice"));
        std::thread::sleep(std::time::Duration::from_millis(20));
        table.register_user("bob", info("sock-2", "Bob"));

        let stats = table.stats_snapshot();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.active_sessions, 1);
    }
}
