//! WebSocket session protocol.
//!
//! Messages exchanged on the presence socket, serialized as JSON with an
//! internally-tagged `"type"` discriminator so clients can route by type
//! string. Coordination events (lock changes, request traffic) reach clients
//! through the event fan-out, not through this enum; this covers only the
//! session channel itself.

use serde::{Deserialize, Serialize};

use crate::types::{SocketId, Timestamp, UserId, WorkflowId};

/// Messages on the presence socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum SessionMessage {
    /// Client sends: bind this connection to a user.
    #[serde(rename = "session.identify")]
    Identify {
        user_id: UserId,
        user_name: String,
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        workflow_id: Option<WorkflowId>,
        #[serde(default)]
        metadata: Option<serde_json::Value>,
    },

    /// Client sends: keep-alive / activity ping.
    #[serde(rename = "session.activity")]
    Activity,

    /// Client sends: user is now viewing this workflow.
    #[serde(rename = "workflow.join")]
    WorkflowJoin { workflow_id: WorkflowId },

    /// Client sends: user is no longer viewing any workflow.
    #[serde(rename = "workflow.leave")]
    WorkflowLeave,

    /// Server sends: identification accepted; echoes the bound ids.
    #[serde(rename = "session.identified")]
    Identified {
        user_id: UserId,
        socket_id: SocketId,
    },

    /// Server sends: the last client message was rejected.
    #[serde(rename = "session.error")]
    Error { code: String, message: String },

    /// Server sends: updated list of users viewing a workflow.
    #[serde(rename = "workflow.users")]
    WorkflowUsers {
        workflow_id: WorkflowId,
        users: Vec<WorkflowUser>,
    },
}

/// A user entry in a workflow roster broadcast.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowUser {
    pub user_id: UserId,
    pub user_name: String,
    pub last_activity: Timestamp,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identify_round_trips() {
        let msg = SessionMessage::Identify {
            user_id: "alice".to_string(),
            user_name: "Alice".to_string(),
            email: None,
            workflow_id: Some("wf-1".to_string()),
            metadata: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"session.identify"#));

        let deserialized: SessionMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, deserialized);
    }

    #[test]
    fn identify_optional_fields_default() {
        let json = r#"{"type":"session.identify","user_id":"bob","user_name":"Bob"}"#;
        let msg: SessionMessage = serde_json::from_str(json).unwrap();
        match msg {
            SessionMessage::Identify {
                email, workflow_id, ..
            } => {
                assert!(email.is_none());
                assert!(workflow_id.is_none());
            }
            other => panic!("Expected Identify, got: {other:?}"),
        }
    }

    #[test]
    fn activity_is_a_bare_tag() {
        let msg: SessionMessage = serde_json::from_str(r#"{"type":"session.activity"}"#).unwrap();
        assert_eq!(msg, SessionMessage::Activity);
    }

    #[test]
    fn workflow_join_round_trips() {
        let msg = SessionMessage::WorkflowJoin {
            workflow_id: "wf-7".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"workflow.join"#));

        let deserialized: SessionMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, deserialized);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result = serde_json::from_str::<SessionMessage>(r#"{"type":"session.unknown"}"#);
        assert!(result.is_err());
    }
}
