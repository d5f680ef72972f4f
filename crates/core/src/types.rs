/// Workflows are keyed by opaque string identifiers supplied by the caller.
pub type WorkflowId = String;

/// Users are keyed by opaque string identifiers supplied at identification.
pub type UserId = String;

/// Edit requests are keyed by generated UUID strings.
pub type RequestId = String;

/// Socket/connection identifiers as assigned by the transport layer.
pub type SocketId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
