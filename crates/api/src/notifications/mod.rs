//! Notification routing infrastructure.
//!
//! The [`NotificationRouter`] subscribes to the event bus and delivers
//! coordination events to clients over WebSocket.

pub mod router;

pub use router::NotificationRouter;
