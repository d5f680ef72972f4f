//! flowguard event bus.
//!
//! In-process publish/subscribe hub carrying coordination events (lock
//! changes, request traffic, presence transitions) from HTTP handlers, the
//! socket layer, and the maintenance sweep to whoever fans them out:
//!
//! - [`EventBus`] — hub backed by `tokio::sync::broadcast`.
//! - [`CollabEvent`] — the canonical event envelope.

pub mod bus;

pub use bus::{CollabEvent, EventBus};
