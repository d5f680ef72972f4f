//! flowguard coordination core.
//!
//! Everything that carries an invariant lives here: the exclusive workflow
//! [`locks::LockTable`], the [`presence::PresenceTable`] tying users to their
//! sockets, the [`requests::RequestLedger`] state machine for edit requests,
//! and the [`coordinator::Coordinator`] that sequences cross-table effects.
//! The crate performs no I/O; the API layer consumes it through the
//! coordinator and broadcasts whatever it returns.

pub mod coordinator;
pub mod error;
pub mod locks;
pub mod presence;
pub mod protocol;
pub mod requests;
pub mod types;
