//! HTTP handlers. Thin adapters over the coordinator: validate input, call
//! the core, publish the resulting event, return the envelope.

pub mod locks;
pub mod presence;
pub mod requests;
pub mod stats;
