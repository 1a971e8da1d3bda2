//! # Session Service
//!
//! The driver task and command mailbox that serialize all activity on one
//! connection into a single event-ordered execution context.

pub mod session;

pub use session::{spawn, SessionCommand, SessionHandle};
