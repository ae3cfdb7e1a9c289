//! PARAPET Core Types
//!
//! Shared identifiers, the fault taxonomy, and time helpers used across the
//! sandbox crates. This crate contains pure types with no I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fault;
pub mod id;
pub mod time;

// Re-exports
pub use fault::{Fault, FaultKind};
pub use id::{ExecutionId, SessionId};
pub use time::{elapsed_seconds, Timestamp};
