//! Session state store.
//!
//! A session is a caller-scoped, insertion-ordered set of named bindings
//! carried across executions. The store keeps sessions in memory, persists
//! them as opaque serde_json blobs under a scratch directory, and treats a
//! missing or corrupt blob as "no prior session" rather than an error.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod store;

pub use store::{SessionError, SessionState, SessionStore};
