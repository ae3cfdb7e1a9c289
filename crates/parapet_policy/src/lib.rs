//! Capability policy for PARAPET.
//!
//! Immutable allow/deny tables governing which modules and builtin symbols
//! sandboxed code may reach. Default-deny: anything not explicitly allowed
//! is blocked, and denying a package implicitly denies its submodules.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builtin;
pub mod config;
pub mod module;

pub use builtin::BuiltinPolicy;
pub use config::{PolicyConfig, PolicyError};
pub use module::{AttributeSet, ModulePolicy};
