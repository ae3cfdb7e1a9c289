//! PARAPET execution layer.
//!
//! Module resolution is an explicit registry, not ambient process state: an
//! ordered [`ResolverChain`] of named resolvers, with the [`ImportMediator`]
//! installed at the front enforcing the capability policy, an import ceiling,
//! a resolution cache, and attribute filtering. Around the chain sits the
//! [`ContextManager`], which bounds one execution at a time with resource
//! ceilings, a wall-clock deadline on a disposable worker thread, and
//! in-memory stream capture, translating every failure into a
//! [`parapet_core::Fault`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod capture;
pub mod context;
pub mod library;
pub mod limits;
pub mod mediator;
pub mod resolver;

pub use capture::StreamCapture;
pub use context::{CancelHandle, ContextManager, ContextState, ExecutionOutcome};
pub use library::StdLibrary;
pub use limits::ExecLimits;
pub use mediator::{ImportAttempt, ImportMediator, ImportOutcome, ImportStats};
pub use resolver::{ChainError, ModuleResolver, ResolverChain, SharedChain};
