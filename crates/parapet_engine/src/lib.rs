//! PARAPET sandboxed execution engine.
//!
//! The orchestrator: per call it assembles a capability-filtered globals
//! view, hands the code to the execution context manager, extracts newly
//! bound variables from the final scope, merges them into the session store,
//! marshals them for transport, forwards artifacts, and assembles a
//! well-formed [`ExecutionResult`]. Nothing user code does propagates out of
//! [`Engine::execute`] as a Rust error.
//!
//! ```
//! use parapet_engine::{Engine, EngineConfig, ExecutionRequest};
//!
//! let mut engine = Engine::new(EngineConfig::default()).unwrap();
//! let result = engine.execute(ExecutionRequest::new("y = 42"));
//! assert!(result.success);
//! assert_eq!(result.variables["y"], serde_json::json!(42));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod marshal;
pub mod request;

pub use engine::{Engine, EngineConfig, EngineError};
pub use marshal::{
    ArtifactCapture, DiscardArtifacts, JsonMarshaler, MemoryArtifacts, ValueMarshaler,
};
pub use request::{ArtifactInfo, ExecutionRequest, ExecutionResult};
