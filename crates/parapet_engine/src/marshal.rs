//! External collaborator seams.
//!
//! The engine never decides what a transported value or artifact looks like;
//! it forwards to these traits. The bundled implementations cover callers
//! with no custom transport: JSON marshaling with a textual fallback, and
//! in-memory or discarding artifact sinks.

use parapet_core::ExecutionId;
use parapet_script::{RawArtifact, Value};
use std::sync::Mutex;

/// Converts runtime values into transport-safe descriptions.
pub trait ValueMarshaler: Send + Sync {
    /// Describe one value. Must always produce something; a value with no
    /// natural representation is rendered textually, never dropped.
    fn marshal(&self, value: &Value) -> serde_json::Value;
}

/// JSON marshaler: native JSON where the value is representable, the
/// value's textual rendering otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonMarshaler;

impl ValueMarshaler for JsonMarshaler {
    fn marshal(&self, value: &Value) -> serde_json::Value {
        value
            .to_json()
            .unwrap_or_else(|| serde_json::Value::String(value.repr()))
    }
}

/// Receives artifacts produced during executions.
pub trait ArtifactCapture: Send + Sync {
    /// Take ownership of one artifact
    fn capture(&self, execution: ExecutionId, artifact: RawArtifact);
}

/// Sink that drops every artifact.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardArtifacts;

impl ArtifactCapture for DiscardArtifacts {
    fn capture(&self, _execution: ExecutionId, _artifact: RawArtifact) {}
}

/// Sink that keeps artifacts in memory until drained.
#[derive(Debug, Default)]
pub struct MemoryArtifacts {
    inner: Mutex<Vec<(ExecutionId, RawArtifact)>>,
}

impl MemoryArtifacts {
    /// Build an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything captured so far
    #[must_use]
    pub fn take(&self) -> Vec<(ExecutionId, RawArtifact)> {
        std::mem::take(&mut *self.inner.lock().unwrap())
    }
}

impl ArtifactCapture for MemoryArtifacts {
    fn capture(&self, execution: ExecutionId, artifact: RawArtifact) {
        self.inner.lock().unwrap().push((execution, artifact));
    }
}
