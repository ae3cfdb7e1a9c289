//! Request and response types.

use parapet_core::{ExecutionId, Fault, SessionId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One code submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Source text to execute
    pub code: String,
    /// Session the execution belongs to, if any
    #[serde(default)]
    pub session_id: Option<SessionId>,
    /// Caller-supplied input bindings, installed into the globals view
    #[serde(default)]
    pub bindings: indexmap::IndexMap<String, serde_json::Value>,
    /// Per-call timeout in milliseconds; tightens but never loosens the
    /// engine's configured default
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ExecutionRequest {
    /// Build a request for a code submission
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            session_id: None,
            bindings: indexmap::IndexMap::new(),
            timeout_ms: None,
        }
    }

    /// Attach the request to a session
    #[must_use]
    pub fn with_session(mut self, id: impl Into<SessionId>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Add an input binding
    #[must_use]
    pub fn with_binding(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }

    /// Request a tighter per-call timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// The per-call timeout, if requested
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Description of one artifact produced during an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    /// Artifact kind, e.g. `"figure"`
    pub kind: String,
    /// Display name
    pub name: String,
    /// Payload size in bytes
    pub size_bytes: u64,
}

/// The structured result every execution produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    /// Identifier of this execution
    pub execution_id: ExecutionId,
    /// Whether the code ran to completion without fault
    pub success: bool,
    /// Captured stdout, partial on abort
    pub stdout: String,
    /// Captured stderr, partial on abort
    pub stderr: String,
    /// Newly bound variables, marshaled for transport
    pub variables: indexmap::IndexMap<String, serde_json::Value>,
    /// Artifacts produced during the run
    pub artifacts: Vec<ArtifactInfo>,
    /// The fault that ended the run, `None` on success
    pub error: Option<Fault>,
    /// Wall-clock duration in fractional seconds
    pub elapsed_seconds: f64,
    /// Peak accounted memory in bytes
    pub memory_bytes: u64,
}
