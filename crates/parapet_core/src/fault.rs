//! Fault taxonomy for sandboxed execution.
//!
//! Every failure a call can experience is folded into a [`Fault`] descriptor
//! carried inside the execution result. Nothing in the engine propagates a
//! user-code failure as a Rust error past the orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of a fault, distinguishable by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    /// A disallowed module or builtin was reached for. Never retried.
    PolicyViolation,

    /// A memory or output ceiling was hit. Execution aborted, session kept.
    ResourceExceeded,

    /// The wall-clock deadline or CPU budget expired.
    Timeout,

    /// The executed code itself raised a fault.
    UserCode,

    /// The sandbox machinery degraded or failed (ceiling install, corrupt
    /// session store). Logged; fatal only when safety cannot be guaranteed.
    Infrastructure,
}

impl FaultKind {
    /// Whether a caller may reasonably retry the same submission.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Infrastructure)
    }

    /// Stable string name, used in transport payloads
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PolicyViolation => "PolicyViolation",
            Self::ResourceExceeded => "ResourceExceeded",
            Self::Timeout => "Timeout",
            Self::UserCode => "UserCodeError",
            Self::Infrastructure => "InfrastructureError",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A translated fault: kind, human-readable message, formatted trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    /// Fault category
    pub kind: FaultKind,
    /// Human-readable message
    pub message: String,
    /// Formatted trace of where the fault arose (may be empty)
    pub trace: String,
}

impl Fault {
    /// Create a fault with an empty trace
    #[must_use]
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            trace: String::new(),
        }
    }

    /// Attach a formatted trace
    #[must_use]
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = trace.into();
        self
    }

    /// Shorthand for a policy violation
    #[must_use]
    pub fn policy(message: impl Into<String>) -> Self {
        Self::new(FaultKind::PolicyViolation, message)
    }

    /// Shorthand for a resource ceiling fault
    #[must_use]
    pub fn resource(message: impl Into<String>) -> Self {
        Self::new(FaultKind::ResourceExceeded, message)
    }

    /// Shorthand for a timeout fault
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Timeout, message)
    }

    /// Shorthand for a user-code fault
    #[must_use]
    pub fn user(message: impl Into<String>) -> Self {
        Self::new(FaultKind::UserCode, message)
    }

    /// Shorthand for an infrastructure fault
    #[must_use]
    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Infrastructure, message)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Fault {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_display() {
        let fault = Fault::user("division by zero");
        assert_eq!(format!("{}", fault), "UserCodeError: division by zero");
    }

    #[test]
    fn test_fault_kind_names() {
        assert_eq!(FaultKind::PolicyViolation.name(), "PolicyViolation");
        assert_eq!(FaultKind::Timeout.name(), "Timeout");
        assert_eq!(FaultKind::UserCode.name(), "UserCodeError");
    }

    #[test]
    fn test_retryable_partition() {
        assert!(FaultKind::Timeout.is_retryable());
        assert!(FaultKind::Infrastructure.is_retryable());
        assert!(!FaultKind::PolicyViolation.is_retryable());
        assert!(!FaultKind::ResourceExceeded.is_retryable());
        assert!(!FaultKind::UserCode.is_retryable());
    }

    #[test]
    fn test_fault_with_trace() {
        let fault = Fault::user("boom").with_trace("line 3: x = 1 / 0");
        assert!(fault.trace.contains("line 3"));
    }

    #[test]
    fn test_fault_serde_roundtrip() {
        let fault = Fault::policy("import of 'os' is not allowed");
        let json = serde_json::to_string(&fault).unwrap();
        let back: Fault = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fault);
    }
}
