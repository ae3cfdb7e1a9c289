//! Resource ceilings.

use parapet_script::EvalConfig;
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Smallest memory ceiling the evaluator's accounting granularity can
/// honor; anything below it is skipped with a warning.
const MIN_MEMORY_CEILING: u64 = 1024;

/// Resource ceilings for one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecLimits {
    /// Approximate accounted memory ceiling in bytes, `None` for unlimited
    pub memory_bytes: Option<u64>,
    /// Evaluator operation budget (the CPU ceiling), `None` for unlimited
    pub op_budget: Option<u64>,
    /// Captured output ceiling in bytes, `None` for unlimited
    pub output_bytes: Option<u64>,
    /// Per-execution import ceiling
    pub import_ceiling: u32,
    /// Default wall-clock timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for ExecLimits {
    fn default() -> Self {
        Self {
            memory_bytes: Some(32 * 1024 * 1024),
            op_budget: Some(2_000_000),
            output_bytes: Some(128 * 1024),
            import_ceiling: 25,
            timeout_ms: 5_000,
        }
    }
}

impl ExecLimits {
    /// Ceilings suitable for tests: everything unlimited, generous timeout
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            memory_bytes: None,
            op_budget: None,
            output_bytes: None,
            import_ceiling: u32::MAX,
            timeout_ms: 60_000,
        }
    }

    /// Set the memory ceiling
    #[must_use]
    pub fn with_memory_bytes(mut self, bytes: u64) -> Self {
        self.memory_bytes = Some(bytes);
        self
    }

    /// Set the operation budget
    #[must_use]
    pub fn with_op_budget(mut self, ops: u64) -> Self {
        self.op_budget = Some(ops);
        self
    }

    /// Set the output ceiling
    #[must_use]
    pub fn with_output_bytes(mut self, bytes: u64) -> Self {
        self.output_bytes = Some(bytes);
        self
    }

    /// Set the import ceiling
    #[must_use]
    pub fn with_import_ceiling(mut self, ceiling: u32) -> Self {
        self.import_ceiling = ceiling;
        self
    }

    /// Set the default wall-clock timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// The default wall-clock timeout
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The wall-clock deadline for one call: a per-call timeout tightens
    /// but never loosens the configured default.
    #[must_use]
    pub fn effective_timeout(&self, per_call: Option<Duration>) -> Duration {
        let default = self.default_timeout();
        match per_call {
            Some(requested) => requested.min(default),
            None => default,
        }
    }

    /// Build the evaluator bounds. A ceiling the evaluator cannot honor is
    /// logged and skipped, never fatal.
    #[must_use]
    pub fn eval_config(&self, cancel: Arc<AtomicBool>) -> EvalConfig {
        let mut config = EvalConfig::default().with_cancel(cancel);
        if let Some(ops) = self.op_budget {
            config.cost_budget = Some(ops);
        }
        match self.memory_bytes {
            Some(bytes) if bytes < MIN_MEMORY_CEILING => {
                warn!(
                    requested = bytes,
                    floor = MIN_MEMORY_CEILING,
                    "memory ceiling below accounting granularity, skipping"
                );
            }
            Some(bytes) => config.memory_limit = Some(bytes),
            None => {}
        }
        config
    }
}
