//! The orchestrator.

use crate::marshal::{ArtifactCapture, DiscardArtifacts, JsonMarshaler, ValueMarshaler};
use crate::request::{ArtifactInfo, ExecutionRequest, ExecutionResult};
use indexmap::IndexMap;
use parapet_core::{ExecutionId, SessionId};
use parapet_exec::{
    CancelHandle, ChainError, ContextManager, ContextState, ExecLimits, ImportAttempt,
    ImportMediator, ImportStats, SharedChain, StdLibrary,
};
use parapet_policy::{BuiltinPolicy, PolicyConfig, PolicyError};
use parapet_script::{Builtin, EvalError, NativeFn, Value};
use parapet_session::SessionStore;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Engine construction error
#[derive(Debug, Error)]
pub enum EngineError {
    /// The capability policy failed to compile
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// The resolver chain could not be assembled
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Engine construction parameters.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Capability policy; compiled once, immutable afterward
    pub policy: PolicyConfig,
    /// Resource ceilings
    pub limits: ExecLimits,
    /// Scratch directory for session persistence, if any
    pub scratch_dir: Option<PathBuf>,
}

impl EngineConfig {
    /// Set the capability policy
    #[must_use]
    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    /// Set the resource ceilings
    #[must_use]
    pub fn with_limits(mut self, limits: ExecLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the session scratch directory
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }
}

/// Sandboxed execution engine.
///
/// One execution at a time; callers needing concurrency serialize calls
/// externally.
pub struct Engine {
    builtins: BuiltinPolicy,
    context: ContextManager,
    mediator: ImportMediator,
    library: StdLibrary,
    sessions: SessionStore,
    marshaler: Box<dyn ValueMarshaler>,
    artifacts: Box<dyn ArtifactCapture>,
}

impl Engine {
    /// Assemble an engine: compile the policy, build the resolver chain
    /// with the standard library behind the mediator, wire up the context
    /// manager and session store.
    ///
    /// # Errors
    ///
    /// Returns error when the policy fails to compile or the chain cannot
    /// be assembled
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let (modules, builtins) = config.policy.compile()?;

        let chain = SharedChain::new();
        let library = StdLibrary::new();
        chain.install(Arc::new(library.clone()))?;
        let mediator = ImportMediator::new(modules, chain, config.limits.import_ceiling);
        mediator.install()?;

        let mut sessions = SessionStore::new();
        if let Some(dir) = config.scratch_dir {
            sessions = sessions.with_scratch_dir(dir);
        }

        info!(import_ceiling = config.limits.import_ceiling, "engine assembled");
        Ok(Self {
            builtins,
            context: ContextManager::new(config.limits, mediator.clone()),
            mediator,
            library,
            sessions,
            marshaler: Box::new(JsonMarshaler),
            artifacts: Box::new(DiscardArtifacts),
        })
    }

    /// Replace the value marshaler
    #[must_use]
    pub fn with_marshaler(mut self, marshaler: Box<dyn ValueMarshaler>) -> Self {
        self.marshaler = marshaler;
        self
    }

    /// Replace the artifact sink
    #[must_use]
    pub fn with_artifact_capture(mut self, capture: Box<dyn ArtifactCapture>) -> Self {
        self.artifacts = capture;
        self
    }

    /// Execute one request. Always returns a well-formed result; every
    /// failure mode is folded into `result.error`.
    pub fn execute(&mut self, request: ExecutionRequest) -> ExecutionResult {
        let execution_id = ExecutionId::new();
        debug!(%execution_id, session = ?request.session_id, "executing");

        // Effective globals: capability-filtered builtins, then session
        // bindings, then caller bindings, later layers shadowing earlier.
        let mut globals: IndexMap<String, Value> = IndexMap::new();
        for builtin in Builtin::full_table() {
            let name = builtin.name();
            let value = if self.builtins.is_builtin_allowed(name) {
                Value::Builtin(*builtin)
            } else {
                // A denied builtin stays bound to a guard so using it
                // reports a capability denial, not an unknown name.
                let denied = name.to_string();
                Value::Native(NativeFn::new(name, move |_: &[Value]| {
                    Err(EvalError::Forbidden(denied.clone()))
                }))
            };
            globals.insert(name.to_string(), value);
        }
        let machinery: BTreeSet<String> = globals.keys().cloned().collect();

        // A binding the script cannot represent enters as its JSON text,
        // never silently dropped.
        if let Some(id) = &request.session_id {
            for (name, json) in self.sessions.get(id) {
                let value =
                    Value::from_json(&json).unwrap_or_else(|| Value::Str(json.to_string()));
                globals.insert(name, value);
            }
        }
        for (name, json) in &request.bindings {
            let value = Value::from_json(json).unwrap_or_else(|| Value::Str(json.to_string()));
            globals.insert(name.clone(), value);
        }

        let baseline = globals.clone();
        let outcome = self
            .context
            .run(&request.code, globals, request.timeout());

        // Extract newly bound user variables: skip private names, engine
        // machinery, modules and callables, and entries the run left
        // untouched.
        let mut variables = IndexMap::new();
        for (name, value) in &outcome.scope {
            if name.starts_with('_') || machinery.contains(name) {
                continue;
            }
            if matches!(
                value,
                Value::Module(_) | Value::Native(_) | Value::Builtin(_)
            ) {
                continue;
            }
            if baseline.get(name) == Some(value) {
                continue;
            }
            variables.insert(name.clone(), self.marshaler.marshal(value));
        }

        // Session state advances only when the run succeeded.
        if outcome.fault.is_none() {
            if let Some(id) = &request.session_id {
                self.sessions.merge(id, variables.clone());
            }
        }

        let mut artifacts = Vec::new();
        for artifact in self.library.take_artifacts() {
            artifacts.push(ArtifactInfo {
                kind: artifact.kind.clone(),
                name: artifact.name.clone(),
                size_bytes: artifact.bytes.len() as u64,
            });
            self.artifacts.capture(execution_id, artifact);
        }

        ExecutionResult {
            execution_id,
            success: outcome.fault.is_none(),
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            variables,
            artifacts,
            error: outcome.fault,
            elapsed_seconds: outcome.elapsed_seconds,
            memory_bytes: outcome.memory_bytes,
        }
    }

    /// A handle for cancelling the in-flight execution from another thread
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.context.cancel_handle()
    }

    /// Current context manager state
    #[must_use]
    pub fn state(&self) -> ContextState {
        self.context.state()
    }

    /// Aggregate import counters
    #[must_use]
    pub fn import_stats(&self) -> ImportStats {
        self.mediator.stats()
    }

    /// Snapshot of the bounded import attempt log
    #[must_use]
    pub fn import_attempts(&self) -> Vec<ImportAttempt> {
        self.mediator.attempts()
    }

    /// Drop every cached module resolution
    pub fn clear_import_cache(&self) {
        self.mediator.clear_cache();
    }

    /// The session store
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Persist a session blob to the scratch directory
    ///
    /// # Errors
    ///
    /// Returns error when no scratch directory is configured or the write
    /// fails
    pub fn persist_session(&self, id: &SessionId) -> Result<(), parapet_session::SessionError> {
        self.sessions.persist(id)
    }

    /// Restore a session blob; missing or corrupt blobs yield an empty
    /// session
    pub fn restore_session(&self, id: &SessionId) {
        self.sessions.restore(id);
    }

    /// Drop a session's in-memory state
    pub fn clear_session(&self, id: &SessionId) {
        self.sessions.clear(id);
    }

    /// Drop sessions idle for longer than `max_idle`, returning how many
    /// were removed
    pub fn expire_idle_sessions(&self, max_idle: Duration) -> usize {
        self.sessions.expire_idle(max_idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parapet_core::FaultKind;

    fn engine() -> Engine {
        Engine::new(EngineConfig::default().with_limits(ExecLimits::unlimited())).unwrap()
    }

    #[test]
    fn test_simple_assignment() {
        let mut engine = engine();
        let result = engine.execute(ExecutionRequest::new("y = 42"));
        assert!(result.success);
        assert_eq!(result.variables["y"], serde_json::json!(42));
        assert!(result.error.is_none());
    }

    #[test]
    fn test_denied_builtin_is_policy_violation() {
        // A builtin outside the allowlist must read as a capability denial,
        // not as an undefined name.
        let policy = PolicyConfig::baseline().with_builtins(["len"]);
        let mut engine = Engine::new(
            EngineConfig::default()
                .with_policy(policy)
                .with_limits(ExecLimits::unlimited()),
        )
        .unwrap();
        let denied = engine.execute(ExecutionRequest::new("print(\"hi\")"));
        assert!(!denied.success);
        let error = denied.error.unwrap();
        assert_eq!(error.kind, FaultKind::PolicyViolation);
        assert!(error.message.contains("print"));
        let allowed = engine.execute(ExecutionRequest::new("n = len(\"abc\")"));
        assert!(allowed.success);
        assert_eq!(allowed.variables["n"], serde_json::json!(3));
    }

    #[test]
    fn test_misspelled_name_stays_user_error() {
        let mut engine = engine();
        let result = engine.execute(ExecutionRequest::new("x = lenn(\"abc\")"));
        assert!(!result.success);
        assert_eq!(result.error.unwrap().kind, FaultKind::UserCode);
    }

    #[test]
    fn test_caller_bindings_enter_scope() {
        let mut engine = engine();
        let result = engine.execute(
            ExecutionRequest::new("y = seed * 2").with_binding("seed", serde_json::json!(21)),
        );
        assert!(result.success);
        assert_eq!(result.variables["y"], serde_json::json!(42));
        // The unchanged input binding itself is not re-reported.
        assert!(!result.variables.contains_key("seed"));
    }

    #[test]
    fn test_unrepresentable_binding_enters_as_text() {
        let mut engine = engine();
        let result = engine.execute(
            ExecutionRequest::new("kind = config")
                .with_binding("config", serde_json::json!({"mode": "fast"})),
        );
        assert!(result.success, "unexpected fault: {:?}", result.error);
        let rendered = result.variables["kind"].as_str().unwrap();
        assert!(rendered.contains("mode"));
    }

    #[test]
    fn test_underscore_names_not_extracted() {
        let mut engine = engine();
        let result = engine.execute(ExecutionRequest::new("_tmp = 1\nx = 2"));
        assert!(result.success);
        assert!(!result.variables.contains_key("_tmp"));
        assert_eq!(result.variables["x"], serde_json::json!(2));
    }

    #[test]
    fn test_modules_not_extracted() {
        let mut engine = engine();
        let result = engine.execute(ExecutionRequest::new("import math\nx = math.pi"));
        assert!(result.success);
        assert!(!result.variables.contains_key("math"));
        assert!(result.variables.contains_key("x"));
    }

    #[test]
    fn test_artifacts_forwarded() {
        let policy = PolicyConfig::baseline().allow_all("canvas");
        let mut engine = Engine::new(
            EngineConfig::default()
                .with_policy(policy)
                .with_limits(ExecLimits::unlimited()),
        )
        .unwrap();
        let result = engine.execute(ExecutionRequest::new(
            "import canvas\ncanvas.draw(\"chart\", \"payload\")",
        ));
        assert!(result.success);
        assert_eq!(result.artifacts.len(), 1);
        assert_eq!(result.artifacts[0].name, "chart");
        assert_eq!(result.artifacts[0].kind, "figure");
        assert_eq!(result.artifacts[0].size_bytes, 7);
    }

    #[test]
    fn test_import_stats_visible() {
        let mut engine = engine();
        engine.execute(ExecutionRequest::new("import math"));
        engine.execute(ExecutionRequest::new("import math"));
        let stats = engine.import_stats();
        assert_eq!(stats.allowed, 1);
        assert_eq!(stats.cached, 1);
        engine.clear_import_cache();
        engine.execute(ExecutionRequest::new("import math"));
        assert_eq!(engine.import_stats().allowed, 2);
    }
}
