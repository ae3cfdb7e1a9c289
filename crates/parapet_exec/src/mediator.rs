//! Import mediation.
//!
//! The mediator is itself a chain entry, installed at the front so every
//! import passes through it first. Resolution order: import ceiling, policy
//! consult, cache, delegate to the rest of the chain (self excluded by name,
//! so recursive self-dispatch is structurally impossible), attribute filter,
//! cache. A name allowed only via a dotted prefix inherits that prefix's
//! attribute restriction, never wildcard.

use crate::resolver::{ChainError, ModuleResolver, SharedChain};
use parapet_core::Timestamp;
use parapet_policy::{AttributeSet, ModulePolicy};
use parapet_script::{ImportError, Importer, Module};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// How an import attempt was disposed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportOutcome {
    /// Resolved and admitted
    Allowed,
    /// Denied by policy
    Blocked,
    /// Served from the resolution cache
    Cached,
}

/// One recorded import attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportAttempt {
    /// Requested dotted module name
    pub module: String,
    /// Disposition
    pub outcome: ImportOutcome,
    /// When the attempt was made
    pub at: Timestamp,
}

/// Aggregate import counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    /// Total mediated attempts
    pub attempted: u64,
    /// Attempts admitted via full resolution
    pub allowed: u64,
    /// Attempts denied by policy
    pub blocked: u64,
    /// Attempts served from cache
    pub cached: u64,
}

#[derive(Default)]
struct MediatorState {
    execution_count: u32,
    cache: indexmap::IndexMap<String, Module>,
    attempts: VecDeque<ImportAttempt>,
    stats: ImportStats,
}

/// Policy-enforcing front entry of the resolution chain.
///
/// Cheaply cloneable; clones share counters, cache, and attempt log.
#[derive(Clone)]
pub struct ImportMediator {
    policy: Arc<ModulePolicy>,
    chain: SharedChain,
    ceiling: u32,
    max_attempts: usize,
    state: Arc<Mutex<MediatorState>>,
}

impl ImportMediator {
    /// Chain entry name
    pub const NAME: &'static str = "mediator";

    /// Attempt log bound; oldest entries are evicted past it
    pub const DEFAULT_ATTEMPT_LOG: usize = 64;

    /// Build a mediator over a policy and a chain to delegate into
    #[must_use]
    pub fn new(policy: ModulePolicy, chain: SharedChain, ceiling: u32) -> Self {
        Self {
            policy: Arc::new(policy),
            chain,
            ceiling,
            max_attempts: Self::DEFAULT_ATTEMPT_LOG,
            state: Arc::new(Mutex::new(MediatorState::default())),
        }
    }

    /// Override the attempt log bound
    #[must_use]
    pub fn with_attempt_log(mut self, max: usize) -> Self {
        self.max_attempts = max;
        self
    }

    /// Install this mediator at the front of its chain
    ///
    /// # Errors
    ///
    /// Returns error if a mediator is already installed
    pub fn install(&self) -> Result<(), ChainError> {
        self.chain.install(Arc::new(self.clone()))
    }

    /// Remove this mediator from its chain. Succeeds exactly once.
    ///
    /// # Errors
    ///
    /// Returns error if the mediator is not installed
    pub fn uninstall(&self) -> Result<(), ChainError> {
        self.chain.remove(Self::NAME).map(|_| ())
    }

    /// Mediate one import.
    ///
    /// # Errors
    ///
    /// Returns error on ceiling overrun, policy denial, an unknown module,
    /// or a downstream resolver failure
    pub fn mediate(&self, name: &str) -> Result<Module, ImportError> {
        {
            let mut state = self.state.lock().unwrap();
            state.stats.attempted += 1;
            state.execution_count += 1;
            if state.execution_count > self.ceiling {
                warn!(module = %name, ceiling = self.ceiling, "import ceiling exceeded");
                return Err(ImportError::LimitExceeded {
                    limit: self.ceiling,
                });
            }

            if !self.policy.is_module_allowed(name) {
                state.stats.blocked += 1;
                Self::record(&mut state, self.max_attempts, name, ImportOutcome::Blocked);
                warn!(module = %name, "import denied by policy");
                return Err(ImportError::Denied {
                    name: name.to_string(),
                });
            }

            if let Some(cached) = state.cache.get(name).cloned() {
                state.stats.cached += 1;
                Self::record(&mut state, self.max_attempts, name, ImportOutcome::Cached);
                return Ok(cached);
            }
        }

        // Lock released while delegating; downstream resolvers must not
        // re-enter the mediator (the walk excludes it by name).
        let resolved = self
            .chain
            .resolve_excluding(Self::NAME, name)?
            .ok_or_else(|| ImportError::NotFound {
                name: name.to_string(),
            })?;

        let filtered = match self.policy.allowed_attributes(name) {
            Some(AttributeSet::Wildcard) | None => resolved,
            Some(set) => {
                let set = set.clone();
                resolved.restricted(|attr| set.exposes(attr))
            }
        };

        let mut state = self.state.lock().unwrap();
        state.cache.insert(name.to_string(), filtered.clone());
        state.stats.allowed += 1;
        Self::record(&mut state, self.max_attempts, name, ImportOutcome::Allowed);
        debug!(module = %name, "import admitted");
        Ok(filtered)
    }

    fn record(state: &mut MediatorState, max: usize, module: &str, outcome: ImportOutcome) {
        if state.attempts.len() >= max {
            state.attempts.pop_front();
        }
        state.attempts.push_back(ImportAttempt {
            module: module.to_string(),
            outcome,
            at: Timestamp::now(),
        });
    }

    /// Aggregate counters
    #[must_use]
    pub fn stats(&self) -> ImportStats {
        self.state.lock().unwrap().stats
    }

    /// Snapshot of the bounded attempt log, oldest first
    #[must_use]
    pub fn attempts(&self) -> Vec<ImportAttempt> {
        self.state.lock().unwrap().attempts.iter().cloned().collect()
    }

    /// Drop every cached resolution, forcing re-resolution
    pub fn clear_cache(&self) {
        self.state.lock().unwrap().cache.clear();
    }

    /// Reset the execution-scoped import counter. Called by the context
    /// manager before each run.
    pub fn reset_counters(&self) {
        self.state.lock().unwrap().execution_count = 0;
    }

    /// The configured per-execution import ceiling
    #[must_use]
    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }
}

impl ModuleResolver for ImportMediator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn resolve(&self, module: &str) -> Result<Option<Module>, ImportError> {
        self.mediate(module).map(Some)
    }
}

impl Importer for ImportMediator {
    fn resolve(&mut self, name: &str) -> Result<Module, ImportError> {
        self.mediate(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parapet_policy::PolicyConfig;
    use parapet_script::Value;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingResolver {
        calls: Arc<AtomicU32>,
    }

    impl ModuleResolver for CountingResolver {
        fn name(&self) -> &str {
            "counting"
        }

        fn resolve(&self, module: &str) -> Result<Option<Module>, ImportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match module {
                "math" => Ok(Some(
                    Module::new("math")
                        .with_attr("pi", Value::Float(3.14))
                        .with_attr("internal", Value::Int(0)),
                )),
                "strings" => Ok(Some(
                    Module::new("strings")
                        .with_attr("upper", Value::Int(1))
                        .with_attr("shell", Value::Int(2)),
                )),
                _ => Ok(None),
            }
        }
    }

    fn setup(ceiling: u32) -> (ImportMediator, Arc<AtomicU32>) {
        let (modules, _) = PolicyConfig::baseline().compile().unwrap();
        let chain = SharedChain::new();
        let calls = Arc::new(AtomicU32::new(0));
        chain
            .install(Arc::new(CountingResolver {
                calls: Arc::clone(&calls),
            }))
            .unwrap();
        let mediator = ImportMediator::new(modules, chain, ceiling);
        mediator.install().unwrap();
        (mediator, calls)
    }

    #[test]
    fn test_allowed_module_resolves() {
        let (mediator, _) = setup(10);
        let module = mediator.mediate("math").unwrap();
        assert_eq!(module.attr("pi"), Some(&Value::Float(3.14)));
        assert_eq!(mediator.stats().allowed, 1);
    }

    #[test]
    fn test_denied_never_reaches_chain() {
        let (mediator, calls) = setup(10);
        let err = mediator.mediate("os").unwrap_err();
        assert!(matches!(err, ImportError::Denied { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(mediator.stats().blocked, 1);
    }

    #[test]
    fn test_cache_hit_on_second_resolve() {
        let (mediator, calls) = setup(10);
        mediator.mediate("math").unwrap();
        mediator.mediate("math").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = mediator.stats();
        assert_eq!(stats.allowed, 1);
        assert_eq!(stats.cached, 1);
    }

    #[test]
    fn test_clear_cache_forces_re_resolution() {
        let (mediator, calls) = setup(10);
        mediator.mediate("math").unwrap();
        mediator.clear_cache();
        mediator.mediate("math").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_ceiling_and_reset() {
        let (mediator, _) = setup(2);
        mediator.mediate("math").unwrap();
        mediator.mediate("math").unwrap();
        let err = mediator.mediate("math").unwrap_err();
        assert!(matches!(err, ImportError::LimitExceeded { limit: 2 }));
        mediator.reset_counters();
        mediator.mediate("math").unwrap();
    }

    #[test]
    fn test_attribute_filter_restricts_view() {
        let (mediator, _) = setup(10);
        // Baseline allows strings with an explicit attribute list.
        let module = mediator.mediate("strings").unwrap();
        assert!(module.attr("upper").is_some());
        assert!(module.attr("shell").is_none());
    }

    #[test]
    fn test_wildcard_passes_through() {
        let (mediator, _) = setup(10);
        let module = mediator.mediate("math").unwrap();
        assert!(module.attr("internal").is_some());
    }

    #[test]
    fn test_unknown_module_not_found() {
        let (mediator, _) = setup(10);
        // "clock" is allowed by baseline but the counting resolver does not
        // provide it.
        let err = mediator.mediate("clock").unwrap_err();
        assert!(matches!(err, ImportError::NotFound { .. }));
    }

    #[test]
    fn test_attempt_log_bounded() {
        let (mediator, _) = setup(100);
        let mediator = mediator.with_attempt_log(3);
        for _ in 0..5 {
            mediator.mediate("math").unwrap();
        }
        let attempts = mediator.attempts();
        assert_eq!(attempts.len(), 3);
        assert!(attempts.iter().all(|a| a.module == "math"));
    }

    #[test]
    fn test_uninstall_exactly_once() {
        let (mediator, _) = setup(10);
        mediator.uninstall().unwrap();
        assert!(mediator.uninstall().is_err());
    }
}
