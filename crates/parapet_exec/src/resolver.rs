//! Explicit module resolver registry.
//!
//! The resolution chain is an ordered list of named resolvers owned by the
//! engine. Install prepends; a resolver earlier in the chain answers first.
//! Duplicate names are rejected and removal succeeds exactly once, so a
//! resolver cannot be interposed or torn down twice.

use parapet_script::{ImportError, Module};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::debug;

/// Registry error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// A resolver with this name is already installed
    #[error("resolver '{name}' is already installed")]
    AlreadyInstalled {
        /// The duplicated name
        name: String,
    },

    /// No resolver with this name is installed
    #[error("resolver '{name}' is not installed")]
    NotInstalled {
        /// The missing name
        name: String,
    },
}

/// A named entry in the resolution chain.
pub trait ModuleResolver: Send + Sync {
    /// Unique name within a chain
    fn name(&self) -> &str;

    /// Try to resolve a dotted module name. `Ok(None)` means this resolver
    /// does not provide the module and the walk continues.
    ///
    /// # Errors
    ///
    /// Returns error when the resolver claims the module but fails to
    /// produce it
    fn resolve(&self, module: &str) -> Result<Option<Module>, ImportError>;
}

impl std::fmt::Debug for dyn ModuleResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleResolver")
            .field("name", &self.name())
            .finish()
    }
}

/// Ordered list of named resolvers.
#[derive(Default)]
pub struct ResolverChain {
    entries: Vec<Arc<dyn ModuleResolver>>,
}

impl ResolverChain {
    /// Build an empty chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a resolver at the front of the chain
    ///
    /// # Errors
    ///
    /// Returns error if a resolver with the same name is already installed
    pub fn install(&mut self, resolver: Arc<dyn ModuleResolver>) -> Result<(), ChainError> {
        let name = resolver.name().to_string();
        if self.entries.iter().any(|e| e.name() == name) {
            return Err(ChainError::AlreadyInstalled { name });
        }
        debug!(resolver = %name, "installing resolver");
        self.entries.insert(0, resolver);
        Ok(())
    }

    /// Remove a resolver by name
    ///
    /// # Errors
    ///
    /// Returns error if no resolver with that name is installed; a second
    /// removal of the same name therefore fails
    pub fn remove(&mut self, name: &str) -> Result<Arc<dyn ModuleResolver>, ChainError> {
        let position = self
            .entries
            .iter()
            .position(|e| e.name() == name)
            .ok_or_else(|| ChainError::NotInstalled {
                name: name.to_string(),
            })?;
        debug!(resolver = %name, "removing resolver");
        Ok(self.entries.remove(position))
    }

    /// Walk the chain front to back; first resolver to answer wins
    ///
    /// # Errors
    ///
    /// Propagates the first resolver failure
    pub fn resolve(&self, module: &str) -> Result<Option<Module>, ImportError> {
        self.resolve_excluding("", module)
    }

    /// Walk the chain skipping the named entry. Used by the mediator to
    /// delegate without dispatching back to itself.
    ///
    /// # Errors
    ///
    /// Propagates the first resolver failure
    pub fn resolve_excluding(
        &self,
        skip: &str,
        module: &str,
    ) -> Result<Option<Module>, ImportError> {
        for entry in &self.entries {
            if entry.name() == skip {
                continue;
            }
            if let Some(resolved) = entry.resolve(module)? {
                return Ok(Some(resolved));
            }
        }
        Ok(None)
    }

    /// Installed resolver names, front to back
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name().to_string()).collect()
    }

    /// Whether a resolver with this name is installed
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name() == name)
    }

    /// Number of installed resolvers
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the chain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Thread-safe shared handle over a [`ResolverChain`].
#[derive(Clone, Default)]
pub struct SharedChain {
    inner: Arc<RwLock<ResolverChain>>,
}

impl SharedChain {
    /// Build a shared handle over an empty chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a resolver at the front
    ///
    /// # Errors
    ///
    /// Returns error on a duplicate name
    pub fn install(&self, resolver: Arc<dyn ModuleResolver>) -> Result<(), ChainError> {
        self.inner.write().unwrap().install(resolver)
    }

    /// Remove a resolver by name
    ///
    /// # Errors
    ///
    /// Returns error if the name is not installed
    pub fn remove(&self, name: &str) -> Result<Arc<dyn ModuleResolver>, ChainError> {
        self.inner.write().unwrap().remove(name)
    }

    /// Walk the chain
    ///
    /// # Errors
    ///
    /// Propagates the first resolver failure
    pub fn resolve(&self, module: &str) -> Result<Option<Module>, ImportError> {
        self.inner.read().unwrap().resolve(module)
    }

    /// Walk the chain skipping the named entry
    ///
    /// # Errors
    ///
    /// Propagates the first resolver failure
    pub fn resolve_excluding(
        &self,
        skip: &str,
        module: &str,
    ) -> Result<Option<Module>, ImportError> {
        self.inner.read().unwrap().resolve_excluding(skip, module)
    }

    /// Installed resolver names, front to back
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.inner.read().unwrap().names()
    }

    /// Whether a resolver with this name is installed
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().unwrap().contains(name)
    }

    /// Number of installed resolvers
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    /// Whether the chain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parapet_script::Value;

    struct TableResolver {
        name: String,
        modules: Vec<String>,
    }

    impl TableResolver {
        fn new(name: &str, modules: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                modules: modules.iter().map(|s| s.to_string()).collect(),
            })
        }
    }

    impl ModuleResolver for TableResolver {
        fn name(&self) -> &str {
            &self.name
        }

        fn resolve(&self, module: &str) -> Result<Option<Module>, ImportError> {
            if self.modules.iter().any(|m| m == module) {
                Ok(Some(
                    Module::new(module).with_attr("origin", Value::Str(self.name.clone())),
                ))
            } else {
                Ok(None)
            }
        }
    }

    #[test]
    fn test_install_prepends() {
        let mut chain = ResolverChain::new();
        chain.install(TableResolver::new("a", &[])).unwrap();
        chain.install(TableResolver::new("b", &[])).unwrap();
        assert_eq!(chain.names(), vec!["b", "a"]);
    }

    #[test]
    fn test_duplicate_install_rejected() {
        let mut chain = ResolverChain::new();
        chain.install(TableResolver::new("a", &[])).unwrap();
        let err = chain.install(TableResolver::new("a", &[])).unwrap_err();
        assert!(matches!(err, ChainError::AlreadyInstalled { name } if name == "a"));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_remove_exactly_once() {
        let mut chain = ResolverChain::new();
        chain.install(TableResolver::new("a", &[])).unwrap();
        chain.remove("a").unwrap();
        let err = chain.remove("a").unwrap_err();
        assert!(matches!(err, ChainError::NotInstalled { .. }));
    }

    #[test]
    fn test_front_entry_answers_first() {
        let mut chain = ResolverChain::new();
        chain.install(TableResolver::new("back", &["math"])).unwrap();
        chain.install(TableResolver::new("front", &["math"])).unwrap();
        let module = chain.resolve("math").unwrap().unwrap();
        assert_eq!(
            module.attr("origin"),
            Some(&Value::Str("front".to_string()))
        );
    }

    #[test]
    fn test_resolve_excluding_skips() {
        let mut chain = ResolverChain::new();
        chain.install(TableResolver::new("back", &["math"])).unwrap();
        chain.install(TableResolver::new("front", &["math"])).unwrap();
        let module = chain.resolve_excluding("front", "math").unwrap().unwrap();
        assert_eq!(module.attr("origin"), Some(&Value::Str("back".to_string())));
    }

    #[test]
    fn test_no_answer_is_none() {
        let mut chain = ResolverChain::new();
        chain.install(TableResolver::new("a", &["math"])).unwrap();
        assert!(chain.resolve("plot").unwrap().is_none());
    }

    #[test]
    fn test_shared_chain() {
        let chain = SharedChain::new();
        chain.install(TableResolver::new("a", &["math"])).unwrap();
        let clone = chain.clone();
        assert!(clone.contains("a"));
        assert!(clone.resolve("math").unwrap().is_some());
        clone.remove("a").unwrap();
        assert!(chain.is_empty());
    }
}
