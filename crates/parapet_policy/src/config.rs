//! Serde-loadable policy configuration.
//!
//! The wire shape maps dotted module names to either the wildcard marker
//! `"*"` or an explicit attribute list, alongside a deny list and a builtin
//! list. Loaded once at engine construction; the compiled tables are
//! immutable afterward.

use crate::{AttributeSet, BuiltinPolicy, ModulePolicy};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Policy configuration error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// A module name appears in both the allow and deny tables
    #[error("module '{name}' appears in both allow and deny tables")]
    Conflicting {
        /// The duplicated name
        name: String,
    },

    /// A module name is empty or malformed
    #[error("invalid module name: {reason}")]
    InvalidName {
        /// Why the name was rejected
        reason: String,
    },

    /// The configuration could not be parsed
    #[error("failed to parse policy config: {reason}")]
    Parse {
        /// Underlying parse failure
        reason: String,
    },
}

/// One allow entry on the wire: wildcard or explicit attribute names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllowEntry {
    /// `"*"` — every attribute exposed
    Marker(String),
    /// Explicit attribute list
    Attributes(Vec<String>),
}

/// Declarative policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Allowed modules: dotted name → `"*"` or attribute list
    pub allow: IndexMap<String, AllowEntry>,
    /// Denied modules, checked before the allow table
    #[serde(default)]
    pub deny: Vec<String>,
    /// Permitted builtin symbols
    #[serde(default)]
    pub builtins: Vec<String>,
}

impl PolicyConfig {
    /// An empty (deny-everything) configuration
    #[must_use]
    pub fn empty() -> Self {
        Self {
            allow: IndexMap::new(),
            deny: Vec::new(),
            builtins: Vec::new(),
        }
    }

    /// The stock configuration: arithmetic and formatting modules allowed,
    /// system-facing modules denied outright, baseline builtins.
    #[must_use]
    pub fn baseline() -> Self {
        let mut allow = IndexMap::new();
        allow.insert("math".to_string(), AllowEntry::Marker("*".to_string()));
        allow.insert(
            "strings".to_string(),
            AllowEntry::Attributes(vec![
                "upper".to_string(),
                "lower".to_string(),
                "trim".to_string(),
                "split".to_string(),
            ]),
        );
        allow.insert(
            "clock".to_string(),
            AllowEntry::Attributes(vec!["now".to_string()]),
        );
        Self {
            allow,
            deny: ["os", "net", "proc", "fs"].iter().map(|s| s.to_string()).collect(),
            builtins: BuiltinPolicy::baseline().iter().map(str::to_string).collect(),
        }
    }

    /// Allow a module wholesale (builder convenience for tests and embedders)
    #[must_use]
    pub fn allow_all(mut self, name: impl Into<String>) -> Self {
        self.allow.insert(name.into(), AllowEntry::Marker("*".to_string()));
        self
    }

    /// Allow a module with an explicit attribute list
    #[must_use]
    pub fn allow_only<I, S>(mut self, name: impl Into<String>, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow.insert(
            name.into(),
            AllowEntry::Attributes(attrs.into_iter().map(Into::into).collect()),
        );
        self
    }

    /// Deny a module
    #[must_use]
    pub fn deny_module(mut self, name: impl Into<String>) -> Self {
        self.deny.push(name.into());
        self
    }

    /// Set the builtin allowlist
    #[must_use]
    pub fn with_builtins<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.builtins = names.into_iter().map(Into::into).collect();
        self
    }

    /// Parse from a JSON document
    ///
    /// # Errors
    ///
    /// Returns error if the document is malformed
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        serde_json::from_str(json).map_err(|e| PolicyError::Parse {
            reason: e.to_string(),
        })
    }

    /// Compile into the immutable lookup tables.
    ///
    /// # Errors
    ///
    /// Returns error on empty names or a name present in both tables.
    pub fn compile(&self) -> Result<(ModulePolicy, BuiltinPolicy), PolicyError> {
        let deny: BTreeSet<String> = self.deny.iter().cloned().collect();

        let mut allow = IndexMap::with_capacity(self.allow.len());
        for (name, entry) in &self.allow {
            if name.is_empty() || name.split('.').any(str::is_empty) {
                return Err(PolicyError::InvalidName {
                    reason: format!("'{}' has an empty segment", name),
                });
            }
            if deny.contains(name) {
                return Err(PolicyError::Conflicting { name: name.clone() });
            }
            let set = match entry {
                AllowEntry::Marker(m) if m == "*" => AttributeSet::Wildcard,
                AllowEntry::Marker(m) => {
                    return Err(PolicyError::Parse {
                        reason: format!("unknown allow marker '{}' for '{}'", m, name),
                    })
                }
                AllowEntry::Attributes(attrs) => AttributeSet::only(attrs.clone()),
            };
            allow.insert(name.clone(), set);
        }

        Ok((
            ModulePolicy::new(allow, deny),
            BuiltinPolicy::new(self.builtins.clone()),
        ))
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::baseline()
    }
}
