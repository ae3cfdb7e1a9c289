//! Builtin symbol allowlist.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Fixed set of builtin symbol names sandboxed code may call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltinPolicy {
    allowed: BTreeSet<String>,
}

impl BuiltinPolicy {
    /// Build from a set of names
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: names.into_iter().map(Into::into).collect(),
        }
    }

    /// The stock allowlist: value constructors, collection helpers, and
    /// console output. No reflection, no dynamic evaluation.
    #[must_use]
    pub fn baseline() -> Self {
        Self::new([
            "print", "len", "abs", "min", "max", "str", "int", "float", "bool",
        ])
    }

    /// Check whether a builtin symbol is permitted
    #[must_use]
    pub fn is_builtin_allowed(&self, name: &str) -> bool {
        self.allowed.contains(name)
    }

    /// Iterate permitted names in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }

    /// Number of permitted builtins
    #[must_use]
    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    /// Whether no builtins are permitted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_contains_print() {
        let p = BuiltinPolicy::baseline();
        assert!(p.is_builtin_allowed("print"));
        assert!(p.is_builtin_allowed("len"));
    }

    #[test]
    fn test_baseline_excludes_reflection() {
        let p = BuiltinPolicy::baseline();
        assert!(!p.is_builtin_allowed("eval"));
        assert!(!p.is_builtin_allowed("globals"));
        assert!(!p.is_builtin_allowed("open"));
    }

    #[test]
    fn test_custom_set() {
        let p = BuiltinPolicy::new(["print"]);
        assert_eq!(p.len(), 1);
        assert!(p.is_builtin_allowed("print"));
        assert!(!p.is_builtin_allowed("len"));
    }

    #[test]
    fn test_empty() {
        let p = BuiltinPolicy::new(Vec::<String>::new());
        assert!(p.is_empty());
        assert!(!p.is_builtin_allowed("print"));
    }
}
