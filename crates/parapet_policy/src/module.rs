//! Module allow/deny tables with dotted-prefix resolution.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The attributes a policy exposes from an allowed module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeSet {
    /// Every attribute passes through unfiltered
    Wildcard,
    /// Only the named attributes are exposed
    Only(BTreeSet<String>),
}

impl AttributeSet {
    /// Build an explicit attribute set from names
    #[must_use]
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(names.into_iter().map(Into::into).collect())
    }

    /// Whether the set exposes a given attribute name
    #[must_use]
    pub fn exposes(&self, name: &str) -> bool {
        match self {
            Self::Wildcard => true,
            Self::Only(names) => names.contains(name),
        }
    }

    /// Whether this is the wildcard marker
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }
}

/// Immutable module policy: a deny set checked before an allow table.
///
/// Lookup walks dotted prefixes from most to least specific, so an entry for
/// `plot` also governs `plot.canvas`, and a deny on `os` covers `os.path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulePolicy {
    /// Allowed module names mapped to their exposed attributes
    allow: IndexMap<String, AttributeSet>,
    /// Completely blocked module names
    deny: BTreeSet<String>,
}

impl ModulePolicy {
    /// Build a policy from its tables. Construction is the only mutation
    /// point; the resulting policy is pure lookup.
    #[must_use]
    pub fn new(allow: IndexMap<String, AttributeSet>, deny: BTreeSet<String>) -> Self {
        Self { allow, deny }
    }

    /// Check whether a module may be imported.
    ///
    /// Exact deny wins, then exact allow, then the dotted-prefix walk with
    /// deny checked before allow at each prefix. Unmatched names are denied.
    #[must_use]
    pub fn is_module_allowed(&self, name: &str) -> bool {
        if self.deny.contains(name) {
            return false;
        }
        if self.allow.contains_key(name) {
            return true;
        }
        for prefix in prefixes(name) {
            if self.deny.contains(prefix) {
                return false;
            }
            if self.allow.contains_key(prefix) {
                return true;
            }
        }
        false
    }

    /// The attribute set governing an allowed module, or `None` when the
    /// module is not allowed at all.
    ///
    /// A name matched through a prefix inherits the prefix's attribute set,
    /// never an implicit wildcard.
    #[must_use]
    pub fn allowed_attributes(&self, name: &str) -> Option<&AttributeSet> {
        if self.deny.contains(name) {
            return None;
        }
        if let Some(set) = self.allow.get(name) {
            return Some(set);
        }
        for prefix in prefixes(name) {
            if self.deny.contains(prefix) {
                return None;
            }
            if let Some(set) = self.allow.get(prefix) {
                return Some(set);
            }
        }
        None
    }

    /// Names in the allow table, in insertion order
    pub fn allowed_modules(&self) -> impl Iterator<Item = &str> {
        self.allow.keys().map(String::as_str)
    }

    /// Names in the deny table
    pub fn denied_modules(&self) -> impl Iterator<Item = &str> {
        self.deny.iter().map(String::as_str)
    }

    /// Number of allow entries
    #[must_use]
    pub fn allow_count(&self) -> usize {
        self.allow.len()
    }
}

/// Dotted prefixes of a name, most specific first, excluding the name itself.
/// `a.b.c` yields `a.b` then `a`.
fn prefixes(name: &str) -> impl Iterator<Item = &str> {
    name.char_indices()
        .rev()
        .filter(|&(_, c)| c == '.')
        .map(move |(i, _)| &name[..i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy() -> ModulePolicy {
        let mut allow = IndexMap::new();
        allow.insert("math".to_string(), AttributeSet::Wildcard);
        allow.insert(
            "clock".to_string(),
            AttributeSet::only(["now", "monotonic"]),
        );
        allow.insert("plot".to_string(), AttributeSet::only(["line", "scatter"]));
        let deny: BTreeSet<String> =
            ["os", "net", "plot.backend"].iter().map(|s| s.to_string()).collect();
        ModulePolicy::new(allow, deny)
    }

    #[test]
    fn test_exact_allow() {
        let p = policy();
        assert!(p.is_module_allowed("math"));
        assert!(p.is_module_allowed("clock"));
    }

    #[test]
    fn test_exact_deny() {
        let p = policy();
        assert!(!p.is_module_allowed("os"));
        assert!(!p.is_module_allowed("net"));
    }

    #[test]
    fn test_default_deny_unknown() {
        let p = policy();
        assert!(!p.is_module_allowed("sockets"));
        assert!(!p.is_module_allowed(""));
    }

    #[test]
    fn test_prefix_allow_inherits_attributes() {
        let p = policy();
        assert!(p.is_module_allowed("plot.canvas"));
        let attrs = p.allowed_attributes("plot.canvas").unwrap();
        assert!(!attrs.is_wildcard());
        assert!(attrs.exposes("line"));
        assert!(!attrs.exposes("save_file"));
    }

    #[test]
    fn test_prefix_deny_covers_submodules() {
        let p = policy();
        assert!(!p.is_module_allowed("os.path"));
        assert!(p.allowed_attributes("os.path").is_none());
    }

    #[test]
    fn test_specific_deny_under_allowed_prefix() {
        // plot is allowed, plot.backend is denied: the more specific deny wins.
        let p = policy();
        assert!(p.is_module_allowed("plot"));
        assert!(!p.is_module_allowed("plot.backend"));
        assert!(!p.is_module_allowed("plot.backend.gl"));
    }

    #[test]
    fn test_wildcard_attributes() {
        let p = policy();
        let attrs = p.allowed_attributes("math").unwrap();
        assert!(attrs.is_wildcard());
        assert!(attrs.exposes("anything"));
    }

    #[test]
    fn test_prefixes_order() {
        let collected: Vec<&str> = prefixes("a.b.c").collect();
        assert_eq!(collected, vec!["a.b", "a"]);
    }

    proptest! {
        #[test]
        fn prop_default_deny(name in "[a-z]{1,8}(\\.[a-z]{1,8}){0,3}") {
            // Any name whose every prefix is absent from the allow table is denied.
            let p = policy();
            let known = ["math", "clock", "plot"];
            let root = name.split('.').next().unwrap();
            prop_assume!(!known.contains(&root));
            prop_assert!(!p.is_module_allowed(&name));
        }

        #[test]
        fn prop_deny_precedence(suffix in "[a-z]{1,8}") {
            // Everything under a denied root stays denied, whatever the leaf.
            let p = policy();
            let name = format!("os.{}", suffix);
            prop_assert!(!p.is_module_allowed(&name));
        }
    }
}
