use std::collections::BTreeSet;

use crate::error::SchemaError;

/// The set of dotted paths a request type may touch.
///
/// Patterns are either exact paths (`"nested.field2"`), a trailing
/// wildcard (`"nested.*"`, matching every strict descendant), or the lone
/// glob `"*"` which allows everything. `"*"` may not be combined with any
/// other pattern.
#[derive(Debug, Clone, Default)]
pub struct AllowedPathSet {
    all: bool,
    exact: BTreeSet<String>,
    prefixes: Vec<String>,
}

impl AllowedPathSet {
    /// Parse a pattern list. Fails when `"*"` appears alongside other
    /// patterns.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, SchemaError> {
        let mut set = AllowedPathSet::default();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if pattern == "*" {
                if patterns.len() > 1 {
                    return Err(SchemaError::WildcardNotAlone);
                }
                set.all = true;
            } else if let Some(prefix) = pattern.strip_suffix(".*") {
                set.prefixes.push(prefix.to_string());
            } else {
                set.exact.insert(pattern.to_string());
            }
        }
        Ok(set)
    }

    /// Allow everything.
    pub fn any() -> Self {
        AllowedPathSet {
            all: true,
            ..AllowedPathSet::default()
        }
    }

    /// Exact match, or any ancestor carrying a `.*` pattern.
    pub fn is_allowed(&self, path: &str) -> bool {
        if self.all || self.exact.contains(path) {
            return true;
        }
        self.prefixes.iter().any(|prefix| {
            path.len() > prefix.len()
                && path.starts_with(prefix.as_str())
                && path.as_bytes()[prefix.len()] == b'.'
        })
    }

    pub fn allows_everything(&self) -> bool {
        self.all
    }

    pub fn is_empty(&self) -> bool {
        !self.all && self.exact.is_empty() && self.prefixes.is_empty()
    }

    /// Exact paths declared in this set.
    pub fn exact_paths(&self) -> impl Iterator<Item = &str> {
        self.exact.iter().map(String::as_str)
    }

    /// Prefixes declared with a trailing `.*`.
    pub fn wildcard_prefixes(&self) -> impl Iterator<Item = &str> {
        self.prefixes.iter().map(String::as_str)
    }
}
