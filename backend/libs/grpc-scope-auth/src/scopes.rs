//! Per-method required-scope policy

use std::collections::{HashMap, HashSet};

/// Static mapping from RPC method to the ordered scopes it requires.
///
/// Built once, read-only for the process lifetime. Methods with no entry
/// require no scopes: default-permit for unlisted methods is the deliberate
/// policy here, which also means an operator who forgets to list a method
/// has silently left it open. Audit the table, not the code.
#[derive(Debug, Clone, Default)]
pub struct ScopePolicy {
    required: HashMap<String, Vec<String>>,
}

impl ScopePolicy {
    pub fn builder() -> ScopePolicyBuilder {
        ScopePolicyBuilder {
            required: HashMap::new(),
        }
    }

    /// Required scopes for a method, if any are configured.
    ///
    /// Policies may be keyed by the full gRPC path (`/pkg.Service/Method`)
    /// or by the bare method name; the bare name is the fallback.
    pub fn required_for(&self, method: &str) -> Option<&[String]> {
        self.required
            .get(method)
            .or_else(|| self.required.get(method_name(method)))
            .map(Vec::as_slice)
    }

    /// Scopes the policy requires for `method` that are absent from the
    /// granted set, in the policy's declared order. Empty means authorized.
    pub fn missing_scopes(&self, method: &str, granted: &HashSet<String>) -> Vec<String> {
        match self.required_for(method) {
            Some(required) => required
                .iter()
                .filter(|scope| !granted.contains(*scope))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }
}

/// Last path segment of a full gRPC method path.
fn method_name(full_method: &str) -> &str {
    full_method.rsplit('/').next().unwrap_or(full_method)
}

pub struct ScopePolicyBuilder {
    required: HashMap<String, Vec<String>>,
}

impl ScopePolicyBuilder {
    /// Require the listed scopes, in order, for `method`.
    pub fn require<I, S>(mut self, method: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required
            .insert(method.into(), scopes.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> ScopePolicy {
        ScopePolicy {
            required: self.required,
        }
    }
}
