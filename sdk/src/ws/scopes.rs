//! Scope reference counting.
//!
//! Several feeds can share one scope (a product page runs price, stock and
//! review feeds for the same product). The server sees one subscribe when
//! the first of them activates and one unsubscribe when the last releases.

use std::collections::HashSet;

use dashmap::DashMap;

use crate::sync::scope::Scope;

/// Tracks which bindings hold each scope on the current connection.
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    holders: DashMap<Scope, HashSet<u64>>,
}

impl ScopeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `owner` as a holder of `scope`.
    ///
    /// Returns true if it is the first holder, i.e. the server must be told.
    pub fn acquire(&self, scope: &Scope, owner: u64) -> bool {
        let mut holders = self.holders.entry(scope.clone()).or_default();
        let first = holders.is_empty();
        holders.insert(owner) && first
    }

    /// Removes `owner` from the holders of `scope`.
    ///
    /// Returns true if it was the last holder, i.e. the server must be told.
    pub fn release(&self, scope: &Scope, owner: u64) -> bool {
        let removed = self
            .holders
            .get_mut(scope)
            .is_some_and(|mut holders| holders.remove(&owner));

        removed && self.holders.remove_if(scope, |_, holders| holders.is_empty()).is_some()
    }

    /// Forgets every holder. Used when the transport is lost.
    pub fn clear(&self) {
        self.holders.clear();
    }

    /// Returns the number of holders of a scope.
    #[must_use]
    pub fn holder_count(&self, scope: &Scope) -> usize {
        self.holders.get(scope).map(|h| h.len()).unwrap_or(0)
    }

    /// Returns the scopes with at least one holder.
    #[must_use]
    pub fn active_scopes(&self) -> Vec<Scope> {
        self.holders.iter().map(|entry| entry.key().clone()).collect()
    }
}
