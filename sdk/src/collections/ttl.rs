//! Self-expiring key set.
//!
//! Each key carries one expiry instant. A single sweeper can sleep until
//! [`TtlMap::next_expiry`] instead of keeping a timer per key.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

/// Keys that expire `ttl` after their last refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlMap<K: Ord> {
    expiries: BTreeMap<K, Instant>,
    ttl: Duration,
}

impl<K: Ord + Clone> TtlMap<K> {
    /// Creates an empty map with the given time-to-live.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            expiries: BTreeMap::new(),
            ttl,
        }
    }

    /// Returns the time-to-live.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Inserts or refreshes a key at `now`.
    ///
    /// Returns true if the key was not live before.
    pub fn touch(&mut self, key: K, now: Instant) -> bool {
        let expiry = now + self.ttl;
        match self.expiries.insert(key, expiry) {
            Some(previous) => previous <= now,
            None => true,
        }
    }

    /// Removes a key. Returns true if it was present.
    pub fn remove(&mut self, key: &K) -> bool {
        self.expiries.remove(key).is_some()
    }

    /// Returns true if the key is live at `now`.
    #[must_use]
    pub fn contains(&self, key: &K, now: Instant) -> bool {
        self.expiries.get(key).is_some_and(|expiry| now < *expiry)
    }

    /// Returns the keys live at `now`, in key order.
    #[must_use]
    pub fn live_keys(&self, now: Instant) -> Vec<K> {
        self.expiries
            .iter()
            .filter(|(_, expiry)| now < **expiry)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Removes every key expired at `now`, returning them.
    pub fn sweep(&mut self, now: Instant) -> Vec<K> {
        let expired: Vec<K> = self
            .expiries
            .iter()
            .filter(|(_, expiry)| **expiry <= now)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.expiries.remove(key);
        }
        expired
    }

    /// Returns the earliest expiry, if any key is present.
    #[must_use]
    pub fn next_expiry(&self) -> Option<Instant> {
        self.expiries.values().min().copied()
    }

    /// Returns the number of stored keys, live or not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    /// Returns true if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }

    /// Removes every key.
    pub fn clear(&mut self) {
        self.expiries.clear();
    }
}
