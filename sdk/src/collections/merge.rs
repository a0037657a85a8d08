//! Snapshot/realtime reconciliation.
//!
//! Notifications, reviews and questions all come from two sources: a REST
//! snapshot and a tail of realtime events received since. They are merged
//! here, once, by identity.

use std::collections::HashSet;
use std::hash::Hash;

/// Which source leads the merged collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeOrder {
    /// Realtime items (assumed newer) first, then the snapshot.
    #[default]
    RealtimeFirst,
    /// Snapshot first, realtime items appended.
    SnapshotFirst,
}

/// Merges a snapshot with a realtime tail, deduplicated by key.
///
/// Realtime items whose key is already in the snapshot are dropped, as are
/// repeated keys within the tail (first occurrence wins). This is not a
/// general sorted merge: realtime items are assumed newer than the snapshot.
pub fn merge_by_key<'a, T, K, F>(
    snapshot: &'a [T],
    realtime: &'a [T],
    key: F,
    order: MergeOrder,
) -> Vec<T>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&'a T) -> K,
{
    let mut seen: HashSet<K> = snapshot.iter().map(&key).collect();

    let fresh = realtime.iter().filter(|item| seen.insert(key(*item)));

    match order {
        MergeOrder::RealtimeFirst => fresh.chain(snapshot.iter()).cloned().collect(),
        MergeOrder::SnapshotFirst => {
            let fresh: Vec<&T> = fresh.collect();
            snapshot.iter().chain(fresh).cloned().collect()
        }
    }
}

/// Unread total: the server's count plus unread realtime items the
/// snapshot does not contain yet.
///
/// The server count and the snapshot come from two separate requests, so an
/// item arriving between them can be counted twice. That race is inherited
/// from the REST API and left visible rather than papered over.
pub fn compose_unread<'a, T, K, F, U>(
    server_unread: u64,
    snapshot: &'a [T],
    realtime: &'a [T],
    key: F,
    is_unread: U,
) -> u64
where
    K: Eq + Hash,
    F: Fn(&'a T) -> K,
    U: Fn(&T) -> bool,
{
    let known: HashSet<K> = snapshot.iter().map(&key).collect();
    let extra = realtime
        .iter()
        .filter(|item| is_unread(item) && !known.contains(&key(*item)))
        .count();
    server_unread.saturating_add(extra as u64)
}

/// Items with a stable server identity (`_id`).
pub trait Identified {
    /// Returns the identity.
    fn identity(&self) -> &str;
}

/// A REST snapshot plus the realtime items not yet reflected in it.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedCollection<T> {
    snapshot: Vec<T>,
    realtime: Vec<T>,
}

impl<T> Default for MergedCollection<T> {
    fn default() -> Self {
        Self {
            snapshot: Vec::new(),
            realtime: Vec::new(),
        }
    }
}

impl<T: Identified + Clone> MergedCollection<T> {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the REST snapshot.
    #[must_use]
    pub fn snapshot(&self) -> &[T] {
        &self.snapshot
    }

    /// Returns the realtime items not reflected in the snapshot, newest first.
    #[must_use]
    pub fn unreflected(&self) -> &[T] {
        &self.realtime
    }

    /// Adds a realtime item at the front.
    ///
    /// Returns false (and changes nothing) if the id is already known.
    pub fn push_realtime(&mut self, item: T) -> bool {
        let id = item.identity();
        let known = self
            .snapshot
            .iter()
            .chain(self.realtime.iter())
            .any(|existing| existing.identity() == id);

        if known {
            return false;
        }
        self.realtime.insert(0, item);
        true
    }

    /// Replaces the snapshot after a REST (re)fetch.
    ///
    /// Realtime items now present in the snapshot are pruned from the tail.
    pub fn replace_snapshot(&mut self, items: Vec<T>) {
        let ids: HashSet<&str> = items.iter().map(|item| item.identity()).collect();
        self.realtime.retain(|item| !ids.contains(item.identity()));
        self.snapshot = items;
    }

    /// Applies `f` to every copy of the item with the given id.
    ///
    /// Returns true if any copy was found.
    pub fn update(&mut self, id: &str, mut f: impl FnMut(&mut T)) -> bool {
        let mut found = false;
        for item in self
            .snapshot
            .iter_mut()
            .chain(self.realtime.iter_mut())
            .filter(|item| item.identity() == id)
        {
            f(item);
            found = true;
        }
        found
    }

    /// Applies `f` to every item.
    pub fn update_all(&mut self, mut f: impl FnMut(&mut T)) {
        self.snapshot
            .iter_mut()
            .chain(self.realtime.iter_mut())
            .for_each(|item| f(item));
    }

    /// Returns the merged, deduplicated view, realtime items first.
    #[must_use]
    pub fn merged(&self) -> Vec<T> {
        merge_by_key(
            &self.snapshot,
            &self.realtime,
            |item| item.identity(),
            MergeOrder::RealtimeFirst,
        )
    }

    /// Returns the number of items in the merged view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.merged().len()
    }

    /// Returns true if both sources are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty() && self.realtime.is_empty()
    }

    /// Drops the realtime tail.
    pub fn clear_realtime(&mut self) {
        self.realtime.clear();
    }
}
