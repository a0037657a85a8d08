//! REST query cache invalidation surface.
//!
//! The realtime layer never fetches; it only tells the query cache that a
//! key is stale. Anything holding a receiver from [`QueryCache::subscribe`]
//! (the view that owns the REST call) decides when to refetch.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

/// Default capacity of the invalidation channel.
pub const DEFAULT_INVALIDATION_CAPACITY: usize = 256;

/// Hierarchical cache key, e.g. `["reviews", "P1"]`.
///
/// Invalidating a key also invalidates every key it prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    /// Creates a key from its segments.
    #[must_use]
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Returns the segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Returns true if `prefix` is a prefix of this key.
    #[must_use]
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(":"))
    }
}

/// Keys of the storefront REST queries the realtime layer invalidates.
pub mod keys {
    use super::QueryKey;

    /// The signed-in user's cart.
    #[must_use]
    pub fn cart() -> QueryKey {
        QueryKey::new(["cart"])
    }

    /// Cart badge count.
    #[must_use]
    pub fn cart_count() -> QueryKey {
        QueryKey::new(["cart", "count"])
    }

    /// Every order query.
    #[must_use]
    pub fn orders() -> QueryKey {
        QueryKey::new(["orders"])
    }

    /// One order.
    #[must_use]
    pub fn order(order_id: &str) -> QueryKey {
        QueryKey::new(["orders", order_id])
    }

    /// One product.
    #[must_use]
    pub fn product(product_id: &str) -> QueryKey {
        QueryKey::new(["products", product_id])
    }

    /// Notification list.
    #[must_use]
    pub fn notifications() -> QueryKey {
        QueryKey::new(["notifications"])
    }

    /// Notification unread count.
    #[must_use]
    pub fn unread_count() -> QueryKey {
        QueryKey::new(["notifications", "unread-count"])
    }

    /// Reviews of a product.
    #[must_use]
    pub fn reviews(product_id: &str) -> QueryKey {
        QueryKey::new(["reviews", product_id])
    }

    /// Questions of a product.
    #[must_use]
    pub fn questions(product_id: &str) -> QueryKey {
        QueryKey::new(["questions", product_id])
    }

    /// Seller order list.
    #[must_use]
    pub fn seller_orders() -> QueryKey {
        QueryKey::new(["seller", "orders"])
    }

    /// Seller statistics.
    #[must_use]
    pub fn seller_stats() -> QueryKey {
        QueryKey::new(["seller", "stats"])
    }

    /// Seller product list.
    #[must_use]
    pub fn seller_products() -> QueryKey {
        QueryKey::new(["seller", "products"])
    }
}

/// A cached query result.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Cached response body.
    pub value: Value,
    /// When the value was stored.
    pub stored_at: Instant,
    /// True once invalidated; a refetch is due.
    pub stale: bool,
}

#[derive(Debug)]
struct CacheInner {
    entries: DashMap<QueryKey, CacheEntry>,
    invalidations: broadcast::Sender<QueryKey>,
}

/// Shared key-value store of REST query results.
///
/// Cloning shares the store. Invalidation by one feed reaches every
/// subscriber of the same key, including unrelated views.
#[derive(Debug, Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_INVALIDATION_CAPACITY)
    }
}

impl QueryCache {
    /// Creates a cache whose invalidation channel holds `capacity` keys.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (invalidations, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(CacheInner {
                entries: DashMap::new(),
                invalidations,
            }),
        }
    }

    /// Stores a fresh value.
    pub fn store(&self, key: QueryKey, value: Value) {
        self.inner.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
                stale: false,
            },
        );
    }

    /// Returns the cached entry, stale or not.
    #[must_use]
    pub fn entry(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.inner.entries.get(key).map(|entry| entry.clone())
    }

    /// Returns the cached value, stale or not.
    #[must_use]
    pub fn get(&self, key: &QueryKey) -> Option<Value> {
        self.inner.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Returns true if the key is missing or invalidated.
    #[must_use]
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.inner.entries.get(key).map_or(true, |entry| entry.stale)
    }

    /// Marks `key` and every key it prefixes stale and notifies subscribers.
    ///
    /// Returns the number of cached entries marked.
    pub fn invalidate(&self, key: &QueryKey) -> usize {
        let mut marked = 0;
        for mut entry in self.inner.entries.iter_mut() {
            if entry.key().starts_with(key) {
                entry.value_mut().stale = true;
                marked += 1;
            }
        }

        debug!(%key, marked, "query invalidated");
        let _ = self.inner.invalidations.send(key.clone());
        marked
    }

    /// Returns a receiver of invalidated keys.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<QueryKey> {
        self.inner.invalidations.subscribe()
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_key_prefix() {
        let order = keys::order("O1");
        assert!(order.starts_with(&keys::orders()));
        assert!(!keys::orders().starts_with(&order));
        assert_eq!(order.to_string(), "orders:O1");
    }

    #[test]
    fn test_store_and_get() {
        let cache = QueryCache::default();
        assert!(cache.is_stale(&keys::cart()));

        cache.store(keys::cart(), json!({"items": []}));
        assert_eq!(cache.get(&keys::cart()), Some(json!({"items": []})));
        assert!(!cache.is_stale(&keys::cart()));
    }

    #[test]
    fn test_invalidate_prefix() {
        let cache = QueryCache::default();
        cache.store(keys::orders(), json!([]));
        cache.store(keys::order("O1"), json!({}));
        cache.store(keys::cart(), json!({}));

        assert_eq!(cache.invalidate(&keys::orders()), 2);
        assert!(cache.is_stale(&keys::order("O1")));
        assert!(!cache.is_stale(&keys::cart()));
        assert!(cache.get(&keys::order("O1")).is_some());
    }

    #[tokio::test]
    async fn test_invalidation_reaches_every_subscriber() {
        let cache = QueryCache::default();
        let mut cart_view = cache.subscribe();
        let mut header_badge = cache.clone().subscribe();

        cache.invalidate(&keys::cart_count());

        assert_eq!(cart_view.recv().await.expect("key"), keys::cart_count());
        assert_eq!(header_badge.recv().await.expect("key"), keys::cart_count());
    }

    #[test]
    fn test_invalidate_without_subscribers() {
        let cache = QueryCache::new(1);
        assert_eq!(cache.invalidate(&keys::notifications()), 0);
    }
}
