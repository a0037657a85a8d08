//! Notification center.
//!
//! The list shown to the user is the last REST snapshot plus notifications
//! received since, deduplicated by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::binding::{decode, Binding, Feature, StateTx};
use super::scope::ScopeKind;
use crate::cache::{keys, QueryCache};
use crate::collections::{compose_unread, Identified, MergedCollection};
use crate::context::RealtimeContext;
use crate::ws::events;
use crate::ws::messages::string_id;

/// A user notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Server id.
    #[serde(rename = "_id", alias = "id", deserialize_with = "string_id")]
    pub id: String,
    /// Category, e.g. `order`, `promotion`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Title.
    #[serde(default)]
    pub title: String,
    /// Body.
    #[serde(default)]
    pub message: String,
    /// Read by the user.
    #[serde(default)]
    pub is_read: bool,
    /// Deep link into the storefront.
    #[serde(default)]
    pub link: Option<String>,
    /// Server time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Identified for Notification {
    fn identity(&self) -> &str {
        &self.id
    }
}

/// Notifications of the signed-in user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationState {
    /// REST snapshot plus realtime tail.
    pub items: MergedCollection<Notification>,
    /// Unread count reported by the server with the snapshot.
    pub server_unread: u64,
}

impl NotificationState {
    /// Newest first, each id once.
    #[must_use]
    pub fn merged(&self) -> Vec<Notification> {
        self.items.merged()
    }

    /// Server unread count plus unread notifications received since.
    ///
    /// The count and the snapshot come from separate requests, so a
    /// notification delivered between them is counted twice until the
    /// next snapshot.
    #[must_use]
    pub fn unread_count(&self) -> u64 {
        compose_unread(
            self.server_unread,
            self.items.snapshot(),
            self.items.unreflected(),
            |item| item.id.as_str(),
            |item| !item.is_read,
        )
    }
}

/// Notification feed, delivered to the user's own room.
#[derive(Debug)]
pub struct NotificationFeature {
    cache: QueryCache,
}

impl NotificationFeature {
    /// Creates the feature.
    #[must_use]
    pub fn new(cache: QueryCache) -> Self {
        Self { cache }
    }
}

impl Feature for NotificationFeature {
    type State = NotificationState;

    fn scope_kind(&self) -> Option<ScopeKind> {
        None
    }

    fn events(&self) -> &'static [&'static str] {
        &[events::NOTIFICATION]
    }

    fn initial_state(&self) -> NotificationState {
        NotificationState::default()
    }

    fn on_event(&self, event: &str, payload: &Value, state: &StateTx<NotificationState>) {
        let Some(notification) = decode::<Notification>(event, payload) else {
            return;
        };

        state.send_if_modified(|current| current.items.push_realtime(notification));
        self.cache.invalidate(&keys::notifications());
    }
}

/// Notification center of the signed-in user.
pub type NotificationFeed = Binding<NotificationFeature>;

impl Binding<NotificationFeature> {
    /// Follows the user's notifications.
    pub fn new(ctx: &RealtimeContext) -> Self {
        Self::bind(ctx, NotificationFeature::new(ctx.cache().clone()), None)
    }

    /// Replaces the REST snapshot and server unread count after a fetch.
    pub fn apply_snapshot(&self, items: Vec<Notification>, server_unread: u64) {
        self.modify(|state| {
            state.items.replace_snapshot(items);
            state.server_unread = server_unread;
        });
    }

    /// Marks one notification read locally.
    pub fn mark_read(&self, id: &str) {
        self.modify(|state| {
            let unread_in_snapshot = state
                .items
                .snapshot()
                .iter()
                .any(|item| item.id == id && !item.is_read);
            if unread_in_snapshot {
                state.server_unread = state.server_unread.saturating_sub(1);
            }
            state.items.update(id, |item| item.is_read = true);
        });
    }

    /// Marks every notification read locally.
    pub fn mark_all_read(&self) {
        self.modify(|state| {
            state.items.update_all(|item| item.is_read = true);
            state.server_unread = 0;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use serde_json::json;

    fn notification(id: &str, is_read: bool) -> Notification {
        Notification {
            id: id.to_string(),
            kind: Some("order".to_string()),
            title: format!("Order update {id}"),
            message: String::new(),
            is_read,
            link: None,
            created_at: None,
        }
    }

    fn ids(feed: &NotificationFeed) -> Vec<String> {
        feed.snapshot().merged().into_iter().map(|n| n.id).collect()
    }

    #[tokio::test]
    async fn test_realtime_item_in_snapshot_appears_once() {
        let harness = Harness::connected().await;
        let feed = NotificationFeed::new(&harness.ctx);
        feed.apply_snapshot(vec![notification("n2", false), notification("n1", true)], 1);

        harness
            .push("notification", json!({"_id": "n2", "title": "Order update n2"}))
            .await;
        harness
            .push("notification", json!({"_id": "n3", "title": "Shipped"}))
            .await;

        assert_eq!(ids(&feed), vec!["n3", "n2", "n1"]);
        assert_eq!(feed.snapshot().unread_count(), 2);
    }

    #[tokio::test]
    async fn test_notification_invalidates_list_and_count() {
        let harness = Harness::connected().await;
        let cache = harness.ctx.cache().clone();
        cache.store(keys::notifications(), json!([]));
        cache.store(keys::unread_count(), json!(0));
        let _feed = NotificationFeed::new(&harness.ctx);

        harness.push("notification", json!({"_id": "n1"})).await;

        assert!(cache.is_stale(&keys::notifications()));
        assert!(cache.is_stale(&keys::unread_count()));
    }

    #[tokio::test]
    async fn test_refetch_prunes_realtime_tail() {
        let harness = Harness::connected().await;
        let feed = NotificationFeed::new(&harness.ctx);
        harness.push("notification", json!({"_id": "n1"})).await;
        harness.push("notification", json!({"_id": "n2"})).await;

        feed.apply_snapshot(vec![notification("n1", false)], 1);

        let state = feed.snapshot();
        let tail: Vec<&str> = state.items.unreflected().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(tail, vec!["n2"]);
        assert_eq!(state.unread_count(), 2);
    }

    #[tokio::test]
    async fn test_unread_count_can_double_count() {
        let harness = Harness::connected().await;
        let feed = NotificationFeed::new(&harness.ctx);

        // Count fetched after n9 arrived, list fetched before.
        harness.push("notification", json!({"_id": "n9"})).await;
        feed.apply_snapshot(Vec::new(), 1);

        assert_eq!(feed.snapshot().unread_count(), 2);
    }

    #[tokio::test]
    async fn test_mark_read() {
        let harness = Harness::connected().await;
        let feed = NotificationFeed::new(&harness.ctx);
        feed.apply_snapshot(vec![notification("n1", false)], 1);
        harness.push("notification", json!({"_id": "n2"})).await;
        assert_eq!(feed.snapshot().unread_count(), 2);

        feed.mark_read("n1");
        assert_eq!(feed.snapshot().unread_count(), 1);
        feed.mark_read("n1");
        assert_eq!(feed.snapshot().unread_count(), 1);

        feed.mark_all_read();
        assert_eq!(feed.snapshot().unread_count(), 0);
    }
}
