//! Seller dashboard: live metrics, new orders and stock alerts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::binding::{decode, Binding, Feature, StateTx};
use super::scope::ScopeKind;
use crate::cache::{keys, QueryCache};
use crate::collections::RingBuffer;
use crate::context::RealtimeContext;
use crate::ws::events;
use crate::ws::messages::string_id;

/// Dashboard figures pushed by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SellerMetrics {
    /// Revenue today, in minor currency units.
    pub today_revenue: u64,
    /// Orders placed today.
    pub today_orders: u64,
    /// Orders waiting for confirmation.
    pub pending_orders: u64,
    /// Products at or below their stock threshold.
    pub low_stock_products: u64,
}

/// `new_order` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    /// Order id.
    #[serde(deserialize_with = "string_id")]
    pub order_id: String,
    /// Order total, in minor currency units.
    #[serde(default)]
    pub total: u64,
    /// Buyer display name.
    #[serde(default)]
    pub buyer_name: Option<String>,
}

/// `low_stock_alert` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockAlert {
    /// Product id.
    #[serde(deserialize_with = "string_id")]
    pub product_id: String,
    /// Product name.
    #[serde(default)]
    pub product_name: String,
    /// Units left.
    pub stock: u64,
}

#[derive(Debug, Deserialize)]
struct MetricsUpdate {
    metrics: SellerMetrics,
}

/// What a dashboard notification is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SellerEvent {
    /// A buyer placed an order.
    NewOrder(NewOrder),
    /// A product is running out.
    LowStock(LowStockAlert),
}

/// One entry of the dashboard notification list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerNotification {
    /// The event.
    pub event: SellerEvent,
    /// Local receive time.
    pub received_at: DateTime<Utc>,
    /// Seen by the seller.
    pub is_read: bool,
}

/// Dashboard state of one seller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellerState {
    /// Latest metrics.
    pub metrics: Option<SellerMetrics>,
    /// Recent notifications, oldest first, capped.
    pub notifications: RingBuffer<SellerNotification>,
}

impl SellerState {
    /// Unread notifications.
    #[must_use]
    pub fn unread(&self) -> usize {
        self.notifications.iter().filter(|n| !n.is_read).count()
    }
}

/// Seller dashboard feed.
#[derive(Debug)]
pub struct SellerFeature {
    capacity: usize,
    cache: QueryCache,
}

impl SellerFeature {
    /// Creates the feature keeping at most `capacity` notifications.
    #[must_use]
    pub fn new(capacity: usize, cache: QueryCache) -> Self {
        Self { capacity, cache }
    }

    fn notify(state: &StateTx<SellerState>, event: SellerEvent) {
        state.send_modify(|seller| {
            seller.notifications.push(SellerNotification {
                event,
                received_at: Utc::now(),
                is_read: false,
            });
        });
    }
}

impl Feature for SellerFeature {
    type State = SellerState;

    fn scope_kind(&self) -> Option<ScopeKind> {
        Some(ScopeKind::Seller)
    }

    fn events(&self) -> &'static [&'static str] {
        &[
            events::NEW_ORDER,
            events::SELLER_METRICS_UPDATED,
            events::LOW_STOCK_ALERT,
        ]
    }

    fn initial_state(&self) -> SellerState {
        SellerState {
            metrics: None,
            notifications: RingBuffer::new(self.capacity),
        }
    }

    fn on_event(&self, event: &str, payload: &Value, state: &StateTx<SellerState>) {
        match event {
            events::NEW_ORDER => {
                if let Some(order) = decode::<NewOrder>(event, payload) {
                    Self::notify(state, SellerEvent::NewOrder(order));
                    self.cache.invalidate(&keys::seller_orders());
                    self.cache.invalidate(&keys::seller_stats());
                }
            }
            events::SELLER_METRICS_UPDATED => {
                if let Some(MetricsUpdate { metrics }) = decode(event, payload) {
                    state.send_modify(|seller| seller.metrics = Some(metrics));
                }
            }
            _ => {
                if let Some(alert) = decode::<LowStockAlert>(event, payload) {
                    Self::notify(state, SellerEvent::LowStock(alert));
                    self.cache.invalidate(&keys::seller_products());
                }
            }
        }
    }
}

/// Live dashboard of one seller.
pub type SellerDashboard = Binding<SellerFeature>;

impl Binding<SellerFeature> {
    /// Follows a seller's dashboard.
    pub fn new(ctx: &RealtimeContext, seller_id: Option<String>) -> Self {
        let feature = SellerFeature::new(
            ctx.config().seller_notification_capacity,
            ctx.cache().clone(),
        );
        Self::bind(ctx, feature, seller_id)
    }

    /// Marks every notification seen.
    pub fn mark_all_read(&self) {
        self.modify(|seller| {
            seller
                .notifications
                .update_where(|n| !n.is_read, |n| n.is_read = true);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use serde_json::json;

    #[tokio::test]
    async fn test_metrics_last_write_wins() {
        let harness = Harness::connected().await;
        let dashboard = SellerDashboard::new(&harness.ctx, Some("S9".to_string()));

        harness
            .push(
                "seller_metrics_updated",
                json!({"seller_id": "S9", "metrics": {"today_revenue": 1000, "today_orders": 2}}),
            )
            .await;
        harness
            .push(
                "seller_metrics_updated",
                json!({"seller_id": "S9", "metrics": {"today_revenue": 2500, "today_orders": 3, "pending_orders": 1}}),
            )
            .await;

        let metrics = dashboard.snapshot().metrics.expect("metrics");
        assert_eq!(metrics.today_revenue, 2500);
        assert_eq!(metrics.pending_orders, 1);
        assert_eq!(metrics.low_stock_products, 0);
    }

    #[tokio::test]
    async fn test_notifications_capped_at_fifty() {
        let harness = Harness::connected().await;
        let dashboard = SellerDashboard::new(&harness.ctx, Some("S9".to_string()));

        for i in 0..55 {
            harness
                .push(
                    "new_order",
                    json!({"seller_id": "S9", "order_id": format!("O{i}"), "total": 100}),
                )
                .await;
        }

        let state = dashboard.snapshot();
        assert_eq!(state.notifications.len(), 50);
        let oldest = state.notifications.iter().next().map(|n| n.event.clone());
        assert!(matches!(oldest, Some(SellerEvent::NewOrder(order)) if order.order_id == "O5"));
        assert_eq!(state.unread(), 50);

        dashboard.mark_all_read();
        assert_eq!(dashboard.snapshot().unread(), 0);
    }

    #[tokio::test]
    async fn test_events_invalidate_seller_queries() {
        let harness = Harness::connected().await;
        let cache = harness.ctx.cache().clone();
        cache.store(keys::seller_orders(), json!([]));
        cache.store(keys::seller_products(), json!([]));
        let dashboard = SellerDashboard::new(&harness.ctx, Some("S9".to_string()));

        harness
            .push("new_order", json!({"seller_id": "S9", "order_id": "O1"}))
            .await;
        assert!(cache.is_stale(&keys::seller_orders()));
        assert!(!cache.is_stale(&keys::seller_products()));

        harness
            .push(
                "low_stock_alert",
                json!({"seller_id": "S9", "product_id": "P1", "product_name": "Mug", "stock": 2}),
            )
            .await;
        assert!(cache.is_stale(&keys::seller_products()));
        assert_eq!(dashboard.snapshot().notifications.len(), 2);
    }
}
