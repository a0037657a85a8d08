//! Live order status tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::binding::{decode, Binding, Feature, StateTx};
use super::scope::ScopeKind;
use crate::cache::{keys, QueryCache};
use crate::context::RealtimeContext;
use crate::ws::events;
use crate::ws::messages::string_id;

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, awaiting payment or confirmation.
    Pending,
    /// Confirmed by the seller.
    Confirmed,
    /// Being packed.
    Processing,
    /// Handed to the carrier.
    Shipping,
    /// Delivered to the buyer.
    Delivered,
    /// Received and closed.
    Completed,
    /// Cancelled.
    Cancelled,
    /// Returned or refunded.
    Returned,
    /// Any status this client does not know.
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// Returns true if no further transition is expected.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Returned)
    }

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipping => "shipping",
            Self::Delivered => "delivered",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Returned => "returned",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `order_status_updated` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusUpdate {
    /// Order id.
    #[serde(deserialize_with = "string_id")]
    pub order_id: String,
    /// Status before the transition.
    #[serde(default)]
    pub old_status: Option<OrderStatus>,
    /// Status after the transition.
    pub new_status: OrderStatus,
    /// Server time of the transition.
    pub updated_at: DateTime<Utc>,
    /// Optional note, e.g. carrier tracking info.
    #[serde(default)]
    pub note: Option<String>,
}

/// One entry of the status timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    /// Status reached.
    pub status: OrderStatus,
    /// When it was reached.
    pub at: DateTime<Utc>,
    /// Optional note.
    pub note: Option<String>,
}

/// Status of one order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderState {
    /// Latest status received.
    pub current_status: Option<OrderStatus>,
    /// Transitions in arrival order, each (status, time) at most once.
    pub history: Vec<StatusChange>,
}

impl OrderState {
    fn record(&mut self, update: OrderStatusUpdate) -> bool {
        self.current_status = Some(update.new_status);

        let seen = self
            .history
            .iter()
            .any(|entry| entry.status == update.new_status && entry.at == update.updated_at);
        if !seen {
            self.history.push(StatusChange {
                status: update.new_status,
                at: update.updated_at,
                note: update.note,
            });
        }
        !seen
    }
}

/// Order tracking feed. Every transition marks the order queries stale.
#[derive(Debug)]
pub struct OrderFeature {
    cache: QueryCache,
}

impl OrderFeature {
    /// Creates the feature.
    #[must_use]
    pub fn new(cache: QueryCache) -> Self {
        Self { cache }
    }
}

impl Feature for OrderFeature {
    type State = OrderState;

    fn scope_kind(&self) -> Option<ScopeKind> {
        Some(ScopeKind::Order)
    }

    fn events(&self) -> &'static [&'static str] {
        &[events::ORDER_STATUS_UPDATED]
    }

    fn initial_state(&self) -> OrderState {
        OrderState::default()
    }

    fn on_event(&self, event: &str, payload: &Value, state: &StateTx<OrderState>) {
        let Some(update) = decode::<OrderStatusUpdate>(event, payload) else {
            return;
        };

        let order_id = update.order_id.clone();
        state.send_modify(|current| {
            current.record(update);
        });

        self.cache.invalidate(&keys::order(&order_id));
        self.cache.invalidate(&keys::orders());
    }
}

/// Live status of one order.
pub type OrderTracker = Binding<OrderFeature>;

impl Binding<OrderFeature> {
    /// Tracks an order.
    pub fn new(ctx: &RealtimeContext, order_id: Option<String>) -> Self {
        Self::bind(ctx, OrderFeature::new(ctx.cache().clone()), order_id)
    }
}
