//! Cart synchronization across the user's tabs and devices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::binding::{decode, Binding, Feature, StateTx};
use super::scope::ScopeKind;
use crate::cache::{keys, QueryCache};
use crate::context::RealtimeContext;
use crate::ws::messages::string_id;
use crate::ws::{commands, events};

/// `cart_updated` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartUpdate {
    /// Cart owner.
    #[serde(deserialize_with = "string_id")]
    pub user_id: String,
    /// Items in the cart after the change.
    #[serde(default)]
    pub item_count: Option<u64>,
    /// What happened, e.g. `add`, `remove`, `checkout`.
    #[serde(default)]
    pub action: Option<String>,
    /// Server time of the change.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// What this session knows about remote cart changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartState {
    /// Item count from the latest update that carried one.
    pub item_count: Option<u64>,
    /// Action of the latest update.
    pub last_action: Option<String>,
    /// Number of remote updates received.
    pub revision: u64,
    /// Time of the latest update.
    pub last_synced: Option<DateTime<Utc>>,
}

/// Cart feed. The REST cart stays the source of truth; updates only mark
/// it stale.
#[derive(Debug)]
pub struct CartFeature {
    cache: QueryCache,
}

impl CartFeature {
    /// Creates the feature.
    #[must_use]
    pub fn new(cache: QueryCache) -> Self {
        Self { cache }
    }
}

impl Feature for CartFeature {
    type State = CartState;

    fn scope_kind(&self) -> Option<ScopeKind> {
        Some(ScopeKind::Cart)
    }

    fn events(&self) -> &'static [&'static str] {
        &[events::CART_UPDATED]
    }

    fn initial_state(&self) -> CartState {
        CartState::default()
    }

    fn on_event(&self, event: &str, payload: &Value, state: &StateTx<CartState>) {
        let Some(update) = decode::<CartUpdate>(event, payload) else {
            return;
        };

        state.send_modify(|current| {
            if update.item_count.is_some() {
                current.item_count = update.item_count;
            }
            current.last_action = update.action;
            current.revision += 1;
            current.last_synced = Some(update.updated_at.unwrap_or_else(Utc::now));
        });

        self.cache.invalidate(&keys::cart());
    }
}

/// Cart sync for the signed-in user.
pub type CartSync = Binding<CartFeature>;

impl Binding<CartFeature> {
    /// Syncs the cart of a user.
    pub fn new(ctx: &RealtimeContext, user_id: Option<String>) -> Self {
        Self::bind(ctx, CartFeature::new(ctx.cache().clone()), user_id)
    }

    /// Tells the user's other sessions that this one changed the cart.
    ///
    /// Dropped when disconnected. Returns true if sent.
    pub fn announce_change(&self, action: &str, item_count: Option<u64>) -> bool {
        self.emit_scoped(
            commands::CART_CHANGED,
            json!({ "action": action, "item_count": item_count }),
        )
    }
}
