//! Storefront activity ticker ("someone in Hanoi just bought ...").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::binding::{decode, Binding, Feature, StateTx};
use super::scope::ScopeKind;
use crate::collections::RingBuffer;
use crate::context::RealtimeContext;
use crate::ws::events;

/// One ticker entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Kind, e.g. `purchase`, `review`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Display text.
    #[serde(default)]
    pub message: String,
    /// Related product.
    #[serde(default)]
    pub product_id: Option<String>,
    /// Display name of the shopper.
    #[serde(default)]
    pub user_name: Option<String>,
    /// Server time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Activity ticker, delivered to every session. Oldest entries evicted first.
#[derive(Debug)]
pub struct ActivityFeature {
    capacity: usize,
}

impl ActivityFeature {
    /// Creates the feature keeping at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }
}

impl Feature for ActivityFeature {
    type State = RingBuffer<Activity>;

    fn scope_kind(&self) -> Option<ScopeKind> {
        None
    }

    fn events(&self) -> &'static [&'static str] {
        &[events::ACTIVITY]
    }

    fn initial_state(&self) -> RingBuffer<Activity> {
        RingBuffer::new(self.capacity)
    }

    fn on_event(&self, event: &str, payload: &Value, state: &StateTx<RingBuffer<Activity>>) {
        if let Some(activity) = decode::<Activity>(event, payload) {
            state.send_modify(|ticker| {
                ticker.push(activity);
            });
        }
    }
}

/// Latest storefront activity.
pub type ActivityFeed = Binding<ActivityFeature>;

impl Binding<ActivityFeature> {
    /// Follows the activity ticker.
    pub fn new(ctx: &RealtimeContext) -> Self {
        Self::bind(ctx, ActivityFeature::new(ctx.config().activity_capacity), None)
    }
}
