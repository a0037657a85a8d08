//! Live viewer count of a product page.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::binding::{decode, Binding, Feature, StateTx};
use super::scope::ScopeKind;
use crate::context::RealtimeContext;
use crate::ws::events;
use crate::ws::messages::string_id;

/// `viewer_count_updated` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerCountUpdate {
    /// Product id.
    #[serde(deserialize_with = "string_id")]
    pub product_id: String,
    /// Shoppers currently on the page.
    #[serde(alias = "viewer_count")]
    pub count: u64,
}

/// Viewer counter. Last write wins.
#[derive(Debug, Default)]
pub struct ViewerFeature;

impl Feature for ViewerFeature {
    type State = u64;

    fn scope_kind(&self) -> Option<ScopeKind> {
        Some(ScopeKind::ProductViewers)
    }

    fn events(&self) -> &'static [&'static str] {
        &[events::VIEWER_COUNT_UPDATED]
    }

    fn initial_state(&self) -> u64 {
        0
    }

    fn on_event(&self, event: &str, payload: &Value, state: &StateTx<u64>) {
        if let Some(update) = decode::<ViewerCountUpdate>(event, payload) {
            state.send_if_modified(|count| {
                let changed = *count != update.count;
                *count = update.count;
                changed
            });
        }
    }
}

/// Number of shoppers viewing a product.
pub type ViewerCount = Binding<ViewerFeature>;

impl Binding<ViewerFeature> {
    /// Counts viewers of a product.
    pub fn new(ctx: &RealtimeContext, product_id: Option<String>) -> Self {
        Self::bind(ctx, ViewerFeature, product_id)
    }
}
