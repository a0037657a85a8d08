//! Live product price.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::binding::{decode, Binding, Feature, StateTx};
use super::scope::ScopeKind;
use crate::context::RealtimeContext;
use crate::ws::events;
use crate::ws::messages::string_id;

/// `price_updated` payload. Prices are in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdate {
    /// Product id.
    #[serde(deserialize_with = "string_id")]
    pub product_id: String,
    /// Price before the change.
    #[serde(default)]
    pub old_price: Option<u64>,
    /// Price after the change.
    pub new_price: u64,
    /// List price the new price is discounted from.
    #[serde(default)]
    pub new_price_before_discount: Option<u64>,
    /// Server time of the change.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Latest known price of a product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceState {
    /// Current price.
    pub price: Option<u64>,
    /// Price before the last change.
    pub previous_price: Option<u64>,
    /// List price, when discounted.
    pub price_before_discount: Option<u64>,
    /// True for a short while after a change, for highlighting.
    pub has_changed: bool,
    /// Time of the last change.
    pub updated_at: Option<DateTime<Utc>>,
}

impl PriceState {
    /// Discount off the list price in whole percent.
    #[must_use]
    pub fn discount_percent(&self) -> Option<u64> {
        let price = self.price?;
        let list = self.price_before_discount.filter(|list| *list > price)?;
        let percent = u128::from(list - price) * 100 / u128::from(list);
        u64::try_from(percent).ok()
    }
}

/// Price feed for one product. Last write wins.
#[derive(Debug)]
pub struct PriceFeature {
    highlight: Duration,
    changes: Arc<AtomicU64>,
}

impl PriceFeature {
    /// Creates the feature with the given highlight duration.
    #[must_use]
    pub fn new(highlight: Duration) -> Self {
        Self {
            highlight,
            changes: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Feature for PriceFeature {
    type State = PriceState;

    fn scope_kind(&self) -> Option<ScopeKind> {
        Some(ScopeKind::Product)
    }

    fn events(&self) -> &'static [&'static str] {
        &[events::PRICE_UPDATED]
    }

    fn initial_state(&self) -> PriceState {
        PriceState::default()
    }

    fn on_event(&self, event: &str, payload: &Value, state: &StateTx<PriceState>) {
        let Some(update) = decode::<PriceUpdate>(event, payload) else {
            return;
        };

        let change = self.changes.fetch_add(1, Ordering::SeqCst) + 1;
        state.send_modify(|current| {
            current.previous_price = update.old_price.or(current.price);
            current.price = Some(update.new_price);
            current.price_before_discount = update.new_price_before_discount;
            current.has_changed = true;
            current.updated_at = Some(update.updated_at.unwrap_or_else(Utc::now));
        });

        // Only the latest change clears the highlight.
        let state = Arc::clone(state);
        let changes = Arc::clone(&self.changes);
        let highlight = self.highlight;
        tokio::spawn(async move {
            tokio::time::sleep(highlight).await;
            if changes.load(Ordering::SeqCst) == change {
                state.send_if_modified(|current| std::mem::replace(&mut current.has_changed, false));
            }
        });
    }

    fn on_reset(&self) {
        self.changes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Live price of one product.
pub type PriceWatch = Binding<PriceFeature>;

impl Binding<PriceFeature> {
    /// Watches the price of a product.
    pub fn new(ctx: &RealtimeContext, product_id: Option<String>) -> Self {
        let feature = PriceFeature::new(ctx.config().price_highlight());
        Self::bind(ctx, feature, product_id)
    }
}
