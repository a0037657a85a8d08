//! Live product stock and inventory alerts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::binding::{decode, Binding, Feature, StateTx};
use super::scope::ScopeKind;
use crate::cache::{keys, QueryCache};
use crate::context::RealtimeContext;
use crate::ws::events;
use crate::ws::messages::string_id;

/// `stock_updated` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUpdate {
    /// Product id.
    #[serde(deserialize_with = "string_id")]
    pub product_id: String,
    /// Units in stock.
    pub stock: u64,
    /// Units sold so far.
    #[serde(default)]
    pub sold: Option<u64>,
}

/// Kind of inventory alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Stock fell below the seller's threshold.
    LowStock,
    /// Nothing left.
    OutOfStock,
    /// Restocked.
    BackInStock,
    /// Any kind this client does not know.
    #[serde(other)]
    Other,
}

/// `inventory_alert` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAlert {
    /// Product id.
    #[serde(deserialize_with = "string_id")]
    pub product_id: String,
    /// Alert kind.
    #[serde(rename = "type", alias = "alert_type")]
    pub kind: AlertKind,
    /// Stock at the time of the alert.
    #[serde(default)]
    pub stock: Option<u64>,
    /// Human readable message.
    #[serde(default)]
    pub message: Option<String>,
}

/// Stock of one product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryState {
    /// Units in stock.
    pub stock: Option<u64>,
    /// Units sold.
    pub sold: Option<u64>,
    /// Stock is positive and at or below the low stock threshold.
    pub is_low_stock: bool,
    /// Stock is zero.
    pub is_out_of_stock: bool,
    /// Most recent alert.
    pub last_alert: Option<InventoryAlert>,
}

impl InventoryState {
    fn apply_stock(&mut self, stock: u64, threshold: u64) {
        self.stock = Some(stock);
        self.is_out_of_stock = stock == 0;
        self.is_low_stock = stock > 0 && stock <= threshold;
    }
}

/// Inventory feed for one product. Last write wins; every change marks the
/// product query stale.
#[derive(Debug)]
pub struct InventoryFeature {
    low_stock_threshold: u64,
    cache: QueryCache,
}

impl InventoryFeature {
    /// Creates the feature.
    #[must_use]
    pub fn new(low_stock_threshold: u64, cache: QueryCache) -> Self {
        Self {
            low_stock_threshold,
            cache,
        }
    }
}

impl Feature for InventoryFeature {
    type State = InventoryState;

    fn scope_kind(&self) -> Option<ScopeKind> {
        Some(ScopeKind::Product)
    }

    fn events(&self) -> &'static [&'static str] {
        &[events::STOCK_UPDATED, events::INVENTORY_ALERT]
    }

    fn initial_state(&self) -> InventoryState {
        InventoryState::default()
    }

    fn on_event(&self, event: &str, payload: &Value, state: &StateTx<InventoryState>) {
        let threshold = self.low_stock_threshold;

        let product_id = match event {
            events::STOCK_UPDATED => {
                let Some(update) = decode::<StockUpdate>(event, payload) else {
                    return;
                };
                state.send_modify(|current| {
                    current.apply_stock(update.stock, threshold);
                    if update.sold.is_some() {
                        current.sold = update.sold;
                    }
                });
                update.product_id
            }
            _ => {
                let Some(alert) = decode::<InventoryAlert>(event, payload) else {
                    return;
                };
                let product_id = alert.product_id.clone();
                state.send_modify(|current| {
                    match (alert.kind, alert.stock) {
                        (_, Some(stock)) => current.apply_stock(stock, threshold),
                        (AlertKind::OutOfStock, None) => current.apply_stock(0, threshold),
                        (AlertKind::LowStock, None) => current.is_low_stock = true,
                        _ => {}
                    }
                    current.last_alert = Some(alert);
                });
                product_id
            }
        };

        self.cache.invalidate(&keys::product(&product_id));
    }
}

/// Live stock of one product.
pub type InventoryWatch = Binding<InventoryFeature>;

impl Binding<InventoryFeature> {
    /// Watches the stock of a product.
    pub fn new(ctx: &RealtimeContext, product_id: Option<String>) -> Self {
        let feature = InventoryFeature::new(ctx.config().low_stock_threshold, ctx.cache().clone());
        Self::bind(ctx, feature, product_id)
    }
}
