//! Flash sale countdown.
//!
//! The server is authoritative: every `flash_sale_tick` overwrites the
//! remaining time. While the connection is down a local timer keeps the
//! countdown moving as an estimate; the first tick after reconnecting
//! replaces it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use super::binding::{decode, Binding, Feature, StateTx};
use super::scope::ScopeKind;
use crate::context::RealtimeContext;
use crate::util::lock;
use crate::ws::messages::string_id;
use crate::ws::{events, ConnectionStatus};

/// `flash_sale_tick` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashSaleTick {
    /// Sale id.
    #[serde(deserialize_with = "string_id")]
    pub sale_id: String,
    /// Seconds until the sale ends.
    pub remaining_seconds: u64,
}

/// `flash_sale_stock_updated` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashSaleStock {
    /// Sale id.
    #[serde(deserialize_with = "string_id")]
    pub sale_id: String,
    /// Product in the sale.
    #[serde(deserialize_with = "string_id")]
    pub product_id: String,
    /// Units left at the sale price.
    #[serde(alias = "stock")]
    pub remaining_stock: u64,
}

/// Countdown of one flash sale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlashSaleState {
    /// Seconds left, once known.
    pub remaining_seconds: Option<u64>,
    /// The sale is over.
    pub is_ended: bool,
    /// `remaining_seconds` comes from the local timer, not the server.
    pub is_estimate: bool,
    /// Units left per product.
    pub stock: BTreeMap<String, u64>,
}

/// Flash sale feed.
#[derive(Debug)]
pub struct FlashSaleFeature {
    tick: Duration,
    fallback: Mutex<Option<JoinHandle<()>>>,
}

impl FlashSaleFeature {
    /// Creates the feature. The local countdown advances by `tick`.
    #[must_use]
    pub fn new(tick: Duration) -> Self {
        Self {
            tick,
            fallback: Mutex::new(None),
        }
    }

    fn stop_fallback(&self) {
        if let Some(task) = lock(&self.fallback).take() {
            task.abort();
        }
    }
}

/// Decrements the known remaining time every `step` until it reaches zero.
///
/// Time is tracked in milliseconds; the published value is rounded up to
/// whole seconds so a sale never shows zero before it ends.
async fn count_down(state: StateTx<FlashSaleState>, step: Duration) {
    let step_ms = u64::try_from(step.as_millis()).unwrap_or(u64::MAX).max(1);
    let mut remaining_ms = state
        .borrow()
        .remaining_seconds
        .map_or(0, |secs| secs.saturating_mul(1000));
    let mut ticker = interval_at(Instant::now() + step, step);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        remaining_ms = remaining_ms.saturating_sub(step_ms);
        let shown = remaining_ms.div_ceil(1000);

        let mut running = true;
        state.send_if_modified(|sale| match sale.remaining_seconds {
            Some(current) if !sale.is_ended && current > 0 => {
                let changed = current != shown || !sale.is_estimate;
                sale.remaining_seconds = Some(shown);
                sale.is_estimate = true;
                if remaining_ms == 0 {
                    sale.is_ended = true;
                    running = false;
                }
                changed || !running
            }
            _ => {
                running = false;
                false
            }
        });

        if !running {
            debug!("local flash sale countdown finished");
            break;
        }
    }
}

impl Feature for FlashSaleFeature {
    type State = FlashSaleState;

    fn scope_kind(&self) -> Option<ScopeKind> {
        Some(ScopeKind::FlashSale)
    }

    fn events(&self) -> &'static [&'static str] {
        &[
            events::FLASH_SALE_TICK,
            events::FLASH_SALE_STOCK_UPDATED,
            events::FLASH_SALE_ENDED,
        ]
    }

    fn initial_state(&self) -> FlashSaleState {
        FlashSaleState::default()
    }

    fn on_event(&self, event: &str, payload: &Value, state: &StateTx<FlashSaleState>) {
        match event {
            events::FLASH_SALE_TICK => {
                if let Some(tick) = decode::<FlashSaleTick>(event, payload) {
                    state.send_modify(|sale| {
                        sale.remaining_seconds = Some(tick.remaining_seconds);
                        sale.is_ended = tick.remaining_seconds == 0;
                        sale.is_estimate = false;
                    });
                }
            }
            events::FLASH_SALE_STOCK_UPDATED => {
                if let Some(update) = decode::<FlashSaleStock>(event, payload) {
                    state.send_modify(|sale| {
                        sale.stock.insert(update.product_id, update.remaining_stock);
                    });
                }
            }
            _ => {
                state.send_modify(|sale| {
                    sale.remaining_seconds = Some(0);
                    sale.is_ended = true;
                    sale.is_estimate = false;
                });
            }
        }
    }

    fn on_status(&self, status: ConnectionStatus, state: &StateTx<FlashSaleState>) {
        if status.is_connected() {
            self.stop_fallback();
            return;
        }

        let mut fallback = lock(&self.fallback);
        if fallback.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let known = {
            let sale = state.borrow();
            !sale.is_ended && sale.remaining_seconds.is_some_and(|s| s > 0)
        };
        if known {
            debug!(%status, "starting local flash sale countdown");
            *fallback = Some(tokio::spawn(count_down(Arc::clone(state), self.tick)));
        }
    }

    fn on_reset(&self) {
        self.stop_fallback();
    }
}

impl Drop for FlashSaleFeature {
    fn drop(&mut self) {
        self.stop_fallback();
    }
}

/// Countdown of one flash sale.
pub type FlashSaleCountdown = Binding<FlashSaleFeature>;

impl Binding<FlashSaleFeature> {
    /// Follows a flash sale.
    pub fn new(ctx: &RealtimeContext, sale_id: Option<String>) -> Self {
        Self::bind(ctx, FlashSaleFeature::new(ctx.config().countdown_tick()), sale_id)
    }
}
