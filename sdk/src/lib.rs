//! Storefront SDK - realtime event sync for an e-commerce storefront.
//!
//! One WebSocket connection per session carries every server push: prices,
//! stock, order status, chat, notifications and seller dashboards. This crate
//! owns that connection, routes events to typed feeds and keeps the query
//! cache honest by marking affected entries stale.
//!
//! # Layout
//!
//! - [`ws`]: the shared connection, reconnect policy and event handle
//! - [`sync`]: one feed per realtime concern, each a [`sync::Binding`]
//! - [`cache`]: query keys and the invalidation-aware cache
//! - [`collections`]: bounded buffers, TTL maps and snapshot merging
//! - [`config`]: feed tuning ([`SyncConfig`])
//!
//! # Example
//!
//! ```rust,ignore
//! use storefront_sdk::sync::{OrderTracker, PriceWatch};
//! use storefront_sdk::ws::{ConnectionManager, WsConfig};
//! use storefront_sdk::RealtimeContext;
//!
//! let manager = ConnectionManager::websocket(WsConfig::new("wss://shop.example/realtime"))?;
//! manager.connect();
//!
//! let ctx = RealtimeContext::for_manager(&manager);
//! let price = PriceWatch::new(&ctx, Some("P1".to_string()));
//! let order = OrderTracker::new(&ctx, Some("O42".to_string()));
//!
//! let mut changes = price.state();
//! changes.changed().await?;
//! println!("{:?} {:?}", changes.borrow().price, order.snapshot().current_status);
//! ```

pub mod cache;
pub mod collections;
pub mod config;
pub mod context;
pub mod error;
pub mod sync;
pub mod ws;

mod util;

#[cfg(test)]
mod testing;

pub use cache::{keys, QueryCache, QueryKey};
pub use config::SyncConfig;
pub use context::RealtimeContext;
pub use error::{ConfigError, SdkError};
pub use ws::{ConnectionManager, ConnectionStatus, SocketHandle, WsConfig};
