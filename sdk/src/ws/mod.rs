//! Shared realtime connection.
//!
//! This module owns the single WebSocket connection of a storefront session
//! and the event access handle every feed goes through.
//!
//! # Example
//!
//! ```rust,ignore
//! use storefront_sdk::ws::{ConnectionManager, WsConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = ConnectionManager::websocket(
//!         WsConfig::new("wss://shop.example/realtime").with_auth_token("session-token"),
//!     )?;
//!
//!     manager.connect();
//!
//!     let socket = manager.handle();
//!     socket.on_fn("notification", |payload| println!("{payload}"));
//!
//!     tokio::signal::ctrl_c().await?;
//!     manager.disconnect();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod handle;
pub mod handlers;
pub mod memory;
pub mod messages;
pub mod metrics;
pub mod scopes;
pub mod status;
pub mod transport;

pub use config::WsConfig;
pub use connection::ConnectionManager;
pub use error::WsError;
pub use handle::SocketHandle;
pub use handlers::{Handler, HandlerId, HandlerRegistry};
pub use memory::MemoryConnector;
pub use messages::{commands, events, EventFrame};
pub use metrics::{SocketMetrics, SocketMetricsSnapshot};
pub use scopes::ScopeRegistry;
pub use status::ConnectionStatus;
pub use transport::{Connector, Link, TungsteniteConnector};
