//! Test harness around an in-memory connection.

use std::sync::Arc;

use serde_json::Value;

use crate::cache::QueryCache;
use crate::config::SyncConfig;
use crate::context::RealtimeContext;
use crate::ws::{ConnectionManager, ConnectionStatus, MemoryConnector, WsConfig};

/// Lets spawned tasks run until they block.
pub(crate) async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// A manager over a [`MemoryConnector`] plus a context for feeds.
pub(crate) struct Harness {
    pub(crate) connector: MemoryConnector,
    pub(crate) manager: ConnectionManager,
    pub(crate) ctx: RealtimeContext,
}

impl Harness {
    /// Disconnected harness that never reconnects on its own.
    pub(crate) fn new() -> Self {
        Self::build(
            WsConfig::new("ws://memory").with_max_reconnect_attempts(0),
            SyncConfig::default(),
        )
    }

    /// Disconnected harness with the given feed config.
    pub(crate) fn with_sync_config(config: SyncConfig) -> Self {
        Self::build(
            WsConfig::new("ws://memory").with_max_reconnect_attempts(0),
            config,
        )
    }

    /// Disconnected harness with the given socket config.
    pub(crate) fn with_ws_config(config: WsConfig) -> Self {
        Self::build(config, SyncConfig::default())
    }

    fn build(ws: WsConfig, sync: SyncConfig) -> Self {
        let connector = MemoryConnector::new();
        let manager =
            ConnectionManager::new(ws, Arc::new(connector.clone())).expect("manager");
        let ctx = RealtimeContext::new(manager.handle(), QueryCache::default(), sync)
            .expect("context");
        Self {
            connector,
            manager,
            ctx,
        }
    }

    /// Connected harness.
    pub(crate) async fn connected() -> Self {
        let harness = Self::new();
        harness.connect().await;
        harness
    }

    /// Connects and waits until every task has seen it.
    pub(crate) async fn connect(&self) {
        self.manager.connect();
        self.wait_for(ConnectionStatus::Connected).await;
    }

    /// Waits for a status, then settles.
    pub(crate) async fn wait_for(&self, wanted: ConnectionStatus) {
        self.manager
            .watch_status()
            .wait_for(|status| *status == wanted)
            .await
            .expect("status");
        settle().await;
    }

    /// Plays a server event and lets it be dispatched.
    pub(crate) async fn push(&self, event: &str, data: Value) {
        assert!(self.connector.push(event, data), "no open link");
        settle().await;
    }

    /// Drops the link and waits until every task has seen it.
    pub(crate) async fn drop_link(&self) {
        self.connector.drop_link();
        self.wait_for(ConnectionStatus::Disconnected).await;
    }

    /// Frames the client sent, as (event, payload) pairs.
    pub(crate) fn sent(&self) -> Vec<(String, Value)> {
        self.connector
            .sent()
            .into_iter()
            .map(|frame| (frame.event, frame.data))
            .collect()
    }
}
