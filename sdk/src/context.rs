//! Realtime context.
//!
//! Everything a feed needs, passed in explicitly: the socket handle, the
//! query cache and the feed configuration. There is no global connection;
//! tests build one context per test around a [`MemoryConnector`].
//!
//! [`MemoryConnector`]: crate::ws::MemoryConnector

use std::sync::Arc;

use crate::cache::QueryCache;
use crate::config::SyncConfig;
use crate::error::{ConfigError, SdkError};
use crate::ws::{ConnectionManager, Connector, SocketHandle, TungsteniteConnector, WsConfig};

/// Capabilities injected into every feed.
#[derive(Debug, Clone)]
pub struct RealtimeContext {
    socket: SocketHandle,
    cache: QueryCache,
    config: SyncConfig,
}

impl RealtimeContext {
    /// Creates a context.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        socket: SocketHandle,
        cache: QueryCache,
        config: SyncConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            socket,
            cache,
            config,
        })
    }

    /// Validates both configs, then builds a manager over `connector` and a
    /// context with a fresh cache around it. Nothing is dialled until
    /// [`ConnectionManager::connect`].
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Ws`] for socket settings and [`SdkError::Config`]
    /// for feed settings.
    pub fn open(
        ws: WsConfig,
        connector: Arc<dyn Connector>,
        config: SyncConfig,
    ) -> Result<(ConnectionManager, Self), SdkError> {
        let manager = ConnectionManager::new(ws, connector)?;
        let ctx = Self::new(manager.handle(), QueryCache::default(), config)?;
        Ok((manager, ctx))
    }

    /// [`RealtimeContext::open`] over a real WebSocket.
    ///
    /// # Errors
    ///
    /// Same as [`RealtimeContext::open`].
    pub fn websocket(
        ws: WsConfig,
        config: SyncConfig,
    ) -> Result<(ConnectionManager, Self), SdkError> {
        let connector = Arc::new(TungsteniteConnector::from_config(&ws));
        Self::open(ws, connector, config)
    }

    /// Creates a context for a manager with a fresh cache and default config.
    #[must_use]
    pub fn for_manager(manager: &ConnectionManager) -> Self {
        Self {
            socket: manager.handle(),
            cache: QueryCache::default(),
            config: SyncConfig::default(),
        }
    }

    /// Returns the socket handle.
    #[must_use]
    pub fn socket(&self) -> &SocketHandle {
        &self.socket
    }

    /// Returns the query cache.
    #[must_use]
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Returns the feed configuration.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }
}
