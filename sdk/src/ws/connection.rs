//! Connection manager.
//!
//! Owns the single shared transport for the session, supervises it, and
//! broadcasts its status to every feed.

use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::WsConfig;
use super::error::WsError;
use super::handle::SocketHandle;
use super::handlers::HandlerRegistry;
use super::messages::EventFrame;
use super::metrics::SocketMetrics;
use super::scopes::ScopeRegistry;
use super::status::ConnectionStatus;
use super::transport::{Connector, Link, TungsteniteConnector};
use crate::util::{lock, read, write};

/// State shared between the manager, its supervisor task and every handle.
pub(crate) struct SocketShared {
    pub(crate) config: WsConfig,
    connector: Arc<dyn Connector>,
    pub(crate) status: watch::Sender<ConnectionStatus>,
    outbound: RwLock<Option<mpsc::UnboundedSender<EventFrame>>>,
    pub(crate) handlers: HandlerRegistry,
    pub(crate) scopes: ScopeRegistry,
    pub(crate) metrics: Arc<SocketMetrics>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SocketShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketShared")
            .field("url", &self.config.url)
            .field("status", &*self.status.borrow())
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}

impl SocketShared {
    /// Publishes a status, notifying watchers only on change.
    fn set_status(&self, next: ConnectionStatus) {
        self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                debug!(from = %current, to = %next, "connection status changed");
                *current = next;
                true
            }
        });
    }

    /// Hands a frame to the open link.
    ///
    /// Returns false (and counts a drop) if there is no link.
    pub(crate) fn send(&self, frame: EventFrame) -> bool {
        let sent = read(&self.outbound)
            .as_ref()
            .is_some_and(|tx| tx.send(frame).is_ok());

        if sent {
            self.metrics.record_frame_sent();
        } else {
            self.metrics.record_frame_dropped();
        }
        sent
    }

    /// Forgets the current link and the server-side rooms tied to it.
    fn drop_link(&self) {
        write(&self.outbound).take();
        self.scopes.clear();
    }
}

/// Maintains exactly one realtime connection for the session.
///
/// Dropping the manager tears the connection down.
#[derive(Debug)]
pub struct ConnectionManager {
    shared: Arc<SocketShared>,
}

impl ConnectionManager {
    /// Creates a manager that opens links through the given connector.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: WsConfig, connector: Arc<dyn Connector>) -> Result<Self, WsError> {
        config.validate()?;

        let metrics = Arc::new(SocketMetrics::new());
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);

        Ok(Self {
            shared: Arc::new(SocketShared {
                config,
                connector,
                status,
                outbound: RwLock::new(None),
                handlers: HandlerRegistry::new(Arc::clone(&metrics)),
                scopes: ScopeRegistry::new(),
                metrics,
                supervisor: Mutex::new(None),
            }),
        })
    }

    /// Creates a manager over a real WebSocket transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn websocket(config: WsConfig) -> Result<Self, WsError> {
        let connector = Arc::new(TungsteniteConnector::from_config(&config));
        Self::new(config, connector)
    }

    /// Creates a manager for the given URL with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn with_url(url: impl Into<String>) -> Result<Self, WsError> {
        Self::websocket(WsConfig::new(url))
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &WsConfig {
        &self.shared.config
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.borrow()
    }

    /// Returns true if connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Returns a receiver that observes every status change.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    /// Returns the socket metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<SocketMetrics> {
        Arc::clone(&self.shared.metrics)
    }

    /// Returns the event access handle shared by feeds.
    #[must_use]
    pub fn handle(&self) -> SocketHandle {
        SocketHandle::new(Arc::clone(&self.shared))
    }

    /// Opens the connection.
    ///
    /// No-op while connecting or connected. Otherwise the status moves to
    /// `Connecting` and a supervisor task opens the link, moving to
    /// `Connected` on success or `Error` on failure. Must be called from
    /// within a Tokio runtime.
    pub fn connect(&self) {
        let mut supervisor = lock(&self.shared.supervisor);

        if self.status().is_active() {
            debug!("connect ignored, connection already active");
            return;
        }

        if let Some(previous) = supervisor.take() {
            previous.abort();
        }

        self.shared.set_status(ConnectionStatus::Connecting);
        info!(url = %self.shared.config.url, "opening realtime connection");

        *supervisor = Some(tokio::spawn(supervise(Arc::clone(&self.shared))));
    }

    /// Closes the connection. Idempotent.
    pub fn disconnect(&self) {
        if let Some(supervisor) = lock(&self.shared.supervisor).take() {
            supervisor.abort();
            info!("realtime connection closed");
        }

        self.shared.drop_link();
        self.shared.set_status(ConnectionStatus::Disconnected);
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Runs links until told to stop, reconnecting with capped backoff.
async fn supervise(shared: Arc<SocketShared>) {
    let url = shared.config.connection_url();
    let mut attempt: u32 = 0;

    loop {
        shared.metrics.record_connect_attempt();
        shared.set_status(ConnectionStatus::Connecting);

        match shared.connector.connect(&url).await {
            Ok(link) => {
                attempt = 0;
                run_link(&shared, link).await;
                warn!("realtime connection lost");
            }
            Err(e) => {
                warn!(error = %e, attempt, "realtime connection failed");
                shared.set_status(ConnectionStatus::Error);
            }
        }

        if !shared.config.allows_reconnect(attempt) {
            debug!("reconnect attempts exhausted");
            break;
        }

        let delay = shared.config.backoff_delay(attempt);
        attempt = attempt.saturating_add(1);
        shared.metrics.record_reconnect();
        debug!(?delay, attempt, "scheduling reconnect");
        tokio::time::sleep(delay).await;
    }
}

/// Dispatches frames from one link until it is lost.
async fn run_link(shared: &SocketShared, link: Link) {
    let Link {
        outgoing,
        mut incoming,
    } = link;

    *write(&shared.outbound) = Some(outgoing);
    shared.metrics.record_connect();
    shared.set_status(ConnectionStatus::Connected);
    info!("realtime connection established");

    while let Some(frame) = incoming.recv().await {
        shared.metrics.record_frame_received();
        let delivered = shared.handlers.dispatch(&frame);
        if delivered == 0 {
            debug!(event = %frame.event, "no handler for event");
        }
    }

    shared.drop_link();
    shared.set_status(ConnectionStatus::Disconnected);
}
