//! Event access handle.
//!
//! [`SocketHandle`] is what feeds hold instead of the raw transport: `emit`,
//! `on` and `off`, gated by the connection status.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::connection::SocketShared;
use super::handlers::{Handler, HandlerId};
use super::messages::EventFrame;
use super::metrics::SocketMetrics;
use super::status::ConnectionStatus;
use crate::sync::scope::Scope;

/// Cloneable access to the shared socket.
#[derive(Debug, Clone)]
pub struct SocketHandle {
    shared: Arc<SocketShared>,
}

impl SocketHandle {
    pub(crate) fn new(shared: Arc<SocketShared>) -> Self {
        Self { shared }
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

    /// Returns a number that changes every time a new link is established.
    ///
    /// Server rooms do not survive a link, so anything subscribed under an
    /// older epoch must subscribe again.
    #[must_use]
    pub fn connection_epoch(&self) -> u64 {
        self.shared.metrics.connects()
    }

    /// Sends an event to the server.
    ///
    /// Silently dropped when not connected: nothing is queued and no error
    /// is surfaced.
    pub fn emit(&self, event: &str, data: impl Serialize) {
        if !self.is_connected() {
            debug!(event, "dropping emit while disconnected");
            self.shared.metrics.record_frame_dropped();
            return;
        }

        match EventFrame::new(event, data) {
            Ok(frame) => {
                self.shared.send(frame);
            }
            Err(e) => {
                warn!(event, error = %e, "dropping unserializable emit");
                self.shared.metrics.record_frame_dropped();
            }
        }
    }

    /// Registers a handler for a server event.
    ///
    /// The caller pairs every `on` with an `off`.
    pub fn on(&self, event: impl Into<String>, handler: Handler) -> HandlerId {
        self.shared.handlers.on(event, handler)
    }

    /// Registers a closure for a server event.
    pub fn on_fn<F>(&self, event: impl Into<String>, handler: F) -> HandlerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.on(event, Arc::new(handler))
    }

    /// Removes a handler. Returns true if it was registered.
    pub fn off(&self, event: &str, id: HandlerId) -> bool {
        self.shared.handlers.off(event, id)
    }

    /// Returns the number of handlers registered for an event.
    #[must_use]
    pub fn handler_count(&self, event: &str) -> usize {
        self.shared.handlers.handler_count(event)
    }

    /// Joins a scope on behalf of `owner`.
    ///
    /// Emits `subscribe_<resource>` only for the first holder. No-op when
    /// disconnected. Returns true if the subscribe was emitted.
    pub fn subscribe_scope(&self, scope: &Scope, owner: u64) -> bool {
        if !self.is_connected() {
            return false;
        }

        if self.shared.scopes.acquire(scope, owner) {
            debug!(%scope, "subscribing");
            self.emit(&scope.subscribe_event(), scope.payload());
            true
        } else {
            false
        }
    }

    /// Leaves a scope on behalf of `owner`.
    ///
    /// Emits `unsubscribe_<resource>` only when the last holder leaves and
    /// the socket is connected. Returns true if the unsubscribe was emitted.
    pub fn unsubscribe_scope(&self, scope: &Scope, owner: u64) -> bool {
        if !self.shared.scopes.release(scope, owner) || !self.is_connected() {
            return false;
        }

        debug!(%scope, "unsubscribing");
        self.emit(&scope.unsubscribe_event(), scope.payload());
        true
    }

    /// Returns the number of holders of a scope on the current connection.
    #[must_use]
    pub fn scope_holders(&self, scope: &Scope) -> usize {
        self.shared.scopes.holder_count(scope)
    }
}
