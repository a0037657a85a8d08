//! Event handler registry.
//!
//! Maps event names to the handlers registered with `on`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use super::messages::EventFrame;
use super::metrics::SocketMetrics;

/// A payload handler.
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Identifies one registration so it can be removed with `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    /// Returns the raw id.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

/// Registry of handlers keyed by event name.
pub struct HandlerRegistry {
    handlers: DashMap<String, Vec<(HandlerId, Handler)>>,
    next_id: AtomicU64,
    metrics: Arc<SocketMetrics>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("events", &self.handlers.len())
            .field("handlers", &self.total_handlers())
            .finish()
    }
}

impl HandlerRegistry {
    /// Creates an empty registry reporting into the given metrics.
    #[must_use]
    pub fn new(metrics: Arc<SocketMetrics>) -> Self {
        Self {
            handlers: DashMap::new(),
            next_id: AtomicU64::new(1),
            metrics,
        }
    }

    /// Registers a handler for an event.
    pub fn on(&self, event: impl Into<String>, handler: Handler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .entry(event.into())
            .or_default()
            .push((id, handler));
        self.metrics.record_handler_registered();
        id
    }

    /// Removes a handler. Returns true if it was registered.
    pub fn off(&self, event: &str, id: HandlerId) -> bool {
        let removed = match self.handlers.get_mut(event) {
            Some(mut list) => {
                let before = list.len();
                list.retain(|(existing, _)| *existing != id);
                list.len() != before
            }
            None => false,
        };

        if removed {
            self.handlers.remove_if(event, |_, list| list.is_empty());
            self.metrics.record_handler_removed();
        }

        removed
    }

    /// Invokes every handler registered for the frame's event.
    ///
    /// The handler list is cloned before invocation, so handlers may call
    /// `on` and `off` themselves. Returns the number of handlers invoked.
    pub fn dispatch(&self, frame: &EventFrame) -> usize {
        let handlers: Vec<Handler> = self
            .handlers
            .get(&frame.event)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        for handler in &handlers {
            handler(&frame.data);
        }

        handlers.len()
    }

    /// Returns the number of handlers registered for an event.
    #[must_use]
    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.get(event).map(|list| list.len()).unwrap_or(0)
    }

    /// Returns the number of handlers across all events.
    #[must_use]
    pub fn total_handlers(&self) -> usize {
        self.handlers.iter().map(|entry| entry.value().len()).sum()
    }
}
