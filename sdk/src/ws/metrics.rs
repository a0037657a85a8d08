//! Socket metrics tracking.
//!
//! Atomic counters for the shared realtime connection.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for the shared socket.
#[derive(Debug, Default)]
pub struct SocketMetrics {
    /// Connection attempts, including reconnects.
    connect_attempts: AtomicU64,

    /// Attempts that produced a live transport.
    connects: AtomicU64,

    /// Reconnect attempts after a lost transport.
    reconnects: AtomicU64,

    /// Frames handed to the transport.
    frames_sent: AtomicU64,

    /// Frames received from the transport.
    frames_received: AtomicU64,

    /// Emits dropped because the socket was not connected.
    frames_dropped: AtomicU64,

    /// Handlers registered with `on`.
    handlers_registered: AtomicU64,

    /// Handlers removed with `off`.
    handlers_removed: AtomicU64,
}

impl SocketMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a connection attempt.
    pub fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successful connection.
    pub fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a reconnect attempt.
    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a frame sent.
    pub fn record_frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a frame received.
    pub fn record_frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a dropped emit.
    pub fn record_frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a handler registration.
    pub fn record_handler_registered(&self) {
        self.handlers_registered.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a handler removal.
    pub fn record_handler_removed(&self) {
        self.handlers_removed.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of connection attempts.
    #[must_use]
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::Relaxed)
    }

    /// Returns the number of successful connections.
    #[must_use]
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    /// Returns the number of reconnect attempts.
    #[must_use]
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Returns the number of frames sent.
    #[must_use]
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    /// Returns the number of frames received.
    #[must_use]
    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    /// Returns the number of dropped emits.
    #[must_use]
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    /// Returns the number of handler registrations.
    #[must_use]
    pub fn handlers_registered(&self) -> u64 {
        self.handlers_registered.load(Ordering::Relaxed)
    }

    /// Returns the number of handler removals.
    #[must_use]
    pub fn handlers_removed(&self) -> u64 {
        self.handlers_removed.load(Ordering::Relaxed)
    }

    /// Returns the number of handlers currently registered.
    #[must_use]
    pub fn live_handlers(&self) -> u64 {
        self.handlers_registered()
            .saturating_sub(self.handlers_removed())
    }

    /// Returns a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> SocketMetricsSnapshot {
        SocketMetricsSnapshot {
            connect_attempts: self.connect_attempts(),
            connects: self.connects(),
            reconnects: self.reconnects(),
            frames_sent: self.frames_sent(),
            frames_received: self.frames_received(),
            frames_dropped: self.frames_dropped(),
            handlers_registered: self.handlers_registered(),
            handlers_removed: self.handlers_removed(),
        }
    }
}

/// A point-in-time snapshot of socket metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketMetricsSnapshot {
    /// Connection attempts.
    pub connect_attempts: u64,
    /// Successful connections.
    pub connects: u64,
    /// Reconnect attempts.
    pub reconnects: u64,
    /// Frames sent.
    pub frames_sent: u64,
    /// Frames received.
    pub frames_received: u64,
    /// Dropped emits.
    pub frames_dropped: u64,
    /// Handler registrations.
    pub handlers_registered: u64,
    /// Handler removals.
    pub handlers_removed: u64,
}
