//! Connection status.
//!
//! The single status value broadcast by the connection manager to every feed.

use serde::{Deserialize, Serialize};

/// Status of the shared realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Transport is being opened.
    Connecting,
    /// Transport is open; emits are delivered.
    Connected,
    /// No transport. Initial state.
    #[default]
    Disconnected,
    /// The last connection attempt failed.
    Error,
}

impl ConnectionStatus {
    /// Returns true if events can be sent.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns true while a connection is open or being opened.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Error => write!(f, "error"),
        }
    }
}
