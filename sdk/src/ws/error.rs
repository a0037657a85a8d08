//! Connection errors.
//!
//! Only setup and connectors produce these. Feeds never see them; a failed
//! link shows up as a status change and the feed keeps its stale state.

use std::fmt;

/// Why the shared connection could not be set up or opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsError {
    /// The configuration cannot describe a usable connection.
    InvalidConfig(&'static str),

    /// The server could not be reached or refused the upgrade.
    Connect(String),
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(reason) => write!(f, "invalid websocket config: {reason}"),
            Self::Connect(reason) => write!(f, "cannot open realtime connection: {reason}"),
        }
    }
}

impl std::error::Error for WsError {}
