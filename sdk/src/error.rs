//! SDK error types.
//!
//! Feeds never surface errors; these come from setup only: configuration
//! validation and opening the connection.

use crate::ws::WsError;

/// Invalid feed configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A duration that must be positive is zero.
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    /// A buffer capacity that must be positive is zero.
    #[error("{0} must hold at least one item")]
    ZeroCapacity(&'static str),
}

/// SDK errors.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    /// Invalid feed configuration.
    #[error("invalid sync config: {0}")]
    Config(#[from] ConfigError),

    /// Connection setup failed.
    #[error(transparent)]
    Ws(#[from] WsError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::ZeroDuration("typing_ttl_ms");
        assert_eq!(err.to_string(), "typing_ttl_ms must be greater than zero");
    }

    #[test]
    fn test_sdk_error_from_config() {
        let err: SdkError = ConfigError::ZeroCapacity("chat_capacity").into();
        assert_eq!(
            err.to_string(),
            "invalid sync config: chat_capacity must hold at least one item"
        );
    }

    #[test]
    fn test_sdk_error_from_ws() {
        let err: SdkError = WsError::Connect("refused".to_string()).into();
        assert_eq!(err.to_string(), "cannot open realtime connection: refused");
    }
}
