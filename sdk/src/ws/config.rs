//! Realtime connection settings.

use std::time::Duration;

use super::error::WsError;

/// Realtime endpoint used when none is configured.
pub const DEFAULT_WS_URL: &str = "ws://localhost:5000/realtime";

/// Default heartbeat interval in seconds.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 25;

/// Default first reconnect delay in seconds.
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 1;

/// Default reconnect delay cap in seconds.
pub const MAX_RECONNECT_DELAY_SECS: u64 = 30;

/// Settings of the shared storefront socket.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// `ws://` or `wss://` endpoint, without the session token.
    pub url: String,
    /// Interval between WebSocket pings.
    pub heartbeat_interval: Duration,
    /// Delay before the first reconnect attempt.
    pub reconnect_delay: Duration,
    /// Upper bound of the doubling reconnect delay.
    pub max_reconnect_delay: Duration,
    /// Session token of the signed-in shopper or seller.
    pub auth_token: Option<String>,
    /// `None` retries forever, `Some(0)` never reconnects.
    pub max_reconnect_attempts: Option<u32>,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WS_URL)
    }
}

impl WsConfig {
    /// Settings for `url` with default timings, anonymous.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            reconnect_delay: Duration::from_secs(DEFAULT_RECONNECT_DELAY_SECS),
            max_reconnect_delay: Duration::from_secs(MAX_RECONNECT_DELAY_SECS),
            auth_token: None,
            max_reconnect_attempts: None,
        }
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(self, heartbeat_interval: Duration) -> Self {
        Self {
            heartbeat_interval,
            ..self
        }
    }

    /// Sets the first reconnect delay.
    #[must_use]
    pub fn with_reconnect_delay(self, reconnect_delay: Duration) -> Self {
        Self {
            reconnect_delay,
            ..self
        }
    }

    /// Sets the reconnect delay cap.
    #[must_use]
    pub fn with_max_reconnect_delay(self, max_reconnect_delay: Duration) -> Self {
        Self {
            max_reconnect_delay,
            ..self
        }
    }

    /// Authenticates the socket with a session token.
    #[must_use]
    pub fn with_auth_token(self, token: impl Into<String>) -> Self {
        Self {
            auth_token: Some(token.into()),
            ..self
        }
    }

    /// Limits reconnect attempts; `0` turns reconnection off.
    #[must_use]
    pub fn with_max_reconnect_attempts(self, attempts: u32) -> Self {
        Self {
            max_reconnect_attempts: Some(attempts),
            ..self
        }
    }

    /// Whether attempt number `attempts_so_far` (0-based) may run.
    #[must_use]
    pub fn allows_reconnect(&self, attempts_so_far: u32) -> bool {
        self.max_reconnect_attempts
            .map_or(true, |max| attempts_so_far < max)
    }

    /// Delay before reconnect attempt `attempt` (0-based): doubling from
    /// `reconnect_delay`, capped at `max_reconnect_delay`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.reconnect_delay
            .saturating_mul(factor)
            .min(self.max_reconnect_delay)
    }

    /// URL actually dialled: the endpoint plus `token=<session token>`,
    /// percent-encoded, as the first or an additional query parameter.
    #[must_use]
    pub fn connection_url(&self) -> String {
        let Some(token) = &self.auth_token else {
            return self.url.clone();
        };
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{separator}token={}", self.url, encode_query_value(token))
    }

    /// Checks the settings before any connection is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::InvalidConfig`] naming the first problem found.
    pub fn validate(&self) -> Result<(), WsError> {
        let problem = if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            Some("url must use ws:// or wss://")
        } else if self.url.ends_with("://") {
            Some("url has no host")
        } else if self.heartbeat_interval.is_zero() {
            Some("heartbeat interval must be positive")
        } else if self.reconnect_delay > self.max_reconnect_delay {
            Some("reconnect delay exceeds its cap")
        } else if self.auth_token.as_deref().is_some_and(str::is_empty) {
            Some("auth token is empty")
        } else {
            None
        };

        problem.map_or(Ok(()), |reason| Err(WsError::InvalidConfig(reason)))
    }
}

/// Percent-encodes everything outside the URL unreserved set.
fn encode_query_value(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_appended_as_query() {
        let config = WsConfig::new("wss://shop.example/realtime").with_auth_token("s3ss10n");
        assert_eq!(
            config.connection_url(),
            "wss://shop.example/realtime?token=s3ss10n"
        );
    }

    #[test]
    fn test_token_joins_existing_query() {
        let config =
            WsConfig::new("wss://shop.example/realtime?locale=vi").with_auth_token("s3ss10n");
        assert_eq!(
            config.connection_url(),
            "wss://shop.example/realtime?locale=vi&token=s3ss10n"
        );
    }

    #[test]
    fn test_token_is_percent_encoded() {
        let config = WsConfig::new("ws://shop.test/realtime").with_auth_token("a+b/c=");
        assert_eq!(
            config.connection_url(),
            "ws://shop.test/realtime?token=a%2Bb%2Fc%3D"
        );
    }

    #[test]
    fn test_anonymous_url_untouched() {
        let config = WsConfig::default();
        assert_eq!(config.connection_url(), DEFAULT_WS_URL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_attempts_disables_reconnect() {
        let config = WsConfig::default().with_max_reconnect_attempts(0);
        assert!(!config.allows_reconnect(0));
    }

    #[test]
    fn test_unlimited_reconnect_by_default() {
        let config = WsConfig::default();
        assert!(config.allows_reconnect(0));
        assert!(config.allows_reconnect(u32::MAX - 1));

        let limited = config.with_max_reconnect_attempts(3);
        assert!(limited.allows_reconnect(2));
        assert!(!limited.allows_reconnect(3));
    }

    #[test]
    fn test_backoff_reaches_cap() {
        let config = WsConfig::default()
            .with_reconnect_delay(Duration::from_millis(500))
            .with_max_reconnect_delay(Duration::from_secs(5));

        let delays: Vec<u128> = (0..6).map(|n| config.backoff_delay(n).as_millis()).collect();
        assert_eq!(delays, vec![500, 1000, 2000, 4000, 5000, 5000]);
        assert_eq!(config.backoff_delay(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_validate_reports_first_problem() {
        let cases = [
            (WsConfig::new("https://shop.example"), "url must use ws:// or wss://"),
            (WsConfig::new("wss://"), "url has no host"),
            (
                WsConfig::default().with_heartbeat_interval(Duration::ZERO),
                "heartbeat interval must be positive",
            ),
            (
                WsConfig::default().with_reconnect_delay(Duration::from_secs(60)),
                "reconnect delay exceeds its cap",
            ),
            (WsConfig::default().with_auth_token(""), "auth token is empty"),
        ];

        for (config, reason) in cases {
            assert_eq!(config.validate(), Err(WsError::InvalidConfig(reason)));
        }
    }
}
