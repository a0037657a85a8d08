//! Feed configuration.
//!
//! Timings and buffer sizes shared by every feed of a session.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How long a typing signal stays visible without a refresh.
pub const DEFAULT_TYPING_TTL_MS: u64 = 3000;

/// How long a price change stays highlighted.
pub const DEFAULT_PRICE_HIGHLIGHT_MS: u64 = 3000;

/// Local flash sale countdown step while disconnected.
pub const DEFAULT_COUNTDOWN_TICK_MS: u64 = 1000;

/// Activity ticker length.
pub const DEFAULT_ACTIVITY_CAPACITY: usize = 10;

/// Seller dashboard notification list length.
pub const DEFAULT_SELLER_NOTIFICATION_CAPACITY: usize = 50;

/// Chat message window length.
pub const DEFAULT_CHAT_CAPACITY: usize = 50;

/// Stock at or below which a product counts as low stock.
pub const DEFAULT_LOW_STOCK_THRESHOLD: u64 = 10;

/// Configuration shared by every feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Typing indicator expiry in milliseconds.
    pub typing_ttl_ms: u64,

    /// Price change highlight duration in milliseconds.
    pub price_highlight_ms: u64,

    /// Local countdown step in milliseconds.
    pub countdown_tick_ms: u64,

    /// Activity feed capacity.
    pub activity_capacity: usize,

    /// Seller notification capacity.
    pub seller_notification_capacity: usize,

    /// Chat message capacity.
    pub chat_capacity: usize,

    /// Low stock threshold.
    pub low_stock_threshold: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            typing_ttl_ms: DEFAULT_TYPING_TTL_MS,
            price_highlight_ms: DEFAULT_PRICE_HIGHLIGHT_MS,
            countdown_tick_ms: DEFAULT_COUNTDOWN_TICK_MS,
            activity_capacity: DEFAULT_ACTIVITY_CAPACITY,
            seller_notification_capacity: DEFAULT_SELLER_NOTIFICATION_CAPACITY,
            chat_capacity: DEFAULT_CHAT_CAPACITY,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }
}

impl SyncConfig {
    /// Sets the typing indicator expiry.
    #[must_use]
    pub fn with_typing_ttl(mut self, ms: u64) -> Self {
        self.typing_ttl_ms = ms;
        self
    }

    /// Sets the price highlight duration.
    #[must_use]
    pub fn with_price_highlight(mut self, ms: u64) -> Self {
        self.price_highlight_ms = ms;
        self
    }

    /// Sets the step of the offline flash sale countdown.
    #[must_use]
    pub fn with_countdown_tick(mut self, ms: u64) -> Self {
        self.countdown_tick_ms = ms;
        self
    }

    /// Sets the activity feed capacity.
    #[must_use]
    pub fn with_activity_capacity(mut self, capacity: usize) -> Self {
        self.activity_capacity = capacity;
        self
    }

    /// Sets the chat message capacity.
    #[must_use]
    pub fn with_chat_capacity(mut self, capacity: usize) -> Self {
        self.chat_capacity = capacity;
        self
    }

    /// Sets the low stock threshold.
    #[must_use]
    pub fn with_low_stock_threshold(mut self, threshold: u64) -> Self {
        self.low_stock_threshold = threshold;
        self
    }

    /// Returns the typing expiry.
    #[must_use]
    pub const fn typing_ttl(&self) -> Duration {
        Duration::from_millis(self.typing_ttl_ms)
    }

    /// Returns the price highlight duration.
    #[must_use]
    pub const fn price_highlight(&self) -> Duration {
        Duration::from_millis(self.price_highlight_ms)
    }

    /// Returns the countdown step.
    #[must_use]
    pub const fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a duration or capacity is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.typing_ttl_ms == 0 {
            return Err(ConfigError::ZeroDuration("typing_ttl_ms"));
        }
        if self.price_highlight_ms == 0 {
            return Err(ConfigError::ZeroDuration("price_highlight_ms"));
        }
        if self.countdown_tick_ms == 0 {
            return Err(ConfigError::ZeroDuration("countdown_tick_ms"));
        }
        if self.activity_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("activity_capacity"));
        }
        if self.seller_notification_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("seller_notification_capacity"));
        }
        if self.chat_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("chat_capacity"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = SyncConfig::default();
        assert_eq!(config.typing_ttl(), Duration::from_millis(3000));
        assert_eq!(config.price_highlight(), Duration::from_millis(3000));
        assert_eq!(config.countdown_tick(), Duration::from_secs(1));
        assert_eq!(config.activity_capacity, 10);
        assert_eq!(config.seller_notification_capacity, 50);
    }

    #[test]
    fn test_config_builder() {
        let config = SyncConfig::default()
            .with_typing_ttl(1500)
            .with_price_highlight(500)
            .with_activity_capacity(5)
            .with_chat_capacity(20)
            .with_low_stock_threshold(3);

        assert_eq!(config.typing_ttl_ms, 1500);
        assert_eq!(config.price_highlight_ms, 500);
        assert_eq!(config.activity_capacity, 5);
        assert_eq!(config.chat_capacity, 20);
        assert_eq!(config.low_stock_threshold, 3);
    }

    #[test]
    fn test_config_validate_valid() {
        assert!(SyncConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validate_zero_ttl() {
        let config = SyncConfig::default().with_typing_ttl(0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroDuration("typing_ttl_ms"))
        );
    }

    #[test]
    fn test_config_validate_zero_capacity() {
        let config = SyncConfig::default().with_activity_capacity(0);
        assert!(config.validate().is_err());
    }
}
