//! WebSocket message types.
//!
//! Every frame on the wire, in both directions, is a named event carrying a
//! JSON payload: `{"event": "price_updated", "data": {...}}`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Server-to-client event names.
pub mod events {
    /// Product price changed.
    pub const PRICE_UPDATED: &str = "price_updated";
    /// Product stock changed.
    pub const STOCK_UPDATED: &str = "stock_updated";
    /// Low stock, out of stock or restock alert for a product.
    pub const INVENTORY_ALERT: &str = "inventory_alert";
    /// Number of shoppers currently viewing a product.
    pub const VIEWER_COUNT_UPDATED: &str = "viewer_count_updated";
    /// A watched user came online.
    pub const USER_ONLINE: &str = "user_online";
    /// A watched user went offline.
    pub const USER_OFFLINE: &str = "user_offline";
    /// Order moved to a new status.
    pub const ORDER_STATUS_UPDATED: &str = "order_status_updated";
    /// Cart changed in another tab or device.
    pub const CART_UPDATED: &str = "cart_updated";
    /// Authoritative flash sale countdown tick.
    pub const FLASH_SALE_TICK: &str = "flash_sale_tick";
    /// Flash sale stock for one product changed.
    pub const FLASH_SALE_STOCK_UPDATED: &str = "flash_sale_stock_updated";
    /// Flash sale is over.
    pub const FLASH_SALE_ENDED: &str = "flash_sale_ended";
    /// New chat message.
    pub const NEW_MESSAGE: &str = "new_message";
    /// Chat messages were read by the other party.
    pub const MESSAGES_READ: &str = "messages_read";
    /// A chat participant is typing.
    pub const USER_TYPING: &str = "user_typing";
    /// A chat participant stopped typing.
    pub const USER_STOP_TYPING: &str = "user_stop_typing";
    /// New notification for the signed-in user.
    pub const NOTIFICATION: &str = "notification";
    /// New product review.
    pub const NEW_REVIEW: &str = "new_review";
    /// New product question.
    pub const NEW_QUESTION: &str = "new_question";
    /// A product question was answered.
    pub const QUESTION_ANSWERED: &str = "question_answered";
    /// New order for the seller.
    pub const NEW_ORDER: &str = "new_order";
    /// Seller dashboard metric snapshot.
    pub const SELLER_METRICS_UPDATED: &str = "seller_metrics_updated";
    /// Seller product running out of stock.
    pub const LOW_STOCK_ALERT: &str = "low_stock_alert";
    /// Storefront activity ticker entry.
    pub const ACTIVITY: &str = "activity";
}

/// Client-to-server event names outside the `subscribe_<resource>` family.
pub mod commands {
    /// Send a chat message.
    pub const SEND_MESSAGE: &str = "send_message";
    /// Mark a chat as read.
    pub const MARK_READ: &str = "mark_read";
    /// Local user started typing.
    pub const TYPING_START: &str = "typing_start";
    /// Local user stopped typing.
    pub const TYPING_STOP: &str = "typing_stop";
    /// Local cart changed; fan out to the user's other sessions.
    pub const CART_CHANGED: &str = "cart_changed";
}

/// A named event with its JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    /// Event name.
    pub event: String,

    /// Event payload.
    #[serde(default)]
    pub data: Value,
}

impl EventFrame {
    /// Creates a frame from any serializable payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be represented as JSON.
    pub fn new(event: impl Into<String>, data: impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_value(data)?,
        })
    }

    /// Creates a frame from an already-built JSON value.
    #[must_use]
    pub fn from_value(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Reads an id field from the payload.
    ///
    /// String ids are returned as-is and numeric ids are rendered in decimal.
    #[must_use]
    pub fn scope_id(&self, field: &str) -> Option<String> {
        payload_id(&self.data, field)
    }
}

/// Reads an id field from a JSON payload.
#[must_use]
pub fn payload_id(data: &Value, field: &str) -> Option<String> {
    match data.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Deserializes an id sent either as a string or as a number.
///
/// For `#[serde(deserialize_with = "...")]` on payload id fields, matching
/// what [`payload_id`] accepts.
pub fn string_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}
