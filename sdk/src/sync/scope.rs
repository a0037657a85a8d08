//! Subscription scopes.
//!
//! A scope is the (resource kind, id) pair a feed subscribes to. The server
//! groups connections into rooms by scope and broadcasts only to them.

use serde_json::{Map, Value};

use crate::ws::messages::payload_id;

/// Kind of entity a feed can scope itself to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// A product page: price, stock, reviews, questions.
    Product,
    /// Live viewer counter for a product.
    ProductViewers,
    /// A single order.
    Order,
    /// A buyer-seller chat.
    Chat,
    /// A flash sale.
    FlashSale,
    /// Online presence of a user.
    Presence,
    /// The signed-in user's cart.
    Cart,
    /// A seller's dashboard.
    Seller,
}

impl ScopeKind {
    /// Returns the resource name used in `subscribe_<resource>`.
    #[must_use]
    pub const fn resource(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::ProductViewers => "product_viewers",
            Self::Order => "order",
            Self::Chat => "chat",
            Self::FlashSale => "flash_sale",
            Self::Presence => "presence",
            Self::Cart => "cart",
            Self::Seller => "seller",
        }
    }

    /// Returns the payload field carrying the scope id.
    #[must_use]
    pub const fn id_field(&self) -> &'static str {
        match self {
            Self::Product | Self::ProductViewers => "product_id",
            Self::Order => "order_id",
            Self::Chat => "chat_id",
            Self::FlashSale => "sale_id",
            Self::Presence | Self::Cart => "user_id",
            Self::Seller => "seller_id",
        }
    }

    /// Builds a scope of this kind.
    #[must_use]
    pub fn scope(self, id: impl Into<String>) -> Scope {
        Scope::new(self, id)
    }
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.resource())
    }
}

/// A (kind, id) subscription scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    /// Kind of entity.
    pub kind: ScopeKind,
    /// Entity id.
    pub id: String,
}

impl Scope {
    /// Creates a new scope.
    #[must_use]
    pub fn new(kind: ScopeKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Returns the client-to-server subscribe event name.
    #[must_use]
    pub fn subscribe_event(&self) -> String {
        format!("subscribe_{}", self.kind.resource())
    }

    /// Returns the client-to-server unsubscribe event name.
    #[must_use]
    pub fn unsubscribe_event(&self) -> String {
        format!("unsubscribe_{}", self.kind.resource())
    }

    /// Returns the payload for subscribe/unsubscribe: `{ <id_field>: id }`.
    #[must_use]
    pub fn payload(&self) -> Value {
        let mut map = Map::new();
        map.insert(
            self.kind.id_field().to_string(),
            Value::String(self.id.clone()),
        );
        Value::Object(map)
    }

    /// Returns true if the payload belongs to this scope.
    #[must_use]
    pub fn matches(&self, payload: &Value) -> bool {
        payload_id(payload, self.kind.id_field()).as_deref() == Some(self.id.as_str())
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind.resource(), self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_event_names() {
        let scope = ScopeKind::FlashSale.scope("S1");
        assert_eq!(scope.subscribe_event(), "subscribe_flash_sale");
        assert_eq!(scope.unsubscribe_event(), "unsubscribe_flash_sale");
    }

    #[test]
    fn test_scope_payload() {
        let scope = ScopeKind::Order.scope("O1");
        assert_eq!(scope.payload(), json!({"order_id": "O1"}));

        let scope = ScopeKind::FlashSale.scope("S1");
        assert_eq!(scope.payload(), json!({"sale_id": "S1"}));
    }

    #[test]
    fn test_scope_matches() {
        let scope = ScopeKind::Product.scope("P1");
        assert!(scope.matches(&json!({"product_id": "P1", "new_price": 1})));
        assert!(!scope.matches(&json!({"product_id": "P2"})));
        assert!(!scope.matches(&json!({"order_id": "P1"})));
        assert!(!scope.matches(&Value::Null));
    }

    #[test]
    fn test_scope_matches_numeric_id() {
        let scope = ScopeKind::Seller.scope("42");
        assert!(scope.matches(&json!({"seller_id": 42})));
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(ScopeKind::Chat.scope("C9").to_string(), "chat:C9");
    }

    #[test]
    fn test_id_fields() {
        assert_eq!(ScopeKind::Product.id_field(), "product_id");
        assert_eq!(ScopeKind::ProductViewers.id_field(), "product_id");
        assert_eq!(ScopeKind::Presence.id_field(), "user_id");
        assert_eq!(ScopeKind::Cart.id_field(), "user_id");
    }
}
