//! Realtime feeds.
//!
//! Every feed is a [`Binding`] over a [`Feature`]: the binding owns the
//! subscribe/unsubscribe lifecycle and the handler registrations, the feature
//! owns the event-to-state reduction. State is published through a
//! `tokio::sync::watch` channel, so callers either read a snapshot or await
//! changes.
//!
//! | Feed | Scope | Events |
//! |------|-------|--------|
//! | [`PriceWatch`] | product | `price_updated` |
//! | [`InventoryWatch`] | product | `stock_updated`, `inventory_alert` |
//! | [`ViewerCount`] | product viewers | `viewer_count_updated` |
//! | [`PresenceWatch`] | presence | `user_online`, `user_offline` |
//! | [`OrderTracker`] | order | `order_status_updated` |
//! | [`CartSync`] | cart | `cart_updated` |
//! | [`FlashSaleCountdown`] | flash sale | `flash_sale_tick`, `flash_sale_stock_updated`, `flash_sale_ended` |
//! | [`ChatFeed`] | chat | `new_message`, `messages_read` |
//! | [`TypingIndicator`] | chat | `user_typing`, `user_stop_typing` |
//! | [`NotificationFeed`] | user | `notification` |
//! | [`ReviewFeed`] | product | `new_review` |
//! | [`QuestionFeed`] | product | `new_question`, `question_answered` |
//! | [`SellerDashboard`] | seller | `new_order`, `seller_metrics_updated`, `low_stock_alert` |
//! | [`ActivityFeed`] | user | `activity` |

pub mod activity;
pub mod binding;
pub mod cart;
pub mod chat;
pub mod flash_sale;
pub mod inventory;
pub mod notifications;
pub mod order;
pub mod presence;
pub mod price;
pub mod questions;
pub mod reviews;
pub mod scope;
pub mod seller;
pub mod typing;
pub mod viewers;

pub use activity::{Activity, ActivityFeed};
pub use binding::{Binding, Feature, StateTx};
pub use cart::{CartState, CartSync};
pub use chat::{ChatFeed, ChatMessage, ChatState};
pub use flash_sale::{FlashSaleCountdown, FlashSaleState};
pub use inventory::{AlertKind, InventoryAlert, InventoryState, InventoryWatch};
pub use notifications::{Notification, NotificationFeed, NotificationState};
pub use order::{OrderState, OrderStatus, OrderTracker, StatusChange};
pub use presence::{PresenceState, PresenceWatch};
pub use price::{PriceState, PriceWatch};
pub use questions::{Question, QuestionFeed, QuestionState};
pub use reviews::{Review, ReviewFeed, ReviewState};
pub use scope::{Scope, ScopeKind};
pub use seller::{SellerDashboard, SellerEvent, SellerMetrics, SellerNotification, SellerState};
pub use typing::{TypingIndicator, TypingState};
pub use viewers::ViewerCount;
