//! Buyer-seller chat messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::binding::{decode, Binding, Feature, StateTx};
use super::scope::ScopeKind;
use crate::collections::RingBuffer;
use crate::context::RealtimeContext;
use crate::ws::messages::string_id;
use crate::ws::{commands, events};

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Server id.
    #[serde(rename = "_id", alias = "id", deserialize_with = "string_id")]
    pub id: String,
    /// Author.
    #[serde(deserialize_with = "string_id")]
    pub sender_id: String,
    /// Text.
    pub content: String,
    /// Server time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Read by the recipient.
    #[serde(default)]
    pub is_read: bool,
}

#[derive(Debug, Deserialize)]
struct NewMessage {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct MessagesRead {
    #[serde(deserialize_with = "string_id")]
    reader_id: String,
    #[serde(default)]
    message_ids: Option<Vec<String>>,
}

/// Recent messages of one chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatState {
    /// Messages, oldest first, capped.
    pub messages: RingBuffer<ChatMessage>,
}

impl ChatState {
    /// Messages not sent by `user_id` and not yet read.
    #[must_use]
    pub fn unread_for(&self, user_id: &str) -> usize {
        self.messages
            .iter()
            .filter(|message| message.sender_id != user_id && !message.is_read)
            .count()
    }
}

/// Chat feed. Messages are deduplicated by id and the oldest evicted first.
#[derive(Debug)]
pub struct ChatFeature {
    capacity: usize,
}

impl ChatFeature {
    /// Creates the feature keeping at most `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }
}

impl Feature for ChatFeature {
    type State = ChatState;

    fn scope_kind(&self) -> Option<ScopeKind> {
        Some(ScopeKind::Chat)
    }

    fn events(&self) -> &'static [&'static str] {
        &[events::NEW_MESSAGE, events::MESSAGES_READ]
    }

    fn initial_state(&self) -> ChatState {
        ChatState {
            messages: RingBuffer::new(self.capacity),
        }
    }

    fn on_event(&self, event: &str, payload: &Value, state: &StateTx<ChatState>) {
        if event == events::NEW_MESSAGE {
            let Some(NewMessage { message }) = decode(event, payload) else {
                return;
            };
            state.send_if_modified(|chat| {
                if chat.messages.any(|known| known.id == message.id) {
                    return false;
                }
                chat.messages.push(message);
                true
            });
            return;
        }

        let Some(read) = decode::<MessagesRead>(event, payload) else {
            return;
        };
        state.send_if_modified(|chat| {
            let marked = chat.messages.update_where(
                |message| {
                    message.sender_id != read.reader_id
                        && !message.is_read
                        && read
                            .message_ids
                            .as_ref()
                            .map_or(true, |ids| ids.contains(&message.id))
                },
                |message| message.is_read = true,
            );
            marked > 0
        });
    }
}

/// Live messages of one chat.
pub type ChatFeed = Binding<ChatFeature>;

impl Binding<ChatFeature> {
    /// Follows a chat.
    pub fn new(ctx: &RealtimeContext, chat_id: Option<String>) -> Self {
        Self::bind(ctx, ChatFeature::new(ctx.config().chat_capacity), chat_id)
    }

    /// Sends a message. The server echoes it back as `new_message`.
    ///
    /// Dropped when disconnected. Returns true if sent.
    pub fn send_message(&self, content: &str) -> bool {
        self.emit_scoped(commands::SEND_MESSAGE, json!({ "content": content }))
    }

    /// Marks the chat read for the signed-in user.
    pub fn mark_read(&self) -> bool {
        self.emit_scoped(commands::MARK_READ, json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::testing::Harness;

    fn message(id: &str, sender: &str) -> Value {
        json!({
            "chat_id": "C1",
            "message": {"_id": id, "sender_id": sender, "content": format!("hi {id}")},
        })
    }

    fn ids(feed: &ChatFeed) -> Vec<String> {
        feed.snapshot()
            .messages
            .iter()
            .map(|m| m.id.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_messages_deduplicated() {
        let harness = Harness::connected().await;
        let feed = ChatFeed::new(&harness.ctx, Some("C1".to_string()));

        harness.push("new_message", message("m1", "buyer")).await;
        harness.push("new_message", message("m2", "seller")).await;
        harness.push("new_message", message("m1", "buyer")).await;

        assert_eq!(ids(&feed), vec!["m1", "m2"]);
        assert_eq!(feed.snapshot().unread_for("buyer"), 1);
    }

    #[tokio::test]
    async fn test_window_keeps_latest() {
        let harness = Harness::with_sync_config(SyncConfig::default().with_chat_capacity(3));
        harness.connect().await;
        let feed = ChatFeed::new(&harness.ctx, Some("C1".to_string()));

        for i in 1..=5 {
            harness
                .push("new_message", message(&format!("m{i}"), "buyer"))
                .await;
        }

        assert_eq!(ids(&feed), vec!["m3", "m4", "m5"]);
    }

    #[tokio::test]
    async fn test_messages_read_marks_other_party() {
        let harness = Harness::connected().await;
        let feed = ChatFeed::new(&harness.ctx, Some("C1".to_string()));
        harness.push("new_message", message("m1", "buyer")).await;
        harness.push("new_message", message("m2", "seller")).await;

        harness
            .push("messages_read", json!({"chat_id": "C1", "reader_id": "seller"}))
            .await;

        let state = feed.snapshot();
        let read: Vec<bool> = state.messages.iter().map(|m| m.is_read).collect();
        assert_eq!(read, vec![true, false]);
    }

    #[tokio::test]
    async fn test_send_and_mark_read() {
        let harness = Harness::connected().await;
        let feed = ChatFeed::new(&harness.ctx, Some("C1".to_string()));
        harness.connector.clear_sent();

        assert!(feed.send_message("is this in stock?"));
        assert!(feed.mark_read());

        assert_eq!(
            harness.sent(),
            vec![
                (
                    "send_message".to_string(),
                    json!({"chat_id": "C1", "content": "is this in stock?"})
                ),
                ("mark_read".to_string(), json!({"chat_id": "C1"})),
            ]
        );
    }

    #[tokio::test]
    async fn test_other_chat_ignored() {
        let harness = Harness::connected().await;
        let feed = ChatFeed::new(&harness.ctx, Some("C1".to_string()));

        harness
            .push(
                "new_message",
                json!({"chat_id": "C2", "message": {"_id": "x", "sender_id": "s", "content": "."}}),
            )
            .await;

        assert!(feed.snapshot().messages.is_empty());
    }
}
