//! Typing indicator.
//!
//! Each `user_typing` (re)arms a 3 second expiry for that user. One sweeper
//! task sleeps until the earliest expiry instead of one timer per user.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

use super::binding::{decode, Binding, Feature, StateTx};
use super::scope::ScopeKind;
use crate::collections::TtlMap;
use crate::context::RealtimeContext;
use crate::util::lock;
use crate::ws::messages::string_id;
use crate::ws::{commands, events};

/// `user_typing` / `user_stop_typing` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingSignal {
    /// Chat id.
    #[serde(deserialize_with = "string_id")]
    pub chat_id: String,
    /// Who is typing.
    #[serde(deserialize_with = "string_id")]
    pub user_id: String,
}

/// Users currently typing in one chat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypingState {
    /// Typing users, sorted.
    pub users: Vec<String>,
}

impl TypingState {
    /// Returns true if the user is typing.
    #[must_use]
    pub fn is_typing(&self, user_id: &str) -> bool {
        self.users.iter().any(|user| user == user_id)
    }

    /// Returns true if nobody is typing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[derive(Debug)]
struct TypingShared {
    entries: Mutex<TtlMap<String>>,
    wake: Notify,
}

impl TypingShared {
    fn publish(&self, state: &StateTx<TypingState>, now: Instant) {
        let users = lock(&self.entries).live_keys(now);
        state.send_if_modified(|typing| {
            if typing.users == users {
                false
            } else {
                typing.users = users;
                true
            }
        });
    }
}

/// Removes expired entries whenever the earliest one is due.
async fn sweep(shared: Arc<TypingShared>, state: StateTx<TypingState>) {
    loop {
        let next = lock(&shared.entries).next_expiry();
        match next {
            Some(at) => {
                tokio::select! {
                    () = tokio::time::sleep_until(at) => {}
                    () = shared.wake.notified() => continue,
                }
            }
            None => {
                shared.wake.notified().await;
                continue;
            }
        }

        let now = Instant::now();
        let expired = lock(&shared.entries).sweep(now);
        if !expired.is_empty() {
            trace!(?expired, "typing expired");
            shared.publish(&state, now);
        }
    }
}

/// Typing indicator feed.
#[derive(Debug)]
pub struct TypingFeature {
    shared: Arc<TypingShared>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl TypingFeature {
    /// Creates the feature with the given expiry.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            shared: Arc::new(TypingShared {
                entries: Mutex::new(TtlMap::new(ttl)),
                wake: Notify::new(),
            }),
            sweeper: Mutex::new(None),
        }
    }

    fn ensure_sweeper(&self, state: &StateTx<TypingState>) {
        let mut sweeper = lock(&self.sweeper);
        if sweeper.as_ref().map_or(true, JoinHandle::is_finished) {
            *sweeper = Some(tokio::spawn(sweep(
                Arc::clone(&self.shared),
                Arc::clone(state),
            )));
        }
    }

    fn stop_sweeper(&self) {
        if let Some(task) = lock(&self.sweeper).take() {
            task.abort();
        }
    }
}

impl Feature for TypingFeature {
    type State = TypingState;

    fn scope_kind(&self) -> Option<ScopeKind> {
        Some(ScopeKind::Chat)
    }

    fn events(&self) -> &'static [&'static str] {
        &[events::USER_TYPING, events::USER_STOP_TYPING]
    }

    fn initial_state(&self) -> TypingState {
        TypingState::default()
    }

    fn on_event(&self, event: &str, payload: &Value, state: &StateTx<TypingState>) {
        let Some(signal) = decode::<TypingSignal>(event, payload) else {
            return;
        };

        let now = Instant::now();
        {
            let mut entries = lock(&self.shared.entries);
            if event == events::USER_TYPING {
                entries.touch(signal.user_id, now);
            } else {
                entries.remove(&signal.user_id);
            }
        }

        self.shared.publish(state, now);
        self.ensure_sweeper(state);
        self.shared.wake.notify_one();
    }

    fn on_reset(&self) {
        self.stop_sweeper();
        lock(&self.shared.entries).clear();
    }
}

impl Drop for TypingFeature {
    fn drop(&mut self) {
        self.stop_sweeper();
    }
}

/// Who is typing in one chat.
pub type TypingIndicator = Binding<TypingFeature>;

impl Binding<TypingFeature> {
    /// Follows typing signals of a chat.
    pub fn new(ctx: &RealtimeContext, chat_id: Option<String>) -> Self {
        Self::bind(ctx, TypingFeature::new(ctx.config().typing_ttl()), chat_id)
    }

    /// Tells the other party the local user is typing.
    pub fn start_typing(&self) -> bool {
        self.emit_scoped(commands::TYPING_START, json!({}))
    }

    /// Tells the other party the local user stopped typing.
    pub fn stop_typing(&self) -> bool {
        self.emit_scoped(commands::TYPING_STOP, json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{settle, Harness};

    fn typing(user: &str) -> Value {
        json!({"chat_id": "C1", "user_id": user})
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_at_ttl() {
        let harness = Harness::connected().await;
        let indicator = TypingIndicator::new(&harness.ctx, Some("C1".to_string()));

        harness.push("user_typing", typing("U2")).await;
        assert!(indicator.snapshot().is_typing("U2"));

        advance(2999).await;
        assert!(indicator.snapshot().is_typing("U2"));

        advance(1).await;
        assert!(indicator.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_restarts_expiry() {
        let harness = Harness::connected().await;
        let indicator = TypingIndicator::new(&harness.ctx, Some("C1".to_string()));

        harness.push("user_typing", typing("U2")).await;
        advance(2000).await;
        harness.push("user_typing", typing("U2")).await;

        advance(1500).await;
        assert!(indicator.snapshot().is_typing("U2"));

        advance(1500).await;
        assert!(!indicator.snapshot().is_typing("U2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_users_expire_independently() {
        let harness = Harness::connected().await;
        let indicator = TypingIndicator::new(&harness.ctx, Some("C1".to_string()));

        harness.push("user_typing", typing("U1")).await;
        advance(1000).await;
        harness.push("user_typing", typing("U2")).await;
        assert_eq!(indicator.snapshot().users, vec!["U1", "U2"]);

        advance(2000).await;
        assert_eq!(indicator.snapshot().users, vec!["U2"]);

        advance(1000).await;
        assert!(indicator.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_stop_typing_removes_immediately() {
        let harness = Harness::connected().await;
        let indicator = TypingIndicator::new(&harness.ctx, Some("C1".to_string()));

        harness.push("user_typing", typing("U2")).await;
        harness.push("user_stop_typing", typing("U2")).await;

        assert!(indicator.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_start_and_stop_emit() {
        let harness = Harness::connected().await;
        let indicator = TypingIndicator::new(&harness.ctx, Some("C1".to_string()));
        harness.connector.clear_sent();

        indicator.start_typing();
        indicator.stop_typing();

        assert_eq!(
            harness.sent(),
            vec![
                ("typing_start".to_string(), json!({"chat_id": "C1"})),
                ("typing_stop".to_string(), json!({"chat_id": "C1"})),
            ]
        );
    }
}
