//! Online presence of another user, e.g. the seller in a chat header.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::binding::{decode, Binding, Feature, StateTx};
use super::scope::ScopeKind;
use crate::context::RealtimeContext;
use crate::ws::events;
use crate::ws::messages::string_id;

/// `user_online` / `user_offline` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    /// Watched user.
    #[serde(deserialize_with = "string_id")]
    pub user_id: String,
    /// Last activity, sent with `user_offline`.
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

/// Presence of one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceState {
    /// True after `user_online`, false after `user_offline`.
    pub is_online: bool,
    /// Last activity reported by the server.
    pub last_seen: Option<DateTime<Utc>>,
}

/// Presence feed. Last write wins.
#[derive(Debug, Default)]
pub struct PresenceFeature;

impl Feature for PresenceFeature {
    type State = PresenceState;

    fn scope_kind(&self) -> Option<ScopeKind> {
        Some(ScopeKind::Presence)
    }

    fn events(&self) -> &'static [&'static str] {
        &[events::USER_ONLINE, events::USER_OFFLINE]
    }

    fn initial_state(&self) -> PresenceState {
        PresenceState::default()
    }

    fn on_event(&self, event: &str, payload: &Value, state: &StateTx<PresenceState>) {
        let Some(update) = decode::<PresenceUpdate>(event, payload) else {
            return;
        };

        let online = event == events::USER_ONLINE;
        state.send_modify(|current| {
            current.is_online = online;
            if update.last_seen.is_some() {
                current.last_seen = update.last_seen;
            }
        });
    }
}

/// Online status of one user.
pub type PresenceWatch = Binding<PresenceFeature>;

impl Binding<PresenceFeature> {
    /// Watches whether a user is online.
    pub fn new(ctx: &RealtimeContext, user_id: Option<String>) -> Self {
        Self::bind(ctx, PresenceFeature, user_id)
    }
}
