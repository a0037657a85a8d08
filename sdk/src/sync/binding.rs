//! Feed binding.
//!
//! Every feed follows the same lifecycle, implemented once here:
//!
//! - no scope id: do nothing;
//! - scope id and connected: emit `subscribe_<resource>`, register one
//!   handler per event, each dropping payloads for other scopes;
//! - scope change or close: emit `unsubscribe_<resource>`, deregister every
//!   handler, reset state to its initial value, then subscribe the new scope;
//! - connection lost: deregister handlers and keep the stale state;
//! - new link: subscribe and register again.
//!
//! A [`Feature`] only describes its events and how a payload changes its
//! state. The binding owns the state in a `watch` channel so any number of
//! views can observe it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::scope::{Scope, ScopeKind};
use crate::context::RealtimeContext;
use crate::util::lock;
use crate::ws::{ConnectionStatus, HandlerId, SocketHandle};

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

/// Shared writer side of a feed's state. Timers spawned by a feature keep
/// a clone.
pub type StateTx<S> = Arc<watch::Sender<S>>;

/// What a feed listens to and how it folds payloads into state.
pub trait Feature: Send + Sync + 'static {
    /// Reactive state exposed to views.
    type State: Clone + Send + Sync + 'static;

    /// Scope kind, or `None` for feeds delivered to the user's own room.
    fn scope_kind(&self) -> Option<ScopeKind>;

    /// Server events handled by [`Feature::on_event`].
    fn events(&self) -> &'static [&'static str];

    /// State before any event, and after every reset.
    fn initial_state(&self) -> Self::State;

    /// Applies a payload that belongs to the current scope.
    fn on_event(&self, event: &str, payload: &Value, state: &StateTx<Self::State>);

    /// Observes connection status changes.
    fn on_status(&self, _status: ConnectionStatus, _state: &StateTx<Self::State>) {}

    /// Cancels feature-owned timers. Called before state is reset.
    fn on_reset(&self) {}
}

/// Deserializes a payload, logging and discarding it if malformed.
pub(crate) fn decode<T: DeserializeOwned>(event: &str, payload: &Value) -> Option<T> {
    match T::deserialize(payload) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(event, error = %e, "ignoring malformed payload");
            None
        }
    }
}

#[derive(Debug)]
struct Active {
    scope: Option<Scope>,
    epoch: u64,
    handlers: Vec<(&'static str, HandlerId)>,
}

#[derive(Debug, Default)]
struct Slot {
    desired: Option<String>,
    active: Option<Active>,
    closed: bool,
}

struct BindingInner<F: Feature> {
    ctx: RealtimeContext,
    feature: F,
    owner: u64,
    state: StateTx<F::State>,
    generation: AtomicU64,
    slot: Mutex<Slot>,
}

impl<F: Feature> BindingInner<F> {
    fn socket(&self) -> &SocketHandle {
        self.ctx.socket()
    }

    /// The scope that should be active right now, if any.
    fn target(&self, slot: &Slot) -> Option<Option<Scope>> {
        if slot.closed || !self.socket().is_connected() {
            return None;
        }
        match self.feature.scope_kind() {
            None => Some(None),
            Some(kind) => slot.desired.as_ref().map(|id| Some(kind.scope(id.as_str()))),
        }
    }

    /// Brings subscriptions and handlers in line with the desired scope and
    /// the connection.
    fn sync(self: &Arc<Self>, slot: &mut Slot) {
        let target = self.target(slot);
        let epoch = self.socket().connection_epoch();

        if let Some(active) = slot.active.take() {
            if target.as_ref() == Some(&active.scope) && active.epoch == epoch {
                slot.active = Some(active);
                return;
            }
            self.deactivate(active);
        }

        if let Some(scope) = target {
            slot.active = Some(self.activate(scope, epoch));
        }
    }

    fn activate(self: &Arc<Self>, scope: Option<Scope>, epoch: u64) -> Active {
        let socket = self.socket();
        if let Some(scope) = &scope {
            socket.subscribe_scope(scope, self.owner);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let handlers = self
            .feature
            .events()
            .iter()
            .map(|&event| {
                let inner: Weak<Self> = Arc::downgrade(self);
                let filter = scope.clone();
                let id = socket.on_fn(event, move |payload| {
                    let Some(inner) = inner.upgrade() else {
                        return;
                    };
                    if filter.as_ref().is_some_and(|scope| !scope.matches(payload)) {
                        trace!(event, "payload for another scope");
                        return;
                    }
                    if inner.generation.load(Ordering::SeqCst) != generation {
                        return;
                    }
                    inner.feature.on_event(event, payload, &inner.state);
                });
                (event, id)
            })
            .collect();

        debug!(owner = self.owner, scope = ?scope, "feed active");
        Active {
            scope,
            epoch,
            handlers,
        }
    }

    fn deactivate(&self, active: Active) {
        let socket = self.socket();
        if let Some(scope) = &active.scope {
            socket.unsubscribe_scope(scope, self.owner);
        }
        for (event, id) in active.handlers {
            socket.off(event, id);
        }
        debug!(owner = self.owner, scope = ?active.scope, "feed inactive");
    }

    fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.feature.on_reset();
        self.state.send_replace(self.feature.initial_state());
    }
}

/// Follows connection status until the binding goes away.
async fn drive<F: Feature>(
    inner: Weak<BindingInner<F>>,
    mut status: watch::Receiver<ConnectionStatus>,
) {
    while status.changed().await.is_ok() {
        let current = *status.borrow_and_update();
        let Some(inner) = inner.upgrade() else {
            break;
        };

        let mut slot = lock(&inner.slot);
        if slot.closed {
            break;
        }
        inner.feature.on_status(current, &inner.state);
        inner.sync(&mut slot);
    }
}

/// A [`Feature`] bound to the shared socket and an optional scope id.
///
/// Dropping the binding closes it.
pub struct Binding<F: Feature> {
    inner: Arc<BindingInner<F>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl<F: Feature> std::fmt::Debug for Binding<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("owner", &self.inner.owner)
            .field("slot", &*lock(&self.inner.slot))
            .finish_non_exhaustive()
    }
}

impl<F: Feature> Binding<F> {
    /// Binds a feature. Must be called from within a Tokio runtime.
    ///
    /// If the socket is already connected and a scope id is given, the
    /// subscription happens before this returns.
    pub fn bind(ctx: &RealtimeContext, feature: F, scope_id: Option<String>) -> Self {
        let (state, _) = watch::channel(feature.initial_state());
        let inner = Arc::new(BindingInner {
            ctx: ctx.clone(),
            feature,
            owner: NEXT_OWNER.fetch_add(1, Ordering::Relaxed),
            state: Arc::new(state),
            generation: AtomicU64::new(0),
            slot: Mutex::new(Slot {
                desired: scope_id,
                ..Slot::default()
            }),
        });

        let status = inner.socket().watch_status();
        let driver = tokio::spawn(drive(Arc::downgrade(&inner), status));
        inner.sync(&mut lock(&inner.slot));

        Self {
            inner,
            driver: Mutex::new(Some(driver)),
        }
    }

    /// Moves the binding to another scope id, or to none.
    ///
    /// The old scope is released and state reset before the new scope is
    /// subscribed. No-op if the id is unchanged.
    pub fn set_scope(&self, scope_id: Option<String>) {
        let inner = &self.inner;
        let mut slot = lock(&inner.slot);
        if slot.closed || slot.desired == scope_id {
            return;
        }

        debug!(owner = inner.owner, from = ?slot.desired, to = ?scope_id, "feed scope changed");
        slot.desired = scope_id;
        if let Some(active) = slot.active.take() {
            inner.deactivate(active);
        }
        inner.reset();
        inner.sync(&mut slot);
    }

    /// Returns the desired scope id.
    #[must_use]
    pub fn scope_id(&self) -> Option<String> {
        lock(&self.inner.slot).desired.clone()
    }

    /// Returns the scope currently subscribed on the server, if any.
    #[must_use]
    pub fn active_scope(&self) -> Option<Scope> {
        lock(&self.inner.slot)
            .active
            .as_ref()
            .and_then(|active| active.scope.clone())
    }

    /// Returns true while handlers are registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        lock(&self.inner.slot).active.is_some()
    }

    /// Returns true once closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        lock(&self.inner.slot).closed
    }

    /// Returns a receiver observing every state change.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<F::State> {
        self.inner.state.subscribe()
    }

    /// Returns a copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> F::State {
        self.inner.state.borrow().clone()
    }

    /// Returns the bound feature.
    #[must_use]
    pub fn feature(&self) -> &F {
        &self.inner.feature
    }

    /// Returns the context the binding was created with.
    #[must_use]
    pub fn context(&self) -> &RealtimeContext {
        &self.inner.ctx
    }

    /// Applies a local change to the state, e.g. a REST snapshot.
    pub fn modify(&self, f: impl FnOnce(&mut F::State)) {
        self.inner.state.send_modify(f);
    }

    /// Builds `{ <id_field>: <scope id>, ..fields }` for the current scope.
    ///
    /// Returns `None` for unscoped feeds or when no id is set.
    #[must_use]
    pub fn scoped_payload(&self, fields: Value) -> Option<Value> {
        let kind = self.inner.feature.scope_kind()?;
        let id = self.scope_id()?;

        let mut payload = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        payload.insert(kind.id_field().to_string(), Value::String(id));
        Some(Value::Object(payload))
    }

    /// Emits a command carrying the scope id.
    ///
    /// Returns false if there is no scope id or the socket is not
    /// connected; the command is then dropped.
    pub fn emit_scoped(&self, event: &str, fields: Value) -> bool {
        let socket = self.inner.socket();
        match self.scoped_payload(fields) {
            Some(payload) if socket.is_connected() => {
                socket.emit(event, payload);
                true
            }
            _ => {
                debug!(event, "dropping scoped command");
                false
            }
        }
    }

    /// Releases the scope, deregisters handlers and resets state. Idempotent.
    pub fn close(&self) {
        {
            let mut slot = lock(&self.inner.slot);
            if slot.closed {
                return;
            }
            slot.closed = true;
            if let Some(active) = slot.active.take() {
                self.inner.deactivate(active);
            }
            self.inner.reset();
        }

        if let Some(driver) = lock(&self.driver).take() {
            driver.abort();
        }
    }
}

impl<F: Feature> Drop for Binding<F> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{settle, Harness};
    use crate::ws::WsConfig;
    use serde_json::json;
    use std::time::Duration;

    /// Records every payload for a product.
    struct Recorder;

    impl Feature for Recorder {
        type State = Vec<Value>;

        fn scope_kind(&self) -> Option<ScopeKind> {
            Some(ScopeKind::Product)
        }

        fn events(&self) -> &'static [&'static str] {
            &["price_updated", "stock_updated"]
        }

        fn initial_state(&self) -> Vec<Value> {
            Vec::new()
        }

        fn on_event(&self, _event: &str, payload: &Value, state: &StateTx<Vec<Value>>) {
            state.send_modify(|seen| seen.push(payload.clone()));
        }
    }

    /// Same, but delivered to the user's own room.
    struct UserRecorder;

    impl Feature for UserRecorder {
        type State = Vec<Value>;

        fn scope_kind(&self) -> Option<ScopeKind> {
            None
        }

        fn events(&self) -> &'static [&'static str] {
            &["notification"]
        }

        fn initial_state(&self) -> Vec<Value> {
            Vec::new()
        }

        fn on_event(&self, _event: &str, payload: &Value, state: &StateTx<Vec<Value>>) {
            state.send_modify(|seen| seen.push(payload.clone()));
        }
    }

    fn bind(harness: &Harness, id: Option<&str>) -> Binding<Recorder> {
        Binding::bind(&harness.ctx, Recorder, id.map(String::from))
    }

    #[tokio::test]
    async fn test_close_before_connect_leaves_no_handlers() {
        let harness = Harness::new();
        let binding = bind(&harness, Some("P1"));
        binding.close();

        let metrics = harness.manager.metrics();
        assert_eq!(metrics.handlers_registered(), metrics.handlers_removed());
        assert!(harness.sent().is_empty());
    }

    #[tokio::test]
    async fn test_close_after_connect_pairs_on_and_off() {
        let harness = Harness::connected().await;
        let binding = bind(&harness, Some("P1"));
        assert_eq!(harness.manager.metrics().handlers_registered(), 2);

        drop(binding);

        let metrics = harness.manager.metrics();
        assert_eq!(metrics.handlers_registered(), metrics.handlers_removed());
        assert_eq!(metrics.live_handlers(), 0);
        assert_eq!(
            harness.connector.sent_events(),
            vec!["subscribe_product", "unsubscribe_product"]
        );
    }

    #[tokio::test]
    async fn test_no_scope_id_does_nothing() {
        let harness = Harness::connected().await;
        let binding = bind(&harness, None);

        assert!(!binding.is_active());
        assert!(harness.sent().is_empty());
        assert_eq!(harness.manager.metrics().handlers_registered(), 0);
    }

    #[tokio::test]
    async fn test_subscribes_once_connected() {
        let harness = Harness::new();
        let binding = bind(&harness, Some("P1"));
        assert!(!binding.is_active());

        harness.connect().await;

        assert!(binding.is_active());
        assert_eq!(
            harness.sent(),
            vec![("subscribe_product".to_string(), json!({"product_id": "P1"}))]
        );
    }

    #[tokio::test]
    async fn test_payloads_filtered_by_scope() {
        let harness = Harness::connected().await;
        let binding = bind(&harness, Some("P1"));

        harness
            .push("price_updated", json!({"product_id": "P2", "new_price": 1}))
            .await;
        harness
            .push("price_updated", json!({"product_id": "P1", "new_price": 2}))
            .await;
        harness.push("price_updated", json!({"new_price": 3})).await;

        assert_eq!(
            binding.snapshot(),
            vec![json!({"product_id": "P1", "new_price": 2})]
        );
    }

    #[tokio::test]
    async fn test_scope_change_unsubscribes_first_and_resets() {
        let harness = Harness::connected().await;
        let binding = bind(&harness, Some("P1"));
        harness
            .push("stock_updated", json!({"product_id": "P1", "stock": 4}))
            .await;
        assert_eq!(binding.snapshot().len(), 1);

        binding.set_scope(Some("P2".to_string()));

        assert!(binding.snapshot().is_empty());
        assert_eq!(
            harness.sent(),
            vec![
                ("subscribe_product".to_string(), json!({"product_id": "P1"})),
                ("unsubscribe_product".to_string(), json!({"product_id": "P1"})),
                ("subscribe_product".to_string(), json!({"product_id": "P2"})),
            ]
        );

        harness
            .push("stock_updated", json!({"product_id": "P1", "stock": 9}))
            .await;
        assert!(binding.snapshot().is_empty());
        assert_eq!(harness.manager.metrics().live_handlers(), 2);
    }

    #[tokio::test]
    async fn test_same_scope_is_noop() {
        let harness = Harness::connected().await;
        let binding = bind(&harness, Some("P1"));
        binding.set_scope(Some("P1".to_string()));
        assert_eq!(harness.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_clearing_scope_releases() {
        let harness = Harness::connected().await;
        let binding = bind(&harness, Some("P1"));
        binding.set_scope(None);

        assert!(!binding.is_active());
        assert_eq!(binding.active_scope(), None);
        assert_eq!(harness.manager.metrics().live_handlers(), 0);
        assert_eq!(
            harness.connector.sent_events(),
            vec!["subscribe_product", "unsubscribe_product"]
        );
    }

    #[tokio::test]
    async fn test_shared_scope_subscribes_once() {
        let harness = Harness::connected().await;
        let first = bind(&harness, Some("P1"));
        let second = bind(&harness, Some("P1"));

        first.close();
        assert_eq!(harness.connector.sent_events(), vec!["subscribe_product"]);

        harness
            .push("price_updated", json!({"product_id": "P1"}))
            .await;
        assert!(first.snapshot().is_empty());
        assert_eq!(second.snapshot().len(), 1);

        second.close();
        assert_eq!(
            harness.connector.sent_events(),
            vec!["subscribe_product", "unsubscribe_product"]
        );
    }

    #[tokio::test]
    async fn test_disconnect_keeps_state_and_drops_handlers() {
        let harness = Harness::connected().await;
        let binding = bind(&harness, Some("P1"));
        harness
            .push("price_updated", json!({"product_id": "P1"}))
            .await;

        harness.drop_link().await;

        assert!(!binding.is_active());
        assert_eq!(binding.snapshot().len(), 1);
        assert_eq!(harness.manager.metrics().live_handlers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubscribes_after_reconnect() {
        let harness = Harness::with_ws_config(
            WsConfig::new("ws://memory").with_reconnect_delay(Duration::from_millis(100)),
        );
        harness.connect().await;
        let binding = bind(&harness, Some("P1"));

        harness.connector.drop_link();
        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;

        assert_eq!(harness.connector.connections(), 2);
        assert!(binding.is_active());
        assert_eq!(
            harness.connector.sent_events(),
            vec!["subscribe_product", "subscribe_product"]
        );

        harness
            .push("price_updated", json!({"product_id": "P1"}))
            .await;
        assert_eq!(binding.snapshot().len(), 1);
        assert_eq!(harness.manager.metrics().live_handlers(), 2);
    }

    #[tokio::test]
    async fn test_unscoped_feature_registers_handlers_only() {
        let harness = Harness::connected().await;
        let binding = Binding::bind(&harness.ctx, UserRecorder, None);

        assert!(binding.is_active());
        assert!(harness.sent().is_empty());

        harness.push("notification", json!({"_id": "n1"})).await;
        assert_eq!(binding.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_emit_scoped() {
        let harness = Harness::connected().await;
        let binding = bind(&harness, Some("P1"));
        harness.connector.clear_sent();

        assert!(binding.emit_scoped("ping_product", json!({"n": 1})));
        assert_eq!(
            harness.sent(),
            vec![(
                "ping_product".to_string(),
                json!({"n": 1, "product_id": "P1"})
            )]
        );

        binding.set_scope(None);
        assert!(!binding.emit_scoped("ping_product", json!({})));
    }

    #[tokio::test]
    async fn test_modify_applies_local_change() {
        let harness = Harness::new();
        let binding = bind(&harness, None);
        let mut rx = binding.state();

        binding.modify(|seen| seen.push(json!("local")));

        assert!(rx.has_changed().expect("open"));
        assert_eq!(rx.borrow_and_update().len(), 1);
    }
}
