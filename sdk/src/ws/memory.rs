//! In-process transport.
//!
//! [`MemoryConnector`] stands in for the network: it records every frame the
//! client sends and lets the caller play the server's part.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::error::WsError;
use super::messages::EventFrame;
use super::transport::{Connector, Link};
use crate::util::lock;

#[derive(Debug, Default)]
struct MemoryInner {
    sent: Mutex<Vec<EventFrame>>,
    outgoing: Mutex<Option<mpsc::UnboundedReceiver<EventFrame>>>,
    server: Mutex<Option<mpsc::UnboundedSender<EventFrame>>>,
    refuse: AtomicBool,
    connections: AtomicU64,
}

impl MemoryInner {
    fn drain_outgoing(&self) {
        let mut outgoing = lock(&self.outgoing);
        if let Some(rx) = outgoing.as_mut() {
            let mut sent = lock(&self.sent);
            while let Ok(frame) = rx.try_recv() {
                sent.push(frame);
            }
        }
    }
}

/// Fake server side of a realtime connection.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    inner: Arc<MemoryInner>,
}

impl MemoryConnector {
    /// Creates a connector that accepts connections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent connection attempts fail (or succeed again).
    pub fn refuse_connections(&self, refuse: bool) {
        self.inner.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Returns the number of links opened so far.
    #[must_use]
    pub fn connections(&self) -> u64 {
        self.inner.connections.load(Ordering::SeqCst)
    }

    /// Returns true while a link is open.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        lock(&self.inner.server)
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Delivers a server event to the client.
    ///
    /// Returns false if no link is open.
    pub fn push(&self, event: &str, data: Value) -> bool {
        lock(&self.inner.server)
            .as_ref()
            .is_some_and(|tx| tx.send(EventFrame::from_value(event, data)).is_ok())
    }

    /// Drops the current link, as if the network went away.
    pub fn drop_link(&self) {
        self.inner.drain_outgoing();
        lock(&self.inner.server).take();
        lock(&self.inner.outgoing).take();
    }

    /// Returns every frame the client has sent, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<EventFrame> {
        self.inner.drain_outgoing();
        lock(&self.inner.sent).clone()
    }

    /// Returns the names of every event the client has sent, oldest first.
    #[must_use]
    pub fn sent_events(&self) -> Vec<String> {
        self.sent().into_iter().map(|frame| frame.event).collect()
    }

    /// Forgets the frames recorded so far.
    pub fn clear_sent(&self) {
        self.inner.drain_outgoing();
        lock(&self.inner.sent).clear();
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, _url: &str) -> Result<Link, WsError> {
        if self.inner.refuse.load(Ordering::SeqCst) {
            return Err(WsError::Connect("connection refused".to_string()));
        }

        self.inner.drain_outgoing();

        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (server, incoming) = mpsc::unbounded_channel();

        *lock(&self.inner.outgoing) = Some(outgoing_rx);
        *lock(&self.inner.server) = Some(server);
        self.inner.connections.fetch_add(1, Ordering::SeqCst);

        Ok(Link { outgoing, incoming })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_connect_and_record() {
        let connector = MemoryConnector::new();
        let link = connector.connect("ws://memory").await.expect("link");

        link.outgoing
            .send(EventFrame::from_value("subscribe_product", json!({"product_id": "P1"})))
            .expect("send");

        assert_eq!(connector.connections(), 1);
        assert_eq!(connector.sent_events(), vec!["subscribe_product"]);
    }

    #[tokio::test]
    async fn test_memory_push_reaches_client() {
        let connector = MemoryConnector::new();
        let mut link = connector.connect("ws://memory").await.expect("link");

        assert!(connector.push("price_updated", json!({"product_id": "P1"})));

        let frame = link.incoming.recv().await.expect("frame");
        assert_eq!(frame.event, "price_updated");
    }

    #[tokio::test]
    async fn test_memory_drop_link_closes_incoming() {
        let connector = MemoryConnector::new();
        let mut link = connector.connect("ws://memory").await.expect("link");
        assert!(connector.is_linked());

        connector.drop_link();

        assert!(link.incoming.recv().await.is_none());
        assert!(!connector.is_linked());
        assert!(!connector.push("price_updated", json!({})));
    }

    #[tokio::test]
    async fn test_memory_refuse() {
        let connector = MemoryConnector::new();
        connector.refuse_connections(true);
        let result = connector.connect("ws://memory").await;
        tokio_test::assert_err!(result);

        connector.refuse_connections(false);
        let result = connector.connect("ws://memory").await;
        tokio_test::assert_ok!(result);
    }

    #[tokio::test]
    async fn test_memory_clear_sent() {
        let connector = MemoryConnector::new();
        let link = connector.connect("ws://memory").await.expect("link");
        link.outgoing
            .send(EventFrame::from_value("typing_start", json!({})))
            .expect("send");

        connector.clear_sent();
        assert!(connector.sent().is_empty());
    }
}
