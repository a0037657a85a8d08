//! Transport seam.
//!
//! The connection manager talks to the network only through a [`Connector`],
//! so tests can substitute an in-process transport per test.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use super::config::WsConfig;
use super::error::WsError;
use super::messages::EventFrame;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// An open transport.
///
/// The link is lost when `incoming` yields `None`. Dropping `outgoing`
/// closes the transport.
#[derive(Debug)]
pub struct Link {
    /// Frames to send to the server.
    pub outgoing: mpsc::UnboundedSender<EventFrame>,
    /// Frames received from the server.
    pub incoming: mpsc::UnboundedReceiver<EventFrame>,
}

/// Opens transports for the connection manager.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Opens a new link to the given URL.
    async fn connect(&self, url: &str) -> Result<Link, WsError>;
}

/// WebSocket transport over `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct TungsteniteConnector {
    heartbeat_interval: Duration,
}

impl TungsteniteConnector {
    /// Creates a connector pinging the server at the given interval.
    #[must_use]
    pub const fn new(heartbeat_interval: Duration) -> Self {
        Self { heartbeat_interval }
    }

    /// Creates a connector from a WebSocket configuration.
    #[must_use]
    pub const fn from_config(config: &WsConfig) -> Self {
        Self::new(config.heartbeat_interval)
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Link, WsError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| WsError::Connect(e.to_string()))?;

        let (sink, source) = ws_stream.split();
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming) = mpsc::unbounded_channel();

        tokio::spawn(write_loop(sink, outgoing_rx, self.heartbeat_interval));
        tokio::spawn(read_loop(source, incoming_tx));

        Ok(Link { outgoing, incoming })
    }
}

/// Serializes outgoing frames and pings the server between them.
async fn write_loop(
    mut sink: WsSink,
    mut frames: mpsc::UnboundedReceiver<EventFrame>,
    heartbeat: Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + heartbeat, heartbeat);

    loop {
        tokio::select! {
            frame = frames.recv() => {
                let Some(frame) = frame else {
                    break;
                };

                let json = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(event = %frame.event, error = %e, "failed to serialize frame");
                        continue;
                    }
                };

                if let Err(e) = sink.send(Message::Text(json.into())).await {
                    warn!(error = %e, "websocket send failed");
                    break;
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = sink.send(Message::Ping(Default::default())).await {
                    warn!(error = %e, "websocket heartbeat failed");
                    break;
                }
            }
        }
    }

    let _ = sink.close().await;
}

/// Parses incoming text frames until the server closes the stream.
async fn read_loop(mut source: WsSource, frames: mpsc::UnboundedSender<EventFrame>) {
    while let Some(result) = source.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<EventFrame>(text.as_str()) {
                Ok(frame) => {
                    if frames.send(frame).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "skipping malformed frame");
                }
            },
            Ok(Message::Close(_)) => {
                debug!("server closed websocket");
                break;
            }
            Err(e) => {
                warn!(error = %e, "websocket read failed");
                break;
            }
            _ => {}
        }
    }
}
