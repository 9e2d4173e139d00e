//! WebSocket connection to the relay server
//!
//! The socket is split into a reader task and a writer task; the game loop
//! only ever touches the two channels, so sending never blocks a tick and
//! receiving is a non-blocking drain.

use std::time::Duration;

use driftfire::{ClientMessage, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Connect failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Connection closed")]
    Closed,

    #[error("Gave up after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
}

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

// ============================================================================
// CONNECTION
// ============================================================================

pub struct Connection {
    outgoing: mpsc::UnboundedSender<ClientMessage>,
    incoming: mpsc::UnboundedReceiver<ServerMessage>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Connection {
    /// Perform the WebSocket handshake and start the socket tasks.
    pub async fn open(url: &Url) -> Result<Self, ConnectionError> {
        let (ws_stream, _) = connect_async(url.as_str()).await?;
        info!("Connected to {}", url);

        let (mut write, mut read) = ws_stream.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<ClientMessage>();
        let (incoming_tx, incoming) = mpsc::unbounded_channel::<ServerMessage>();

        let writer = tokio::spawn(async move {
            while let Some(msg) = outgoing_rx.recv().await {
                let json = match msg.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to encode {:?}: {}", msg, e);
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(json)).await {
                    debug!("Write failed: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => match ServerMessage::from_json(&text) {
                        Ok(msg) => {
                            if incoming_tx.send(msg).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Malformed server message: {} - {}", e, text),
                    },
                    Ok(Message::Close(_)) => {
                        info!("Server closed connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("WebSocket read error: {}", e);
                        break;
                    }
                }
            }
            debug!("Reader task ended");
        });

        Ok(Self { outgoing, incoming, reader, writer })
    }

    /// Queue a message. Fails only once the writer has stopped.
    pub fn send(&self, msg: ClientMessage) -> Result<(), ConnectionError> {
        self.outgoing.send(msg).map_err(|_| ConnectionError::Closed)
    }

    /// Next inbound message if one is waiting.
    ///
    /// Returns `Err(Closed)` once the socket is gone and the queue is empty.
    pub fn try_recv(&mut self) -> Result<Option<ServerMessage>, ConnectionError> {
        match self.incoming.try_recv() {
            Ok(msg) => Ok(Some(msg)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ConnectionError::Closed),
        }
    }

    pub async fn recv(&mut self) -> Result<ServerMessage, ConnectionError> {
        self.incoming.recv().await.ok_or(ConnectionError::Closed)
    }

    /// Flush queued messages, send a close frame and stop both tasks.
    pub async fn close(self) {
        let Self { outgoing, reader, writer, .. } = self;
        drop(outgoing);
        if tokio::time::timeout(Duration::from_secs(1), writer).await.is_err() {
            debug!("Writer did not finish in time");
        }
        reader.abort();
    }
}

/// Open a connection, retrying per `policy`.
pub async fn connect_with_retry(url: &Url, policy: &ReconnectPolicy) -> Result<Connection, ConnectionError> {
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        match Connection::open(url).await {
            Ok(connection) => return Ok(connection),
            Err(e) => {
                warn!("Connection attempt {}/{} to {} failed: {}", attempt, attempts, url, e);
                if attempt < attempts {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
        }
    }

    Err(ConnectionError::RetriesExhausted { attempts })
}
