//! Notification channel client
//!
//! Owns the WebSocket connection to the update stream. A spawned reader
//! task forwards transport events over an mpsc queue, so the consumer sees
//! them strictly in delivery order. Dropping the handle closes the
//! connection; there is no reconnect policy.

use crate::error::{Result, SellflowError};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Lifecycle events observed on the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Connection established.
    Opened,
    /// One raw text frame, undecoded.
    Frame(String),
    /// Transport-level error. No recovery is attempted.
    TransportError(String),
    /// Connection is gone, whether by peer close, error or teardown.
    Closed,
}

/// Owned handle to one open notification channel.
pub struct NotificationChannel {
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl NotificationChannel {
    /// Open a connection to the configured channel address. No parameters
    /// are passed at connect time; the server pushes every task's updates
    /// to every connected client.
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws_stream, _) =
            connect_async(url)
                .await
                .map_err(|e| SellflowError::ConnectionFailed {
                    message: e.to_string(),
                })?;

        let (tx, events) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(read_loop(ws_stream, tx, shutdown_rx));

        Ok(Self {
            events,
            shutdown: Some(shutdown_tx),
        })
    }

    /// Next event in transport delivery order. Returns `None` once the
    /// reader task has finished and the queue is drained.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// Proactively close the connection. Idempotent.
    pub fn close(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for NotificationChannel {
    fn drop(&mut self) {
        self.close();
    }
}

async fn read_loop(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    tx: mpsc::UnboundedSender<ChannelEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let (mut sink, mut stream) = ws_stream.split();
    let _ = tx.send(ChannelEvent::Opened);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = tx.send(ChannelEvent::Frame(text));
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = tx.send(ChannelEvent::TransportError(e.to_string()));
                    break;
                }
            }
        }
    }

    let _ = tx.send(ChannelEvent::Closed);
}
