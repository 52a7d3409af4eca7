//! In-process update hub
//!
//! Workers publish raw text frames; every connected channel subscriber
//! receives them in publish order. Stands in for an external pub/sub
//! broker: same fan-out contract, one process. A subscriber that falls
//! too far behind loses frames (the channel makes no delivery guarantee).

use crate::protocol::ResultEnvelope;
use serde_json::Value;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct UpdateHub {
    tx: broadcast::Sender<String>,
}

impl UpdateHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Publish one human-readable progress line. Publishing with no
    /// subscribers is not an error; the frame is simply dropped.
    pub fn publish_line(&self, line: impl Into<String>) {
        let line = line.into();
        tracing::debug!(target: "sellflow::hub", "{}", line);
        let _ = self.tx.send(line);
    }

    /// Publish the terminal frame for a task.
    pub fn publish_result(&self, data: Value) {
        let frame = ResultEnvelope::new(data).to_frame();
        let _ = self.tx.send(frame);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
