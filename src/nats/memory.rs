use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use super::channel::{ChannelError, StatusChannel, StatusStream};
use super::messages::StatusMessage;

const DEFAULT_CAPACITY: usize = 64;

/// In-process status channel with the same fire-and-forget semantics as NATS.
///
/// Payloads travel as JSON bytes so subscribers see exactly what they would
/// see from a broker, including malformed messages.
pub struct MemoryStatusChannel {
    senders: Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>,
    capacity: usize,
}

impl MemoryStatusChannel {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            senders: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    fn sender(&self, token: &str) -> broadcast::Sender<Vec<u8>> {
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders
            .entry(token.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publish raw bytes, bypassing serialization
    pub fn publish_raw(&self, token: &str, payload: Vec<u8>) {
        if self.sender(token).send(payload).is_err() {
            debug!("No subscribers on status channel {}, message dropped", token);
        }
    }

    pub fn subscriber_count(&self, token: &str) -> usize {
        let senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders.get(token).map_or(0, |s| s.receiver_count())
    }

    /// Wait until at least `count` subscribers are attached to `token`
    pub async fn wait_for_subscribers(&self, token: &str, count: usize, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            while self.subscriber_count(token) < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .is_ok()
    }

    /// Close the channel for `token`; open subscriptions end
    pub fn close(&self, token: &str) {
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders.remove(token);
    }
}

impl Default for MemoryStatusChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusChannel for MemoryStatusChannel {
    async fn publish(&self, token: &str, message: &StatusMessage) -> Result<(), ChannelError> {
        let payload = serde_json::to_vec(message)?;
        self.publish_raw(token, payload);
        Ok(())
    }

    async fn subscribe(&self, token: &str) -> Result<StatusStream, ChannelError> {
        let rx = self.sender(token).subscribe();

        let messages = stream::unfold(rx, |mut rx| async move {
            let item = match rx.recv().await {
                Ok(payload) => {
                    serde_json::from_slice::<StatusMessage>(&payload).map_err(ChannelError::from)
                }
                Err(RecvError::Lagged(skipped)) => Err(ChannelError::Lagged(skipped)),
                Err(RecvError::Closed) => return None,
            };
            Some((item, rx))
        });

        Ok(messages.boxed())
    }
}
