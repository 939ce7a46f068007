use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use super::messages::StatusMessage;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to connect to status channel: {0}")]
    Connect(String),
    #[error("failed to subscribe to {subject}: {message}")]
    Subscribe { subject: String, message: String },
    #[error("failed to publish to {subject}: {message}")]
    Publish { subject: String, message: String },
    #[error("malformed status message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("subscriber lagged, {0} messages dropped")]
    Lagged(u64),
}

/// Messages received on one session's status channel.
///
/// `Err` items are per-message problems (bad payloads, dropped messages);
/// the stream ends when the channel closes.
pub type StatusStream = BoxStream<'static, Result<StatusMessage, ChannelError>>;

/// Pub/sub path between a bot process and the manager, keyed by session token
#[async_trait]
pub trait StatusChannel: Send + Sync {
    async fn publish(&self, token: &str, message: &StatusMessage) -> Result<(), ChannelError>;

    async fn subscribe(&self, token: &str) -> Result<StatusStream, ChannelError>;
}
