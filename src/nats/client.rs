use async_nats::Client;
use async_trait::async_trait;
use futures::stream::StreamExt;
use tracing::{debug, info};

use super::channel::{ChannelError, StatusChannel, StatusStream};
use super::messages::StatusMessage;

/// Status channel backed by NATS subjects `{prefix}.{token}`
pub struct NatsStatusChannel {
    client: Client,
    subject_prefix: String,
}

impl NatsStatusChannel {
    /// Connect to NATS server
    pub async fn connect(url: &str, subject_prefix: impl Into<String>) -> Result<Self, ChannelError> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;

        info!("Connected to NATS successfully");

        Ok(Self {
            client,
            subject_prefix: subject_prefix.into(),
        })
    }

    pub fn subject_for(&self, token: &str) -> String {
        format!("{}.{}", self.subject_prefix, token)
    }
}

#[async_trait]
impl StatusChannel for NatsStatusChannel {
    async fn publish(&self, token: &str, message: &StatusMessage) -> Result<(), ChannelError> {
        let subject = self.subject_for(token);
        let payload = serde_json::to_vec(message)?;

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| ChannelError::Publish {
                subject: subject.clone(),
                message: e.to_string(),
            })?;

        debug!(
            "Published bot status to {} (session={}, status={})",
            subject, message.session_id, message.status
        );

        Ok(())
    }

    async fn subscribe(&self, token: &str) -> Result<StatusStream, ChannelError> {
        let subject = self.subject_for(token);

        let subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .map_err(|e| ChannelError::Subscribe {
                subject: subject.clone(),
                message: e.to_string(),
            })?;

        info!("Subscribed to {}", subject);

        Ok(subscriber
            .map(|msg| serde_json::from_slice::<StatusMessage>(&msg.payload).map_err(ChannelError::from))
            .boxed())
    }
}
