use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::finalizer::Finalizer;
use crate::nats::{ChannelError, StatusChannel, StatusMessage};
use crate::repository::{MeetingRepository, StatusUpdate};
use crate::session::{SessionId, SessionStatus};

/// Why a listener stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenOutcome {
    Cancelled,
    ChannelClosed,
    /// The session reached Completed or Failed; nothing can change it anymore
    SessionFinished(SessionStatus),
}

/// Applies one session's bot status reports to the repository
pub struct StatusListener {
    repository: Arc<dyn MeetingRepository>,
    channel: Arc<dyn StatusChannel>,
    finalizer: Arc<Finalizer>,
}

impl StatusListener {
    pub fn new(
        repository: Arc<dyn MeetingRepository>,
        channel: Arc<dyn StatusChannel>,
        finalizer: Arc<Finalizer>,
    ) -> Self {
        Self {
            repository,
            channel,
            finalizer,
        }
    }

    /// Subscribe to the session's status channel and apply messages in
    /// receipt order until cancelled, the channel closes, or the session
    /// finishes.
    ///
    /// Only a failed subscribe is returned as an error. Malformed messages
    /// and repository failures are logged and the subscription continues.
    pub async fn listen(
        &self,
        cancel: CancellationToken,
        session_id: SessionId,
        session_token: &str,
    ) -> Result<ListenOutcome, ChannelError> {
        let mut stream = self.channel.subscribe(session_token).await?;
        info!(session_id = %session_id, "Status listener started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(session_id = %session_id, "Status listener cancelled");
                    return Ok(ListenOutcome::Cancelled);
                }
                next = stream.next() => match next {
                    Some(Ok(message)) => {
                        if let Some(status) = self.handle_message(session_id, message).await {
                            if status.is_terminal() {
                                info!(session_id = %session_id, %status, "Session finished, status listener stopping");
                                return Ok(ListenOutcome::SessionFinished(status));
                            }
                        }
                    }
                    Some(Err(e)) => {
                        warn!(session_id = %session_id, "Skipping status message: {}", e);
                    }
                    None => {
                        info!(session_id = %session_id, "Status channel closed");
                        return Ok(ListenOutcome::ChannelClosed);
                    }
                },
            }
        }
    }

    /// Apply one status report. Returns the session's status after the
    /// write, or `None` if the write failed.
    pub async fn handle_message(
        &self,
        session_id: SessionId,
        message: StatusMessage,
    ) -> Option<SessionStatus> {
        debug!(
            session_id = %session_id,
            process_ref = %message.process_ref,
            status = %message.status,
            chunk_count = ?message.chunk_count,
            "Received bot status"
        );

        if message.session_id != session_id {
            warn!(
                session_id = %session_id,
                reported = %message.session_id,
                "Status message names a different session, applying to the subscribed one"
            );
        }

        if message.is_clean_completion() {
            return self.complete(session_id, &message.process_ref).await;
        }

        let update = StatusUpdate::to(message.status).with_error(message.error_message);
        self.write(session_id, update).await
    }

    async fn write(&self, session_id: SessionId, update: StatusUpdate) -> Option<SessionStatus> {
        let status = update.status;
        match self.repository.update_status(session_id, update).await {
            Ok(session) => Some(session.status()),
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    %status,
                    "Failed to update session status: {}",
                    e
                );
                None
            }
        }
    }

    /// Handle a clean completion report: move to Finalizing, merge the
    /// chunks, then record Completed.
    ///
    /// Every path ends in a terminal write. Chunks are only merged once the
    /// session is in Finalizing; a session that cannot get there is failed
    /// with its chunks left in place.
    async fn complete(&self, session_id: SessionId, process_ref: &str) -> Option<SessionStatus> {
        // Re-delivery is a no-op when the bot already reported finalizing
        if let Err(e) = self
            .repository
            .update_status(session_id, StatusUpdate::to(SessionStatus::Finalizing))
            .await
        {
            error!(session_id = %session_id, "Cannot finalize session: {}", e);
            return self
                .write(
                    session_id,
                    StatusUpdate::failed(format!("Finalization failed: {}", e)),
                )
                .await;
        }

        let recording = match self.finalizer.finalize(session_id, process_ref).await {
            Ok(recording) => recording,
            Err(e) => {
                error!(session_id = %session_id, "Finalization failed: {}", e);
                return self
                    .write(
                        session_id,
                        StatusUpdate::failed(format!("Finalization failed: {}", e)),
                    )
                    .await;
            }
        };

        info!(
            session_id = %session_id,
            path = %recording.relative_path,
            chunks = recording.chunk_count,
            "Recording ready"
        );

        let update = StatusUpdate::completed(recording.relative_path.clone(), None);
        match self.repository.update_status(session_id, update).await {
            Ok(session) => Some(session.status()),
            Err(e) => {
                error!(
                    session_id = %session_id,
                    path = %recording.relative_path,
                    "Failed to record completed session: {}",
                    e
                );
                self.write(
                    session_id,
                    StatusUpdate::failed(format!(
                        "Finalization failed: recording written to {} but completion was rejected: {}",
                        recording.relative_path, e
                    )),
                )
                .await
            }
        }
    }
}
