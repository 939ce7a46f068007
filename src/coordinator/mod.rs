//! Bot lifecycle coordination
//!
//! `BotCoordinator` is the entry point the HTTP layer talks to: admission
//! control for new recordings, spawning and stopping bots, and re-attaching
//! listeners after a restart.

mod error;

pub use error::CoordinatorError;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::finalizer::Finalizer;
use crate::listener::{ListenerRegistry, StatusListener};
use crate::nats::StatusChannel;
use crate::orchestrator::{BotOrchestrator, OrchestratorError};
use crate::repository::{MeetingFilter, MeetingRepository, StatusUpdate, UserRepository};
use crate::session::{RecordingSession, SessionDraft, SessionId, SessionStatus, UserId};

/// Request to record a meeting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecordingRequest {
    pub user_id: UserId,
    pub platform: String,
    pub meeting_url: String,
    pub meeting_id: String,
    #[serde(default)]
    pub bot_name: Option<String>,
}

/// Result of a successful spawn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpawnOutcome {
    pub session_id: SessionId,
    pub process_ref: String,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorSettings {
    /// Upper bound on one orchestrator spawn call
    pub spawn_timeout: Duration,
    /// Upper bound on one orchestrator stop call
    pub stop_timeout: Duration,
    /// Time the bot gets to report its terminal status before it is killed
    pub stop_grace: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            spawn_timeout: Duration::from_secs(30),
            stop_timeout: Duration::from_secs(30),
            stop_grace: Duration::from_secs(20),
        }
    }
}

pub struct BotCoordinator {
    meetings: Arc<dyn MeetingRepository>,
    users: Arc<dyn UserRepository>,
    orchestrator: Arc<dyn BotOrchestrator>,
    listener: Arc<StatusListener>,
    listeners: ListenerRegistry,
    settings: CoordinatorSettings,
}

impl BotCoordinator {
    pub fn new(
        meetings: Arc<dyn MeetingRepository>,
        users: Arc<dyn UserRepository>,
        orchestrator: Arc<dyn BotOrchestrator>,
        channel: Arc<dyn StatusChannel>,
        finalizer: Arc<Finalizer>,
        settings: CoordinatorSettings,
    ) -> Self {
        let listener = Arc::new(StatusListener::new(meetings.clone(), channel, finalizer));
        Self {
            meetings,
            users,
            orchestrator,
            listener,
            listeners: ListenerRegistry::new(),
            settings,
        }
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    /// Validate a recording request and persist it in `Requested`.
    ///
    /// The quota check reads the user's active count and then inserts with
    /// no lock held across the two steps, so concurrent requests for the
    /// same user can briefly exceed `max_concurrent_bots`.
    pub async fn request_recording(
        &self,
        request: NewRecordingRequest,
    ) -> Result<RecordingSession, CoordinatorError> {
        let draft = SessionDraft::new(
            request.user_id,
            &request.platform,
            &request.meeting_url,
            &request.meeting_id,
            request.bot_name.as_deref(),
        )?;

        let user = self.users.get_user(draft.user_id()).await?;
        let active = self.meetings.count_active_for_user(user.id).await?;
        if !user.can_spawn_bot(active) {
            warn!(
                user_id = %user.id,
                active,
                limit = user.max_concurrent_bots,
                "Rejecting recording request: concurrent bot limit reached"
            );
            return Err(CoordinatorError::QuotaExceeded {
                user_id: user.id,
                limit: user.max_concurrent_bots,
                active,
            });
        }

        let session = self.meetings.insert(draft).await?;
        info!(
            session_id = %session.id(),
            user_id = %user.id,
            platform = %session.platform(),
            "Recording requested"
        );
        Ok(session)
    }

    pub async fn get_session(&self, id: SessionId) -> Result<RecordingSession, CoordinatorError> {
        Ok(self.meetings.get(&MeetingFilter::by_id(id)).await?)
    }

    /// Start a bot for a `Requested` session and begin listening to it.
    ///
    /// Returns once the orchestrator confirms the process started. If the
    /// orchestrator fails the session stays in `Requested`.
    pub async fn spawn_bot(&self, session_id: SessionId) -> Result<SpawnOutcome, CoordinatorError> {
        let session = self.get_session(session_id).await?;

        if session.status() != SessionStatus::Requested {
            return Err(CoordinatorError::InvalidTransition(format!(
                "session {} is {}, bots can only be spawned for requested sessions",
                session_id,
                session.status()
            )));
        }
        if let Some(existing) = session.bot_process_ref() {
            return Err(CoordinatorError::InvalidTransition(format!(
                "session {} already has bot {}",
                session_id, existing
            )));
        }

        let user = self.users.get_user(session.user_id()).await?;

        let spawned = match tokio::time::timeout(
            self.settings.spawn_timeout,
            self.orchestrator.spawn(&session, &user),
        )
        .await
        {
            Ok(Ok(spawned)) => spawned,
            Ok(Err(e)) => {
                error!(session_id = %session_id, "Failed to spawn bot: {}", e);
                return Err(CoordinatorError::SpawnFailed(e));
            }
            Err(_) => {
                error!(session_id = %session_id, "Bot spawn timed out");
                return Err(CoordinatorError::SpawnFailed(OrchestratorError::Timeout(
                    self.settings.spawn_timeout,
                )));
            }
        };

        let session = match self.record_spawn(session_id, &spawned.process_ref, &spawned.session_token).await {
            Ok(session) => session,
            Err(e) => {
                error!(
                    session_id = %session_id,
                    process_ref = %spawned.process_ref,
                    "Failed to record spawned bot, stopping it: {}",
                    e
                );
                if let Err(stop_err) = self
                    .orchestrator
                    .stop(&spawned.process_ref, self.settings.stop_grace)
                    .await
                {
                    warn!(process_ref = %spawned.process_ref, "Failed to stop orphaned bot: {}", stop_err);
                }
                return Err(e);
            }
        };

        self.listeners
            .spawn(self.listener.clone(), session_id, spawned.session_token);

        info!(
            session_id = %session_id,
            process_ref = %spawned.process_ref,
            "Bot spawned"
        );

        Ok(SpawnOutcome {
            session_id,
            process_ref: spawned.process_ref,
            status: session.status(),
        })
    }

    async fn record_spawn(
        &self,
        session_id: SessionId,
        process_ref: &str,
        session_token: &str,
    ) -> Result<RecordingSession, CoordinatorError> {
        self.meetings
            .attach_bot(session_id, process_ref, session_token)
            .await?;
        Ok(self
            .meetings
            .update_status(session_id, StatusUpdate::to(SessionStatus::Joining))
            .await?)
    }

    /// Ask a bot to shut down. Session status is left to the bot's own
    /// terminal report.
    pub async fn stop_bot(&self, process_ref: &str) -> Result<(), CoordinatorError> {
        let session = self
            .meetings
            .get(&MeetingFilter::by_process_ref(process_ref))
            .await?;

        info!(
            session_id = %session.id(),
            process_ref = %process_ref,
            "Stopping bot"
        );

        match tokio::time::timeout(
            self.settings.stop_timeout,
            self.orchestrator.stop(process_ref, self.settings.stop_grace),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!(process_ref = %process_ref, "Failed to stop bot: {}", e);
                Err(CoordinatorError::StopFailed(e))
            }
            Err(_) => {
                error!(process_ref = %process_ref, "Bot stop timed out");
                Err(CoordinatorError::StopFailed(OrchestratorError::Timeout(
                    self.settings.stop_timeout,
                )))
            }
        }
    }

    /// Start-up sweep: re-attach a listener to every unfinished session
    /// that has a bot and is not already being listened to. Returns the
    /// number of listeners started.
    pub async fn reconcile(&self) -> Result<usize, CoordinatorError> {
        let sessions = self.meetings.list_active().await?;
        let mut attached = 0;

        for session in sessions {
            let Some(token) = session.session_token() else {
                continue;
            };
            if self.listeners.is_listening(session.id()) {
                continue;
            }

            info!(
                session_id = %session.id(),
                status = %session.status(),
                "Re-attaching status listener"
            );
            self.listeners
                .spawn(self.listener.clone(), session.id(), token.to_string());
            attached += 1;
        }

        info!("Reconciliation complete: {} listeners re-attached", attached);
        Ok(attached)
    }

    /// Cancel all status listeners and wait for them to exit
    pub async fn shutdown(&self) {
        info!("Shutting down bot coordinator");
        self.listeners.shutdown().await;
    }
}
