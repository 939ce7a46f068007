//! Bot process orchestration
//!
//! `BotOrchestrator` abstracts the container runtime so the coordinator never
//! depends on a particular one. `DockerOrchestrator` drives the docker CLI.

mod docker;

pub use docker::{DockerOrchestrator, DockerSettings, CONTAINER_PREFIX};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::session::{RecordingSession, User};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("failed to spawn bot: {0}")]
    Spawn(String),
    #[error("failed to stop bot {process_ref}: {message}")]
    Stop { process_ref: String, message: String },
    #[error("orchestrator call timed out after {0:?}")]
    Timeout(Duration),
}

/// Handle to a bot process that started successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnedBot {
    /// Runtime handle, e.g. a container id
    pub process_ref: String,
    /// Correlates the bot with its status channel
    pub session_token: String,
}

#[async_trait]
pub trait BotOrchestrator: Send + Sync {
    /// Create and start a sandboxed bot for the session
    async fn spawn(&self, session: &RecordingSession, user: &User)
        -> Result<SpawnedBot, OrchestratorError>;

    /// Ask the bot to shut down, forcing it after `grace`
    async fn stop(&self, process_ref: &str, grace: Duration) -> Result<(), OrchestratorError>;
}
