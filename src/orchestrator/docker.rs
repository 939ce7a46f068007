use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{error, info, warn};

use super::{BotOrchestrator, OrchestratorError, SpawnedBot};
use crate::session::{RecordingSession, User};

pub const CONTAINER_PREFIX: &str = "newar-bot-";

/// Settings passed to every bot container
#[derive(Debug, Clone)]
pub struct DockerSettings {
    pub docker_binary: PathBuf,
    pub bot_image: String,
    pub network: Option<String>,
    pub memory_limit: String,
    pub cpus: String,
    pub nats_url: String,
    pub status_subject_prefix: String,
    pub storage_root: PathBuf,
    pub chunk_duration_secs: u64,
    pub audio_bitrate: u32,
    /// Bound on a single `docker run`; on expiry the container is removed
    pub run_timeout: Duration,
}

/// Spawns recording bots as detached docker containers
pub struct DockerOrchestrator {
    settings: DockerSettings,
}

impl DockerOrchestrator {
    pub fn new(settings: DockerSettings) -> Self {
        info!("Docker orchestrator initialized (image: {})", settings.bot_image);
        Self { settings }
    }

    /// Arguments for `docker run` that start the bot for `session`
    pub fn run_args(
        &self,
        session: &RecordingSession,
        user: &User,
        container_name: &str,
        session_token: &str,
    ) -> Vec<String> {
        let s = &self.settings;
        let mut args: Vec<String> = vec![
            "run".into(),
            "--detach".into(),
            "--name".into(),
            container_name.into(),
            "--memory".into(),
            s.memory_limit.clone(),
            "--cpus".into(),
            s.cpus.clone(),
        ];

        if let Some(network) = &s.network {
            args.push("--network".into());
            args.push(network.clone());
        }

        let labels = [
            ("newar.meeting_id", session.id().to_string()),
            ("newar.user_id", user.id.to_string()),
            ("newar.platform", session.platform().to_string()),
        ];
        for (key, value) in labels {
            args.push("--label".into());
            args.push(format!("{}={}", key, value));
        }

        let env = [
            ("MEETING_ID", session.id().to_string()),
            ("USER_ID", user.id.to_string()),
            ("PLATFORM", session.platform().to_string()),
            ("MEETING_URL", session.meeting_url().to_string()),
            ("BOT_NAME", session.bot_name().to_string()),
            ("SESSION_TOKEN", session_token.to_string()),
            ("NATS_URL", s.nats_url.clone()),
            (
                "STATUS_SUBJECT",
                format!("{}.{}", s.status_subject_prefix, session_token),
            ),
            ("STORAGE_PATH", s.storage_root.display().to_string()),
            ("CHUNK_DURATION", s.chunk_duration_secs.to_string()),
            ("AUDIO_BITRATE", s.audio_bitrate.to_string()),
        ];
        for (key, value) in env {
            args.push("--env".into());
            args.push(format!("{}={}", key, value));
        }

        args.push(s.bot_image.clone());
        args
    }

    /// Force-remove a container by name after an abandoned `docker run`.
    /// Best-effort: the daemon may never have created it.
    async fn remove_container(&self, container_name: &str) {
        let removal = Command::new(&self.settings.docker_binary)
            .args(["rm", "--force", container_name])
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.settings.run_timeout, removal).await {
            Ok(Ok(output)) if output.status.success() => {
                info!(container_name = %container_name, "Removed abandoned container");
            }
            Ok(Ok(output)) => {
                warn!(
                    container_name = %container_name,
                    "docker rm failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            Ok(Err(e)) => {
                warn!(container_name = %container_name, "Failed to run docker rm: {}", e);
            }
            Err(_) => {
                warn!(container_name = %container_name, "docker rm timed out");
            }
        }
    }
}

#[async_trait]
impl BotOrchestrator for DockerOrchestrator {
    async fn spawn(
        &self,
        session: &RecordingSession,
        user: &User,
    ) -> Result<SpawnedBot, OrchestratorError> {
        let container_name = format!(
            "{}{}-{}",
            CONTAINER_PREFIX,
            session.id(),
            Utc::now().timestamp()
        );
        let session_token = uuid::Uuid::new_v4().to_string();

        info!(
            session_id = %session.id(),
            container_name = %container_name,
            "Spawning recording bot container"
        );

        let run = Command::new(&self.settings.docker_binary)
            .args(self.run_args(session, user, &container_name, &session_token))
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.settings.run_timeout, run).await {
            Ok(result) => {
                result.map_err(|e| OrchestratorError::Spawn(format!("failed to run docker: {}", e)))?
            }
            Err(_) => {
                error!(
                    session_id = %session.id(),
                    container_name = %container_name,
                    "docker run timed out after {:?}",
                    self.settings.run_timeout
                );
                self.remove_container(&container_name).await;
                return Err(OrchestratorError::Timeout(self.settings.run_timeout));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("docker run failed: {}", stderr.trim());
            return Err(OrchestratorError::Spawn(format!(
                "docker run exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let process_ref = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if process_ref.is_empty() {
            return Err(OrchestratorError::Spawn(
                "docker run returned no container id".to_string(),
            ));
        }

        info!(
            session_id = %session.id(),
            process_ref = %process_ref,
            "Container started successfully"
        );

        Ok(SpawnedBot {
            process_ref,
            session_token,
        })
    }

    async fn stop(&self, process_ref: &str, grace: Duration) -> Result<(), OrchestratorError> {
        info!(process_ref = %process_ref, "Stopping bot container");

        let output = Command::new(&self.settings.docker_binary)
            .args(["stop", "--time", &grace.as_secs().to_string(), process_ref])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| OrchestratorError::Stop {
                process_ref: process_ref.to_string(),
                message: format!("failed to run docker: {}", e),
            })?;

        if !output.status.success() {
            return Err(OrchestratorError::Stop {
                process_ref: process_ref.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!(process_ref = %process_ref, "Container stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionDraft, SessionId, UserId};

    fn settings() -> DockerSettings {
        DockerSettings {
            docker_binary: PathBuf::from("docker"),
            bot_image: "newar-recording-bot:latest".to_string(),
            network: Some("newar-network".to_string()),
            memory_limit: "2g".to_string(),
            cpus: "1".to_string(),
            nats_url: "nats://nats:4222".to_string(),
            status_subject_prefix: "bot.status".to_string(),
            storage_root: PathBuf::from("/storage/recordings"),
            chunk_duration_secs: 10,
            audio_bitrate: 128000,
            run_timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_run_args_carry_bot_environment() {
        let user = User::new(UserId(3), "a@b.co", "A", None).unwrap();
        let draft = SessionDraft::new(
            UserId(3),
            "teams",
            "https://teams.microsoft.com/l/meetup-join/1",
            "meetup-join-1",
            Some("Scribe"),
        )
        .unwrap();
        let session = RecordingSession::create(SessionId(42), draft);

        let orchestrator = DockerOrchestrator::new(settings());
        let args = orchestrator.run_args(&session, &user, "newar-bot-42-1", "tok-1");

        assert_eq!(&args[..2], &["run", "--detach"]);
        assert_eq!(args.last().map(String::as_str), Some("newar-recording-bot:latest"));
        for expected in [
            "MEETING_ID=42",
            "USER_ID=3",
            "PLATFORM=teams",
            "BOT_NAME=Scribe",
            "SESSION_TOKEN=tok-1",
            "STATUS_SUBJECT=bot.status.tok-1",
            "CHUNK_DURATION=10",
            "newar.meeting_id=42",
        ] {
            assert!(args.iter().any(|a| a == expected), "missing {}", expected);
        }
        assert!(args.windows(2).any(|w| w[0] == "--network" && w[1] == "newar-network"));
    }
}
