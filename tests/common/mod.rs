// Shared fixtures for the integration tests: an in-memory repository and
// status channel, a scripted orchestrator, and a byte-stream finalizer over a
// temporary storage root.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use newar_bot_manager::{
    BotCoordinator, BotOrchestrator, ByteStreamConcatenator, CoordinatorSettings,
    Finalizer, InMemoryRepository, MeetingFilter, MeetingRepository, MemoryStatusChannel,
    NewRecordingRequest, OrchestratorError, RecordingSession, SessionId, SessionStatus,
    SpawnedBot, StorageLayout, User, UserId, UserRepository,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const WAIT: Duration = Duration::from_secs(5);

/// Orchestrator that hands out `bot-{n}` process refs and records calls
#[derive(Default)]
pub struct ScriptedOrchestrator {
    pub fail_spawn: AtomicBool,
    pub fail_stop: AtomicBool,
    spawned: AtomicUsize,
    pub stopped: Mutex<Vec<(String, Duration)>>,
}

impl ScriptedOrchestrator {
    pub fn spawn_count(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> Vec<(String, Duration)> {
        self.stopped.lock().unwrap().clone()
    }
}

#[async_trait]
impl BotOrchestrator for ScriptedOrchestrator {
    async fn spawn(
        &self,
        session: &RecordingSession,
        _user: &User,
    ) -> Result<SpawnedBot, OrchestratorError> {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(OrchestratorError::Spawn("image not found".to_string()));
        }
        let n = self.spawned.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SpawnedBot {
            process_ref: format!("bot-{}", n),
            session_token: format!("token-{}", session.id()),
        })
    }

    async fn stop(&self, process_ref: &str, grace: Duration) -> Result<(), OrchestratorError> {
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(OrchestratorError::Stop {
                process_ref: process_ref.to_string(),
                message: "no such container".to_string(),
            });
        }
        self.stopped
            .lock()
            .unwrap()
            .push((process_ref.to_string(), grace));
        Ok(())
    }
}

pub struct Harness {
    pub repository: Arc<InMemoryRepository>,
    pub channel: Arc<MemoryStatusChannel>,
    pub orchestrator: Arc<ScriptedOrchestrator>,
    pub coordinator: Arc<BotCoordinator>,
    pub layout: StorageLayout,
    _storage: TempDir,
}

impl Harness {
    pub fn new() -> Result<Self> {
        let storage = TempDir::new()?;
        let layout = StorageLayout::new(storage.path(), "webm");

        let repository = Arc::new(InMemoryRepository::new());
        let channel = Arc::new(MemoryStatusChannel::new());
        let orchestrator = Arc::new(ScriptedOrchestrator::default());
        let finalizer = Arc::new(
            Finalizer::new(layout.clone(), Arc::new(ByteStreamConcatenator))
                .with_cleanup_delay(Duration::from_millis(20)),
        );

        let coordinator = Arc::new(BotCoordinator::new(
            repository.clone(),
            repository.clone(),
            orchestrator.clone(),
            channel.clone(),
            finalizer,
            CoordinatorSettings {
                spawn_timeout: Duration::from_secs(2),
                stop_timeout: Duration::from_secs(2),
                stop_grace: Duration::from_secs(1),
            },
        ));

        Ok(Self {
            repository,
            channel,
            orchestrator,
            coordinator,
            layout,
            _storage: storage,
        })
    }

    pub async fn add_user(&self, id: i64, max_concurrent_bots: Option<u32>) -> Result<User> {
        let user = User::new(
            UserId(id),
            &format!("user{}@example.com", id),
            "Test User",
            max_concurrent_bots,
        )?;
        Ok(self.repository.insert_user(user).await?)
    }

    pub fn recording_request(user_id: i64) -> NewRecordingRequest {
        NewRecordingRequest {
            user_id: UserId(user_id),
            platform: "google_meet".to_string(),
            meeting_url: "https://meet.google.com/abc-defg-hij".to_string(),
            meeting_id: "abc-defg-hij".to_string(),
            bot_name: None,
        }
    }

    pub async fn requested_session(&self, user_id: i64) -> Result<RecordingSession> {
        Ok(self
            .coordinator
            .request_recording(Self::recording_request(user_id))
            .await?)
    }

    pub async fn session(&self, id: SessionId) -> Result<RecordingSession> {
        Ok(self.repository.get(&MeetingFilter::by_id(id)).await?)
    }

    /// Write chunk files with the given sequence numbers; each holds `chunk-{i};`
    pub async fn write_chunks(&self, id: SessionId, indices: &[u32]) -> Result<()> {
        tokio::fs::create_dir_all(self.layout.temp_dir(id)).await?;
        for &i in indices {
            tokio::fs::write(self.layout.chunk_path(id, i), format!("chunk-{};", i)).await?;
        }
        Ok(())
    }

    /// Poll the repository until the session reaches `status`
    pub async fn wait_for_status(
        &self,
        id: SessionId,
        status: SessionStatus,
    ) -> Result<RecordingSession> {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let session = self.session(id).await?;
            if session.status() == status {
                return Ok(session);
            }
            if tokio::time::Instant::now() >= deadline {
                bail!(
                    "session {} stuck in {} waiting for {}",
                    id,
                    session.status(),
                    status
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Poll until no status listener is running
    pub async fn wait_for_listeners_idle(&self) -> Result<()> {
        let deadline = tokio::time::Instant::now() + WAIT;
        while !self.coordinator.listeners().is_empty() {
            if tokio::time::Instant::now() >= deadline {
                bail!(
                    "{} listeners still running",
                    self.coordinator.listeners().len()
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }

    /// Spawn a bot for a fresh session and wait for its listener to subscribe.
    /// Returns the session id, process ref and session token.
    pub async fn spawned_session(&self, user_id: i64) -> Result<(SessionId, String, String)> {
        let session = self.requested_session(user_id).await?;
        let outcome = self.coordinator.spawn_bot(session.id()).await?;
        let token = format!("token-{}", session.id());
        if !self.channel.wait_for_subscribers(&token, 1, WAIT).await {
            bail!("listener for session {} never subscribed", session.id());
        }
        Ok((session.id(), outcome.process_ref, token))
    }
}
