//! Persistence contracts for sessions and users
//!
//! The bot manager only consumes these traits; `InMemoryRepository` is the
//! bundled implementation used by the binary and the tests.

mod memory;

pub use memory::InMemoryRepository;

use async_trait::async_trait;
use thiserror::Error;

use crate::session::{
    DomainError, Platform, RecordingSession, SessionDraft, SessionId, SessionRecord,
    SessionStatus, User, UserId,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl RepositoryError {
    pub fn session_not_found(key: impl ToString) -> Self {
        Self::NotFound {
            entity: "session",
            key: key.to_string(),
        }
    }

    pub fn user_not_found(id: UserId) -> Self {
        Self::NotFound {
            entity: "user",
            key: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Filter criteria for session lookups; unset fields match anything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeetingFilter {
    pub id: Option<SessionId>,
    pub user_id: Option<UserId>,
    pub platform: Option<Platform>,
    pub external_meeting_id: Option<String>,
    pub status: Option<SessionStatus>,
    pub session_token: Option<String>,
    pub bot_process_ref: Option<String>,
}

impl MeetingFilter {
    pub fn by_id(id: SessionId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn by_session_token(token: impl Into<String>) -> Self {
        Self {
            session_token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn by_process_ref(process_ref: impl Into<String>) -> Self {
        Self {
            bot_process_ref: Some(process_ref.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &SessionRecord) -> bool {
        self.id.map_or(true, |id| record.id == id)
            && self.user_id.map_or(true, |id| record.user_id == id)
            && self.platform.map_or(true, |p| record.platform == p)
            && self
                .external_meeting_id
                .as_deref()
                .map_or(true, |m| record.external_meeting_id == m)
            && self.status.map_or(true, |s| record.status == s)
            && self
                .session_token
                .as_deref()
                .map_or(true, |t| record.session_token.as_deref() == Some(t))
            && self
                .bot_process_ref
                .as_deref()
                .map_or(true, |r| record.bot_process_ref.as_deref() == Some(r))
    }
}

/// Partial update applied through the session state machine
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: SessionStatus,
    pub recording_path: Option<String>,
    pub error_message: Option<String>,
    pub duration_seconds: Option<u32>,
}

impl StatusUpdate {
    pub fn to(status: SessionStatus) -> Self {
        Self {
            status,
            recording_path: None,
            error_message: None,
            duration_seconds: None,
        }
    }

    pub fn failed(error_message: impl Into<String>) -> Self {
        Self {
            error_message: Some(error_message.into()),
            ..Self::to(SessionStatus::Failed)
        }
    }

    pub fn completed(recording_path: impl Into<String>, duration_seconds: Option<u32>) -> Self {
        Self {
            recording_path: Some(recording_path.into()),
            duration_seconds,
            ..Self::to(SessionStatus::Completed)
        }
    }

    pub fn with_error(mut self, error_message: Option<String>) -> Self {
        self.error_message = error_message;
        self
    }
}

#[async_trait]
pub trait MeetingRepository: Send + Sync {
    /// Persist a new session in `Requested` and return it with its assigned id
    async fn insert(&self, draft: SessionDraft) -> Result<RecordingSession, RepositoryError>;

    /// First session matching the filter
    async fn get(&self, filter: &MeetingFilter) -> Result<RecordingSession, RepositoryError>;

    async fn list(&self, filter: &MeetingFilter) -> Result<Vec<RecordingSession>, RepositoryError>;

    /// Record the spawned bot's process ref and session token (at most once)
    async fn attach_bot(
        &self,
        id: SessionId,
        process_ref: &str,
        session_token: &str,
    ) -> Result<RecordingSession, RepositoryError>;

    /// Apply a status change; rejected if the state machine does not allow it
    async fn update_status(
        &self,
        id: SessionId,
        update: StatusUpdate,
    ) -> Result<RecordingSession, RepositoryError>;

    /// Sessions in any non-terminal status, for restart reconciliation
    async fn list_active(&self) -> Result<Vec<RecordingSession>, RepositoryError>;

    /// Sessions counted against the user's concurrent bot limit
    async fn count_active_for_user(&self, user_id: UserId) -> Result<usize, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert_user(&self, user: User) -> Result<User, RepositoryError>;

    async fn get_user(&self, id: UserId) -> Result<User, RepositoryError>;
}
