use thiserror::Error;

use crate::orchestrator::OrchestratorError;
use crate::repository::RepositoryError;
use crate::session::{DomainError, UserId};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("user {user_id} has reached the limit of {limit} concurrent bots ({active} active)")]
    QuotaExceeded {
        user_id: UserId,
        limit: u32,
        active: usize,
    },
    #[error("{0}")]
    InvalidTransition(String),
    #[error("spawn failed: {0}")]
    SpawnFailed(#[source] OrchestratorError),
    #[error("stop failed: {0}")]
    StopFailed(#[source] OrchestratorError),
    #[error("repository error: {0}")]
    Repository(#[source] RepositoryError),
}

impl CoordinatorError {
    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::SpawnFailed(_) => "spawn_failed",
            Self::StopFailed(_) => "stop_failed",
            Self::Repository(_) => "repository",
        }
    }
}

impl From<DomainError> for CoordinatorError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation { .. } => Self::Validation(err.to_string()),
            DomainError::InvalidTransition { .. } | DomainError::BotAlreadyAttached(_) => {
                Self::InvalidTransition(err.to_string())
            }
        }
    }
}

impl From<RepositoryError> for CoordinatorError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { .. } => Self::NotFound(err.to_string()),
            RepositoryError::Domain(domain) => domain.into(),
            other => Self::Repository(other),
        }
    }
}
