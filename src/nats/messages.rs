use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{SessionId, SessionStatus};

/// Bot status update published by a recording bot on its status channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub session_id: SessionId,
    /// Container id (or other runtime handle) of the publishing bot
    pub process_ref: String,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

impl StatusMessage {
    pub fn new(session_id: SessionId, process_ref: impl Into<String>, status: SessionStatus) -> Self {
        Self {
            session_id,
            process_ref: process_ref.into(),
            status,
            error_message: None,
            chunk_count: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_error(mut self, error_message: impl Into<String>) -> Self {
        self.error_message = Some(error_message.into());
        self
    }

    pub fn with_chunk_count(mut self, chunk_count: u32) -> Self {
        self.chunk_count = Some(chunk_count);
        self
    }

    /// A clean completion report, which triggers finalization
    pub fn is_clean_completion(&self) -> bool {
        self.status == SessionStatus::Completed && self.error_message.is_none()
    }
}
