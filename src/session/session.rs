use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::DomainError;
use super::status::SessionStatus;
use super::user::UserId;
use super::values::{resolve_bot_name, validate_external_meeting_id, MeetingUrl, Platform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated input for a new recording session, before an id is assigned
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDraft {
    pub(crate) user_id: UserId,
    pub(crate) platform: Platform,
    pub(crate) external_meeting_id: String,
    pub(crate) meeting_url: MeetingUrl,
    pub(crate) bot_name: String,
}

impl SessionDraft {
    pub fn new(
        user_id: UserId,
        platform: &str,
        meeting_url: &str,
        external_meeting_id: &str,
        bot_name: Option<&str>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            user_id,
            platform: platform.parse()?,
            external_meeting_id: validate_external_meeting_id(external_meeting_id)?,
            meeting_url: MeetingUrl::parse(meeting_url)?,
            bot_name: resolve_bot_name(bot_name)?,
        })
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

/// One recording attempt, from request through finalized artifact or failure.
///
/// Fields are private so every status change goes through the transition
/// methods below.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSession {
    id: SessionId,
    user_id: UserId,
    platform: Platform,
    external_meeting_id: String,
    meeting_url: MeetingUrl,
    bot_name: String,
    status: SessionStatus,
    bot_process_ref: Option<String>,
    session_token: Option<String>,
    recording_path: Option<String>,
    recording_duration_seconds: Option<u32>,
    error_message: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Flat persistence shape of a [`RecordingSession`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub user_id: UserId,
    pub platform: Platform,
    pub external_meeting_id: String,
    pub meeting_url: String,
    pub bot_name: String,
    pub status: SessionStatus,
    pub bot_process_ref: Option<String>,
    pub session_token: Option<String>,
    pub recording_path: Option<String>,
    pub recording_duration_seconds: Option<u32>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecordingSession {
    /// Materialize a draft under its assigned id, in `Requested`.
    pub fn create(id: SessionId, draft: SessionDraft) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id: draft.user_id,
            platform: draft.platform,
            external_meeting_id: draft.external_meeting_id,
            meeting_url: draft.meeting_url,
            bot_name: draft.bot_name,
            status: SessionStatus::Requested,
            bot_process_ref: None,
            session_token: None,
            recording_path: None,
            recording_duration_seconds: None,
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a session loaded from storage.
    ///
    /// Only for read hydration: the stored status and outcome fields are
    /// trusted as-is and never re-run through transition checks. Value
    /// objects are still re-validated.
    pub fn from_record(record: SessionRecord) -> Result<Self, DomainError> {
        Ok(Self {
            id: record.id,
            user_id: record.user_id,
            platform: record.platform,
            external_meeting_id: record.external_meeting_id,
            meeting_url: MeetingUrl::parse(&record.meeting_url)?,
            bot_name: record.bot_name,
            status: record.status,
            bot_process_ref: record.bot_process_ref,
            session_token: record.session_token,
            recording_path: record.recording_path,
            recording_duration_seconds: record.recording_duration_seconds,
            error_message: record.error_message,
            started_at: record.started_at,
            completed_at: record.completed_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            id: self.id,
            user_id: self.user_id,
            platform: self.platform,
            external_meeting_id: self.external_meeting_id.clone(),
            meeting_url: self.meeting_url.as_str().to_string(),
            bot_name: self.bot_name.clone(),
            status: self.status,
            bot_process_ref: self.bot_process_ref.clone(),
            session_token: self.session_token.clone(),
            recording_path: self.recording_path.clone(),
            recording_duration_seconds: self.recording_duration_seconds,
            error_message: self.error_message.clone(),
            started_at: self.started_at,
            completed_at: self.completed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn external_meeting_id(&self) -> &str {
        &self.external_meeting_id
    }

    pub fn meeting_url(&self) -> &MeetingUrl {
        &self.meeting_url
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn bot_process_ref(&self) -> Option<&str> {
        self.bot_process_ref.as_deref()
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    pub fn recording_path(&self) -> Option<&str> {
        self.recording_path.as_deref()
    }

    pub fn recording_duration_seconds(&self) -> Option<u32> {
        self.recording_duration_seconds
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        self.status.can_transition(next)
    }

    /// Move along one edge of the transition table.
    pub fn transition_to(&mut self, next: SessionStatus) -> Result<(), DomainError> {
        if !self.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        let now = self.touch();
        match next {
            SessionStatus::Active => self.started_at = Some(now),
            SessionStatus::Completed | SessionStatus::Failed => self.completed_at = Some(now),
            _ => {}
        }
        Ok(())
    }

    /// Mark the session failed. Valid from every non-terminal status.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: SessionStatus::Failed,
            });
        }

        self.status = SessionStatus::Failed;
        self.error_message = Some(reason.into());
        self.completed_at = Some(self.touch());
        Ok(())
    }

    /// Complete the session with its finalized artifact. Valid only from `Finalizing`.
    pub fn complete(
        &mut self,
        recording_path: impl Into<String>,
        duration_seconds: Option<u32>,
    ) -> Result<(), DomainError> {
        if self.status != SessionStatus::Finalizing {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: SessionStatus::Completed,
            });
        }

        let recording_path = recording_path.into();
        if recording_path.is_empty() {
            return Err(DomainError::validation(
                "recording_path",
                "completed sessions need a recording path",
            ));
        }

        self.transition_to(SessionStatus::Completed)?;
        self.recording_path = Some(recording_path);
        self.recording_duration_seconds = duration_seconds;
        Ok(())
    }

    /// Record the spawned bot process. Set at most once per session.
    pub fn attach_bot(
        &mut self,
        process_ref: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Result<(), DomainError> {
        if let Some(existing) = &self.bot_process_ref {
            return Err(DomainError::BotAlreadyAttached(existing.clone()));
        }

        self.bot_process_ref = Some(process_ref.into());
        self.session_token = Some(session_token.into());
        self.touch();
        Ok(())
    }

    /// Single entry point for externally reported status changes.
    ///
    /// Returns `Ok(false)` when the report re-delivers the current status.
    /// A `Completed` report without an artifact but with an error is
    /// recorded as a failure, since error messages only accompany `Failed`.
    pub fn apply_status(
        &mut self,
        status: SessionStatus,
        recording_path: Option<String>,
        error_message: Option<String>,
        duration_seconds: Option<u32>,
    ) -> Result<bool, DomainError> {
        if status == self.status {
            return Ok(false);
        }

        match (status, recording_path, error_message) {
            (SessionStatus::Failed, _, error) => {
                self.fail(error.unwrap_or_else(|| "bot reported failure".to_string()))?
            }
            (SessionStatus::Completed, Some(path), _) => self.complete(path, duration_seconds)?,
            (SessionStatus::Completed, None, Some(error)) => self.fail(error)?,
            (SessionStatus::Completed, None, None) => {
                return Err(DomainError::validation(
                    "recording_path",
                    "completed sessions need a recording path",
                ))
            }
            (next, _, _) => self.transition_to(next)?,
        }
        Ok(true)
    }

    /// Bump `updated_at` without ever moving it backwards.
    fn touch(&mut self) -> DateTime<Utc> {
        let now = Utc::now().max(self.updated_at);
        self.updated_at = now;
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionStatus::*;

    fn session() -> RecordingSession {
        let draft = SessionDraft::new(
            UserId(1),
            "google_meet",
            "https://meet.google.com/abc-defg-hij",
            "abc-defg-hij",
            None,
        )
        .unwrap();
        RecordingSession::create(SessionId(10), draft)
    }

    fn advance(session: &mut RecordingSession, path: &[SessionStatus]) {
        for status in path {
            session.transition_to(*status).unwrap();
        }
    }

    #[test]
    fn test_new_session_starts_requested() {
        let s = session();
        assert_eq!(s.status(), Requested);
        assert_eq!(s.bot_name(), "Newar Recorder");
        assert!(s.bot_process_ref().is_none());
        assert!(s.recording_path().is_none());
        assert!(s.is_active());
    }

    #[test]
    fn test_draft_validation() {
        assert!(SessionDraft::new(UserId(1), "zoom", "https://zoom.us/j/1", "123", None).is_err());
        assert!(SessionDraft::new(UserId(1), "teams", "teams.microsoft.com", "abc", None).is_err());
        assert!(SessionDraft::new(UserId(1), "teams", "https://teams.microsoft.com/x", "", None).is_err());
    }

    #[test]
    fn test_fail_from_every_non_terminal_state() {
        let paths: [&[SessionStatus]; 5] = [
            &[],
            &[Joining],
            &[Joining, Active],
            &[Joining, Active, Recording],
            &[Joining, Active, Recording, Finalizing],
        ];

        for path in paths {
            let mut s = session();
            advance(&mut s, path);
            s.fail("browser crashed").unwrap();
            assert_eq!(s.status(), Failed);
            assert_eq!(s.error_message(), Some("browser crashed"));
            assert!(s.completed_at().is_some());
        }
    }

    #[test]
    fn test_fail_rejected_from_terminal_states() {
        let mut s = session();
        s.fail("first").unwrap();
        assert_eq!(
            s.fail("second"),
            Err(DomainError::InvalidTransition { from: Failed, to: Failed })
        );
        assert_eq!(s.error_message(), Some("first"));

        let mut done = session();
        advance(&mut done, &[Joining, Active, Recording, Finalizing]);
        done.complete("final/session_10.webm", Some(60)).unwrap();
        assert!(done.fail("late").is_err());
        assert!(done.error_message().is_none());
    }

    #[test]
    fn test_complete_only_from_finalizing() {
        let mut s = session();
        advance(&mut s, &[Joining, Active, Recording]);
        assert_eq!(
            s.complete("final/x.webm", Some(5)),
            Err(DomainError::InvalidTransition { from: Recording, to: Completed })
        );
        assert!(s.recording_path().is_none());

        s.transition_to(Finalizing).unwrap();
        s.complete("final/x.webm", Some(5)).unwrap();
        assert_eq!(s.status(), Completed);
        assert_eq!(s.recording_path(), Some("final/x.webm"));
        assert_eq!(s.recording_duration_seconds(), Some(5));
        assert!(s.error_message().is_none());
    }

    #[test]
    fn test_transition_sets_timestamps() {
        let mut s = session();
        let created = s.updated_at();
        advance(&mut s, &[Joining]);
        assert!(s.started_at().is_none());
        advance(&mut s, &[Active]);
        assert!(s.started_at().is_some());
        assert!(s.updated_at() >= created);
    }

    #[test]
    fn test_attach_bot_only_once() {
        let mut s = session();
        s.attach_bot("c0ffee", "token-1").unwrap();
        assert_eq!(s.bot_process_ref(), Some("c0ffee"));
        assert_eq!(s.session_token(), Some("token-1"));
        assert_eq!(
            s.attach_bot("beef", "token-2"),
            Err(DomainError::BotAlreadyAttached("c0ffee".to_string()))
        );
        assert_eq!(s.session_token(), Some("token-1"));
    }

    #[test]
    fn test_apply_status_redelivery_is_noop() {
        let mut s = session();
        assert!(s.apply_status(Joining, None, None, None).unwrap());
        assert!(!s.apply_status(Joining, None, None, None).unwrap());
        assert_eq!(
            s.apply_status(Recording, None, None, None),
            Err(DomainError::InvalidTransition { from: Joining, to: Recording })
        );
    }

    #[test]
    fn test_apply_status_completed_with_error_fails() {
        let mut s = session();
        advance(&mut s, &[Joining, Active, Recording]);
        s.apply_status(Completed, None, Some("upload failed".into()), None)
            .unwrap();
        assert_eq!(s.status(), Failed);
        assert_eq!(s.error_message(), Some("upload failed"));
    }

    #[test]
    fn test_record_round_trip() {
        let mut s = session();
        s.attach_bot("abc123", "tok").unwrap();
        advance(&mut s, &[Joining, Active]);

        let record = s.to_record();
        let json = serde_json::to_string(&record).unwrap();
        let parsed: SessionRecord = serde_json::from_str(&json).unwrap();
        let restored = RecordingSession::from_record(parsed).unwrap();
        assert_eq!(restored, s);
    }

    #[test]
    fn test_hydration_trusts_stored_outcome() {
        let mut record = session().to_record();
        record.status = Completed;
        record.recording_path = Some("final/legacy.webm".to_string());

        let restored = RecordingSession::from_record(record).unwrap();
        assert_eq!(restored.status(), Completed);
        assert_eq!(restored.recording_path(), Some("final/legacy.webm"));
    }
}
