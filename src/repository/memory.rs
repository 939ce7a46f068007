use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

use super::{MeetingFilter, MeetingRepository, RepositoryError, StatusUpdate, UserRepository};
use crate::session::{RecordingSession, SessionDraft, SessionId, SessionRecord, User, UserId};

/// Process-local store for sessions and users.
///
/// Sessions are kept in their persisted `SessionRecord` shape and hydrated on
/// every read, the same path a database-backed store would take. The write
/// lock serializes concurrent writes to the same session.
pub struct InMemoryRepository {
    inner: RwLock<Store>,
}

#[derive(Default)]
struct Store {
    sessions: BTreeMap<SessionId, SessionRecord>,
    users: HashMap<UserId, User>,
    next_session_id: i64,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Store {
                next_session_id: 1,
                ..Store::default()
            }),
        }
    }

    async fn mutate<F>(&self, id: SessionId, apply: F) -> Result<RecordingSession, RepositoryError>
    where
        F: FnOnce(&mut RecordingSession) -> Result<(), RepositoryError> + Send,
    {
        let mut store = self.inner.write().await;
        let record = store
            .sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::session_not_found(id))?;

        let mut session = RecordingSession::from_record(record)?;
        apply(&mut session)?;
        store.sessions.insert(id, session.to_record());

        Ok(session)
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MeetingRepository for InMemoryRepository {
    async fn insert(&self, draft: SessionDraft) -> Result<RecordingSession, RepositoryError> {
        let mut store = self.inner.write().await;
        let id = SessionId(store.next_session_id);
        store.next_session_id += 1;

        let session = RecordingSession::create(id, draft);
        store.sessions.insert(id, session.to_record());

        debug!(session_id = %id, "Inserted session");
        Ok(session)
    }

    async fn get(&self, filter: &MeetingFilter) -> Result<RecordingSession, RepositoryError> {
        let store = self.inner.read().await;
        let record = store
            .sessions
            .values()
            .find(|record| filter.matches(record))
            .cloned()
            .ok_or_else(|| RepositoryError::session_not_found(format!("{:?}", filter)))?;

        Ok(RecordingSession::from_record(record)?)
    }

    async fn list(&self, filter: &MeetingFilter) -> Result<Vec<RecordingSession>, RepositoryError> {
        let store = self.inner.read().await;
        store
            .sessions
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .map(|record| RecordingSession::from_record(record).map_err(RepositoryError::from))
            .collect()
    }

    async fn attach_bot(
        &self,
        id: SessionId,
        process_ref: &str,
        session_token: &str,
    ) -> Result<RecordingSession, RepositoryError> {
        self.mutate(id, |session| {
            session.attach_bot(process_ref, session_token)?;
            Ok(())
        })
        .await
    }

    async fn update_status(
        &self,
        id: SessionId,
        update: StatusUpdate,
    ) -> Result<RecordingSession, RepositoryError> {
        let status = update.status;
        let session = self
            .mutate(id, move |session| {
                let changed = session.apply_status(
                    update.status,
                    update.recording_path,
                    update.error_message,
                    update.duration_seconds,
                )?;
                if !changed {
                    debug!(session_id = %id, %status, "Status re-delivered, nothing to update");
                }
                Ok(())
            })
            .await?;

        debug!(session_id = %id, status = %session.status(), "Updated session status");
        Ok(session)
    }

    async fn list_active(&self) -> Result<Vec<RecordingSession>, RepositoryError> {
        let store = self.inner.read().await;
        store
            .sessions
            .values()
            .filter(|record| !record.status.is_terminal())
            .cloned()
            .map(|record| RecordingSession::from_record(record).map_err(RepositoryError::from))
            .collect()
    }

    async fn count_active_for_user(&self, user_id: UserId) -> Result<usize, RepositoryError> {
        let store = self.inner.read().await;
        Ok(store
            .sessions
            .values()
            .filter(|record| record.user_id == user_id && record.status.is_active())
            .count())
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn insert_user(&self, user: User) -> Result<User, RepositoryError> {
        let mut store = self.inner.write().await;
        if store.users.contains_key(&user.id) {
            return Err(RepositoryError::WriteFailed(format!(
                "user {} already exists",
                user.id
            )));
        }
        store.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<User, RepositoryError> {
        let store = self.inner.read().await;
        store
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::user_not_found(id))
    }
}
