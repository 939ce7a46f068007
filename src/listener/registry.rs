use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::{ListenOutcome, StatusListener};
use crate::session::SessionId;

struct ListenerTask {
    session_id: SessionId,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Tracks background status listeners so they can be cancelled together.
///
/// Every listener runs under a child of one root token. Registering two
/// listeners for the same session is allowed; callers that want one per
/// session check `is_listening` first.
pub struct ListenerRegistry {
    root: CancellationToken,
    tasks: Mutex<Vec<ListenerTask>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Run `listener` for the session on a background task
    pub fn spawn(&self, listener: Arc<StatusListener>, session_id: SessionId, session_token: String) {
        let cancel = self.root.child_token();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            match listener.listen(task_cancel, session_id, &session_token).await {
                Ok(ListenOutcome::ChannelClosed) => {
                    info!(session_id = %session_id, "Listener ended: channel closed")
                }
                Ok(_) => {}
                Err(e) => error!(session_id = %session_id, "Status listener failed: {}", e),
            }
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.retain(|task| !task.handle.is_finished());
        tasks.push(ListenerTask {
            session_id,
            cancel,
            handle,
        });
    }

    pub fn is_listening(&self, session_id: SessionId) -> bool {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks
            .iter()
            .any(|task| task.session_id == session_id && !task.handle.is_finished())
    }

    /// Number of listeners still running
    pub fn len(&self) -> usize {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.iter().filter(|task| !task.handle.is_finished()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel the listeners of one session. Returns how many were signalled.
    pub fn cancel(&self, session_id: SessionId) -> usize {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let mut cancelled = 0;
        for task in tasks.iter().filter(|task| task.session_id == session_id) {
            task.cancel.cancel();
            cancelled += 1;
        }
        cancelled
    }

    /// Cancel every listener and wait for all of them to exit
    pub async fn shutdown(&self) {
        self.root.cancel();

        let tasks: Vec<ListenerTask> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            tasks.drain(..).collect()
        };

        info!("Stopping {} status listeners", tasks.len());
        for task in tasks {
            if let Err(e) = task.handle.await {
                error!(session_id = %task.session_id, "Status listener task panicked: {}", e);
            }
        }
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
