use crate::coordinator::BotCoordinator;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<BotCoordinator>,
}

impl AppState {
    pub fn new(coordinator: Arc<BotCoordinator>) -> Self {
        Self { coordinator }
    }
}
