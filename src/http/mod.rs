//! HTTP API over the bot coordinator
//!
//! - POST /recordings - Validate and store a recording request
//! - GET /recordings/:id - Session state
//! - POST /bots/spawn - Spawn the bot for a requested session
//! - POST /bots/:process_ref/stop - Ask a bot to shut down
//! - GET /health - Health check
//!
//! Coordinator errors map to 400 (validation), 404 (not found), 429 (quota),
//! 409 (invalid transition) and 500 (orchestrator or storage failures).

mod handlers;
mod routes;
mod state;

pub use handlers::{ErrorResponse, SpawnBotRequest};
pub use routes::create_router;
pub use state::AppState;
