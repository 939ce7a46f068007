use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Recording sessions
        .route("/recordings", post(handlers::request_recording))
        .route("/recordings/:session_id", get(handlers::get_recording))
        // Bot lifecycle
        .route("/bots/spawn", post(handlers::spawn_bot))
        .route("/bots/:process_ref/stop", post(handlers::stop_bot))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
