use super::state::AppState;
use crate::coordinator::{CoordinatorError, NewRecordingRequest};
use crate::session::SessionId;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SpawnBotRequest {
    pub session_id: SessionId,
}

#[derive(Debug, Serialize)]
pub struct StopBotResponse {
    pub process_ref: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub listeners: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

fn status_for(err: &CoordinatorError) -> StatusCode {
    match err {
        CoordinatorError::Validation(_) => StatusCode::BAD_REQUEST,
        CoordinatorError::NotFound(_) => StatusCode::NOT_FOUND,
        CoordinatorError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        CoordinatorError::InvalidTransition(_) => StatusCode::CONFLICT,
        CoordinatorError::SpawnFailed(_)
        | CoordinatorError::StopFailed(_)
        | CoordinatorError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: CoordinatorError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        warn!("Request rejected ({}): {}", err.kind(), err);
    }

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            kind: err.kind().to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /recordings
/// Validate a recording request and store it as a requested session
pub async fn request_recording(
    State(state): State<AppState>,
    Json(req): Json<NewRecordingRequest>,
) -> Response {
    info!("Recording requested for meeting {} by user {}", req.meeting_id, req.user_id);

    match state.coordinator.request_recording(req).await {
        Ok(session) => (StatusCode::CREATED, Json(session.to_record())).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /recordings/:session_id
pub async fn get_recording(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> Response {
    match state.coordinator.get_session(SessionId(session_id)).await {
        Ok(session) => (StatusCode::OK, Json(session.to_record())).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /bots/spawn
/// Spawn the recording bot for a requested session
pub async fn spawn_bot(
    State(state): State<AppState>,
    Json(req): Json<SpawnBotRequest>,
) -> Response {
    info!("Spawning bot for session: {}", req.session_id);

    match state.coordinator.spawn_bot(req.session_id).await {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /bots/:process_ref/stop
/// Ask a bot to shut down; it reports its own terminal status
pub async fn stop_bot(
    State(state): State<AppState>,
    Path(process_ref): Path<String>,
) -> Response {
    info!("Stopping bot: {}", process_ref);

    match state.coordinator.stop_bot(&process_ref).await {
        Ok(()) => (
            StatusCode::OK,
            Json(StopBotResponse {
                message: format!("Bot {} stopped", process_ref),
                process_ref,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            listeners: state.coordinator.listeners().len(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::OrchestratorError;
    use crate::session::UserId;

    #[test]
    fn test_error_kinds_map_to_http_status() {
        let cases = [
            (CoordinatorError::Validation("bad url".into()), StatusCode::BAD_REQUEST),
            (CoordinatorError::NotFound("session 9".into()), StatusCode::NOT_FOUND),
            (
                CoordinatorError::QuotaExceeded {
                    user_id: UserId(1),
                    limit: 2,
                    active: 2,
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (CoordinatorError::InvalidTransition("x".into()), StatusCode::CONFLICT),
            (
                CoordinatorError::SpawnFailed(OrchestratorError::Spawn("boom".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(status_for(&err), expected, "{}", err.kind());
        }
    }
}
