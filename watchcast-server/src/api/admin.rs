//! Session administration.

use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;
use watchcast_sdk::objects::{CloseSessionResponse, SessionSummary};

use super::ResponseError;
use crate::state::AppState;

/// `GET /sessions`: list open sessions, oldest first.
pub(super) async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.registry.list())
}

/// `DELETE /sessions/{id}`: close a session with a normal close frame.
pub(super) async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CloseSessionResponse>, ResponseError> {
    if !state.registry.close(&id) {
        return Err(ResponseError::NotFound(format!("session {id}")));
    }
    tracing::info!(session_id = %id, "Session closed by administrator");
    Ok(Json(CloseSessionResponse { id, closed: true }))
}
