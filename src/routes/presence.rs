use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::guards::Principal;
use crate::services::presence_service::{PresenceDisplay, PresenceService, UserStatus};
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct HeartbeatRequest {
    #[serde(default)]
    pub status: UserStatus,
}

/// POST /presence/heartbeat
///
/// Stamp `last_seen = now` plus the self-reported status. Failures are
/// swallowed: a heartbeat must never interrupt the session, so the client
/// always sees 204.
pub async fn heartbeat(
    State(state): State<AppState>,
    user: Principal,
    body: Option<Json<HeartbeatRequest>>,
) -> StatusCode {
    let status = body.map(|Json(b)| b.status).unwrap_or_default();
    if let Err(e) = PresenceService::heartbeat(&state.db, user.id, status).await {
        tracing::debug!(error = %e, "presence heartbeat failed; ignored");
    }
    StatusCode::NO_CONTENT
}

/// GET /users/{id}/presence
pub async fn get_presence(
    State(state): State<AppState>,
    _user: Principal,
    Path(user_id): Path<Uuid>,
) -> Result<Json<PresenceDisplay>, AppError> {
    let display = PresenceService::presence_for(&state.db, user_id).await?;
    Ok(Json(display))
}
