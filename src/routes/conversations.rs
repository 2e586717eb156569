use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::guards::Principal;
use crate::models::conversation::{ConversationFilter, ConversationSummary};
use crate::services::conversation_service::ConversationService;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ConversationQuery {
    #[serde(default)]
    pub filter: ConversationFilter,
}

/// GET /conversations?filter=all|unread|archived
///
/// The list is derived on every load; nothing conversation-shaped is
/// persisted.
pub async fn list_conversations(
    State(state): State<AppState>,
    user: Principal,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<Vec<ConversationSummary>>, AppError> {
    let summaries =
        ConversationService::list_conversations(&state.db, user.id, query.filter).await?;
    Ok(Json(summaries))
}
