use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::guards::Principal;
use crate::models::message::{CallType, Message};
use crate::services::call_service::{CallAction, CallService};
use crate::services::notification_service::{
    NewNotification, NotificationKind, NotificationService,
};
use crate::services::profile_service::ProfileService;
use crate::state::AppState;
use crate::websocket::events::{broadcast_event, ChatEvent};

#[derive(Deserialize)]
pub struct ProposeCallRequest {
    pub job_id: Option<Uuid>,
    pub call_type: CallType,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RespondAction {
    Accept,
    Decline,
    CounterPropose,
}

#[derive(Deserialize)]
pub struct RespondCallRequest {
    pub action: RespondAction,
    /// Required for counter-proposals, ignored otherwise.
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct RespondCallResponse {
    pub message: Message,
    pub should_open_call: bool,
    pub counter_invitation: Option<Message>,
}

async fn notify_invitation(state: &AppState, proposer: Uuid, recipient: Uuid, job_id: Option<Uuid>) {
    let proposer_name = ProfileService::display_name(&state.db, proposer)
        .await
        .unwrap_or_else(|_| "Someone".to_string());

    NotificationService::create_best_effort(
        &state.db,
        NewNotification {
            user_id: recipient,
            kind: NotificationKind::VideoCallInvitation,
            title: "Video call invitation".to_string(),
            message: format!("{proposer_name} invited you to a video call"),
            payload: NewNotification::payload_for(job_id, proposer),
        },
    )
    .await;
}

fn proposed_event(message: &Message) -> Option<ChatEvent> {
    let invitation = message.call_invitation()?;
    Some(ChatEvent::CallProposed {
        message_id: message.id,
        proposer_id: message.sender_id,
        recipient_id: message.recipient_id,
        job_id: message.job_id,
        call_type: invitation.call_type,
    })
}

/// POST /threads/{counterpart}/calls
pub async fn propose_call(
    State(state): State<AppState>,
    user: Principal,
    Path(counterpart): Path<Uuid>,
    Json(body): Json<ProposeCallRequest>,
) -> Result<Json<Message>, AppError> {
    let message = CallService::propose(
        &state.db,
        user.id,
        counterpart,
        body.job_id,
        body.call_type,
        body.scheduled_at,
    )
    .await?;

    notify_invitation(&state, user.id, counterpart, message.job_id).await;

    if let Some(event) = proposed_event(&message) {
        if let Err(e) = broadcast_event(&state.registry, &state.redis, &event).await {
            tracing::warn!(error = %e, "change feed broadcast failed");
        }
    }

    Ok(Json(message))
}

/// POST /calls/{message_id}/respond
pub async fn respond_call(
    State(state): State<AppState>,
    user: Principal,
    Path(message_id): Path<Uuid>,
    Json(body): Json<RespondCallRequest>,
) -> Result<Json<RespondCallResponse>, AppError> {
    let action = match body.action {
        RespondAction::Accept => CallAction::Accept,
        RespondAction::Decline => CallAction::Decline,
        RespondAction::CounterPropose => CallAction::CounterPropose {
            scheduled_at: body.scheduled_at.ok_or_else(|| {
                AppError::BadRequest("counter proposals require scheduled_at".into())
            })?,
        },
    };

    let outcome = CallService::respond(&state.db, message_id, user.id, action).await?;

    if let Some(invitation) = outcome.message.call_invitation() {
        let event = ChatEvent::CallResponded {
            message_id: outcome.message.id,
            proposer_id: outcome.message.sender_id,
            recipient_id: outcome.message.recipient_id,
            job_id: outcome.message.job_id,
            call_type: invitation.call_type,
            status: invitation.status,
            should_open_call: outcome.should_open_call,
        };
        if let Err(e) = broadcast_event(&state.registry, &state.redis, &event).await {
            tracing::warn!(error = %e, "change feed broadcast failed");
        }
    }

    // A counter-proposal is itself a fresh invitation: notify the original
    // proposer and announce it on the feed.
    if let Some(counter) = &outcome.counter_invitation {
        notify_invitation(&state, counter.sender_id, counter.recipient_id, counter.job_id).await;

        if let Some(event) = proposed_event(counter) {
            if let Err(e) = broadcast_event(&state.registry, &state.redis, &event).await {
                tracing::warn!(error = %e, "change feed broadcast failed");
            }
        }
    }

    Ok(Json(RespondCallResponse {
        should_open_call: outcome.should_open_call,
        counter_invitation: outcome.counter_invitation,
        message: outcome.message,
    }))
}
