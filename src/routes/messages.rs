use axum::{
    extract::{Path, Query, State},
    Json,
};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::guards::Principal;
use crate::models::message::{Attachment, FileAttachment, Message, MAX_FILE_ATTACHMENTS};
use crate::services::message_service::{MessageService, NewMessage};
use crate::services::notification_service::{
    NewNotification, NotificationKind, NotificationService,
};
use crate::state::AppState;
use crate::websocket::events::{broadcast_event, ChatEvent};

#[derive(Deserialize)]
pub struct FileUpload {
    pub name: String,
    pub mime_type: String,
    /// Base64-encoded file body.
    pub data: String,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub job_id: Option<Uuid>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub files: Vec<FileUpload>,
    pub reply_to: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct ThreadQuery {
    pub job_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct BulkUpdateResponse {
    pub updated: u64,
}

#[derive(Serialize)]
pub struct DeleteConversationResponse {
    pub deleted: u64,
}

fn notification_preview(message: &Message) -> String {
    if message.body.is_empty() {
        return "Sent an attachment".to_string();
    }
    let mut preview: String = message.body.chars().take(120).collect();
    if preview.len() < message.body.len() {
        preview.push('…');
    }
    preview
}

/// POST /threads/{counterpart}/messages
///
/// File payloads are stored durably first and the attachment entries
/// rewritten with the returned URLs; any storage failure aborts the send.
/// The recipient notification is best-effort and never rolls back the
/// persisted message.
pub async fn send_message(
    State(state): State<AppState>,
    user: Principal,
    Path(counterpart): Path<Uuid>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<Message>, AppError> {
    if body.body.trim().is_empty() && body.files.is_empty() {
        return Err(AppError::EmptyMessage);
    }
    if body.files.len() > MAX_FILE_ATTACHMENTS {
        return Err(AppError::TooManyAttachments {
            count: body.files.len(),
            max: MAX_FILE_ATTACHMENTS,
        });
    }

    let mut attachments: Vec<Attachment> = Vec::with_capacity(body.files.len());
    if !body.files.is_empty() {
        let storage = state
            .storage
            .as_ref()
            .ok_or_else(|| AppError::Storage("attachment storage not configured".into()))?;

        for file in &body.files {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(&file.data)
                .map_err(|_| AppError::BadRequest(format!("file {} is not valid base64", file.name)))?;
            let size_bytes = bytes.len() as i64;

            let key = format!("attachments/{}/{}", Uuid::new_v4(), file.name);
            let url = storage.store(&key, &file.mime_type, bytes).await?;

            attachments.push(Attachment::File(FileAttachment {
                name: file.name.clone(),
                url,
                mime_type: file.mime_type.clone(),
                size_bytes,
            }));
        }
    }

    let message = MessageService::send(
        &state.db,
        NewMessage {
            sender_id: user.id,
            recipient_id: counterpart,
            job_id: body.job_id,
            body: body.body,
            attachments,
            reply_to: body.reply_to,
        },
    )
    .await?;

    NotificationService::create_best_effort(
        &state.db,
        NewNotification {
            user_id: counterpart,
            kind: NotificationKind::NewMessage,
            title: "New message".to_string(),
            message: notification_preview(&message),
            payload: NewNotification::payload_for(message.job_id, user.id),
        },
    )
    .await;

    let event = ChatEvent::MessageNew {
        message_id: message.id,
        sender_id: message.sender_id,
        recipient_id: message.recipient_id,
        job_id: message.job_id,
    };
    if let Err(e) = broadcast_event(&state.registry, &state.redis, &event).await {
        tracing::warn!(error = %e, "change feed broadcast failed");
    }

    Ok(Json(message))
}

/// GET /threads/{counterpart}/messages?job_id=
pub async fn get_thread(
    State(state): State<AppState>,
    user: Principal,
    Path(counterpart): Path<Uuid>,
    Query(query): Query<ThreadQuery>,
) -> Result<Json<Vec<Message>>, AppError> {
    let messages =
        MessageService::fetch_thread(&state.db, user.id, counterpart, query.job_id).await?;
    Ok(Json(messages))
}

#[derive(Deserialize)]
pub struct UpdateMessageRequest {
    pub body: String,
}

/// PUT /messages/{id}
pub async fn update_message(
    State(state): State<AppState>,
    user: Principal,
    Path(message_id): Path<Uuid>,
    Json(body): Json<UpdateMessageRequest>,
) -> Result<Json<Message>, AppError> {
    let message = MessageService::edit(&state.db, message_id, user.id, body.body).await?;

    let event = ChatEvent::MessageEdited {
        message_id: message.id,
        sender_id: message.sender_id,
        recipient_id: message.recipient_id,
        job_id: message.job_id,
    };
    if let Err(e) = broadcast_event(&state.registry, &state.redis, &event).await {
        tracing::warn!(error = %e, "change feed broadcast failed");
    }

    Ok(Json(message))
}

/// POST /threads/{counterpart}/read?job_id=
pub async fn mark_thread_read(
    State(state): State<AppState>,
    user: Principal,
    Path(counterpart): Path<Uuid>,
    Query(query): Query<ThreadQuery>,
) -> Result<Json<BulkUpdateResponse>, AppError> {
    let updated = MessageService::mark_read(&state.db, user.id, counterpart, query.job_id).await?;

    if updated > 0 {
        let event = ChatEvent::ThreadReadState {
            reader_id: user.id,
            counterpart_id: counterpart,
            job_id: query.job_id,
            is_read: true,
        };
        if let Err(e) = broadcast_event(&state.registry, &state.redis, &event).await {
            tracing::warn!(error = %e, "change feed broadcast failed");
        }
    }

    Ok(Json(BulkUpdateResponse { updated }))
}

/// POST /threads/{counterpart}/unread?job_id=
pub async fn mark_thread_unread(
    State(state): State<AppState>,
    user: Principal,
    Path(counterpart): Path<Uuid>,
    Query(query): Query<ThreadQuery>,
) -> Result<Json<BulkUpdateResponse>, AppError> {
    let updated =
        MessageService::mark_unread(&state.db, user.id, counterpart, query.job_id).await?;

    if updated > 0 {
        let event = ChatEvent::ThreadReadState {
            reader_id: user.id,
            counterpart_id: counterpart,
            job_id: query.job_id,
            is_read: false,
        };
        if let Err(e) = broadcast_event(&state.registry, &state.redis, &event).await {
            tracing::warn!(error = %e, "change feed broadcast failed");
        }
    }

    Ok(Json(BulkUpdateResponse { updated }))
}

/// DELETE /threads/{counterpart}?job_id=
///
/// Atomic-or-nothing: one statement removes both directions of the pair
/// within the job context. Subscribers displaying the thread receive
/// `conversation.deleted` and must navigate away.
pub async fn delete_thread(
    State(state): State<AppState>,
    user: Principal,
    Path(counterpart): Path<Uuid>,
    Query(query): Query<ThreadQuery>,
) -> Result<Json<DeleteConversationResponse>, AppError> {
    let deleted =
        MessageService::delete_conversation(&state.db, query.job_id, user.id, counterpart).await?;

    let event = ChatEvent::ConversationDeleted {
        user_a: user.id,
        user_b: counterpart,
        job_id: query.job_id,
    };
    if let Err(e) = broadcast_event(&state.registry, &state.redis, &event).await {
        tracing::warn!(error = %e, "change feed broadcast failed");
    }

    Ok(Json(DeleteConversationResponse { deleted }))
}
