use chrono::{DateTime, Duration, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::message::{validate_composition, Attachment, Message};

/// Senders may rewrite a message body this long after creation.
pub const EDIT_WINDOW_MINUTES: i64 = 5;

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub job_id: Option<Uuid>,
    pub body: String,
    pub attachments: Vec<Attachment>,
    pub reply_to: Option<Uuid>,
}

/// Edit permission: sender-only, inside the window. `created_at` never
/// moves, so the check is pure given a clock reading.
pub fn check_edit_allowed(
    message: &Message,
    actor: Uuid,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if message.sender_id != actor {
        return Err(AppError::Forbidden);
    }
    if now.signed_duration_since(message.created_at) >= Duration::minutes(EDIT_WINDOW_MINUTES) {
        return Err(AppError::EditWindowExpired {
            max_edit_minutes: EDIT_WINDOW_MINUTES,
        });
    }
    Ok(())
}

pub struct MessageService;

impl MessageService {
    /// Persist a new message. Attachment URLs must already be durable
    /// (file payloads are uploaded before this is called); the notification
    /// side effect lives with the caller so its failure cannot roll back
    /// the insert.
    pub async fn send(db: &Pool<Postgres>, new: NewMessage) -> Result<Message, AppError> {
        validate_composition(&new.body, &new.attachments)?;

        if new.sender_id == new.recipient_id {
            return Err(AppError::BadRequest("cannot message yourself".into()));
        }

        if let Some(reply_to) = new.reply_to {
            let parent = Self::fetch_message(db, reply_to).await.map_err(|e| match e {
                AppError::NotFound => AppError::BadRequest("reply_to message not found".into()),
                other => other,
            })?;
            let same_pair = (parent.sender_id == new.sender_id
                && parent.recipient_id == new.recipient_id)
                || (parent.sender_id == new.recipient_id
                    && parent.recipient_id == new.sender_id);
            if !same_pair || parent.job_id != new.job_id {
                return Err(AppError::BadRequest(
                    "reply_to must reference the same conversation".into(),
                ));
            }
        }

        let message = Message {
            id: Uuid::new_v4(),
            sender_id: new.sender_id,
            recipient_id: new.recipient_id,
            job_id: new.job_id,
            body: new.body,
            attachments: new.attachments,
            created_at: Utc::now(),
            edited_at: None,
            is_read: false,
            reply_to: new.reply_to,
        };

        let attachments_json = serde_json::to_value(&message.attachments)
            .map_err(|e| AppError::Config(format!("serialize attachments: {e}")))?;

        sqlx::query(
            "INSERT INTO messages (id, sender_id, recipient_id, job_id, body, attachments, created_at, is_read, reply_to) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, $8)",
        )
        .bind(message.id)
        .bind(message.sender_id)
        .bind(message.recipient_id)
        .bind(message.job_id)
        .bind(&message.body)
        .bind(&attachments_json)
        .bind(message.created_at)
        .bind(message.reply_to)
        .execute(db)
        .await?;

        Ok(message)
    }

    /// Overwrite the body (no audit trail of prior bodies). Concurrent
    /// edits from two sessions of the same sender race; the later write
    /// wins.
    pub async fn edit(
        db: &Pool<Postgres>,
        message_id: Uuid,
        actor: Uuid,
        new_body: String,
    ) -> Result<Message, AppError> {
        let mut message = Self::fetch_message(db, message_id).await?;
        let now = Utc::now();
        check_edit_allowed(&message, actor, now)?;
        validate_composition(&new_body, &message.attachments)?;

        sqlx::query("UPDATE messages SET body = $1, edited_at = $2 WHERE id = $3")
            .bind(&new_body)
            .bind(now)
            .bind(message_id)
            .execute(db)
            .await?;

        message.body = new_body;
        message.edited_at = Some(now);
        Ok(message)
    }

    /// Bulk-mark every unread inbound message of one thread key as read.
    /// The no-job case matches NULL explicitly, never as a wildcard.
    /// Idempotent: a second call matches zero rows.
    pub async fn mark_read(
        db: &Pool<Postgres>,
        viewer: Uuid,
        counterpart: Uuid,
        job_id: Option<Uuid>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = TRUE \
             WHERE recipient_id = $1 AND sender_id = $2 \
               AND job_id IS NOT DISTINCT FROM $3 AND is_read = FALSE",
        )
        .bind(viewer)
        .bind(counterpart)
        .bind(job_id)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Inverse of `mark_read`, used when the viewer explicitly "unreads"
    /// a thread.
    pub async fn mark_unread(
        db: &Pool<Postgres>,
        viewer: Uuid,
        counterpart: Uuid,
        job_id: Option<Uuid>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = FALSE \
             WHERE recipient_id = $1 AND sender_id = $2 \
               AND job_id IS NOT DISTINCT FROM $3 AND is_read = TRUE",
        )
        .bind(viewer)
        .bind(counterpart)
        .bind(job_id)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Irreversibly destroy a whole conversation, both directions of the
    /// pair within one job context. A single statement, so it is
    /// atomic-or-nothing; other job contexts of the same pair are untouched.
    pub async fn delete_conversation(
        db: &Pool<Postgres>,
        job_id: Option<Uuid>,
        user_a: Uuid,
        user_b: Uuid,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM messages \
             WHERE job_id IS NOT DISTINCT FROM $1 \
               AND ((sender_id = $2 AND recipient_id = $3) \
                 OR (sender_id = $3 AND recipient_id = $2))",
        )
        .bind(job_id)
        .bind(user_a)
        .bind(user_b)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    /// All messages of one thread key, oldest first.
    pub async fn fetch_thread(
        db: &Pool<Postgres>,
        viewer: Uuid,
        counterpart: Uuid,
        job_id: Option<Uuid>,
    ) -> Result<Vec<Message>, AppError> {
        let rows = sqlx::query(
            "SELECT id, sender_id, recipient_id, job_id, body, attachments, \
                    created_at, edited_at, is_read, reply_to \
             FROM messages \
             WHERE job_id IS NOT DISTINCT FROM $3 \
               AND ((sender_id = $1 AND recipient_id = $2) \
                 OR (sender_id = $2 AND recipient_id = $1)) \
             ORDER BY created_at ASC",
        )
        .bind(viewer)
        .bind(counterpart)
        .bind(job_id)
        .fetch_all(db)
        .await?;

        rows.iter().map(Message::from_row).collect()
    }

    /// Every message touching `viewer`, newest first. This ordering is what
    /// the aggregator's preview selection relies on.
    pub async fn fetch_for_viewer(
        db: &Pool<Postgres>,
        viewer: Uuid,
    ) -> Result<Vec<Message>, AppError> {
        let rows = sqlx::query(
            "SELECT id, sender_id, recipient_id, job_id, body, attachments, \
                    created_at, edited_at, is_read, reply_to \
             FROM messages \
             WHERE sender_id = $1 OR recipient_id = $1 \
             ORDER BY created_at DESC",
        )
        .bind(viewer)
        .fetch_all(db)
        .await?;

        rows.iter().map(Message::from_row).collect()
    }

    pub async fn fetch_message(db: &Pool<Postgres>, id: Uuid) -> Result<Message, AppError> {
        let row = sqlx::query(
            "SELECT id, sender_id, recipient_id, job_id, body, attachments, \
                    created_at, edited_at, is_read, reply_to \
             FROM messages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)?;

        Message::from_row(&row)
    }
}
