use serde::{Deserialize, Serialize};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewMessage,
    JobInvitation,
    VideoCallInvitation,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewMessage => "new_message",
            Self::JobInvitation => "job_invitation",
            Self::VideoCallInvitation => "video_call_invitation",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub payload: serde_json::Value,
}

impl NewNotification {
    /// Standard payload: the job context and the originating user.
    pub fn payload_for(job_id: Option<Uuid>, from_user: Uuid) -> serde_json::Value {
        serde_json::json!({ "job_id": job_id, "from_user": from_user })
    }
}

pub struct NotificationService;

impl NotificationService {
    pub async fn create(db: &Pool<Postgres>, n: NewNotification) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO notifications (id, user_id, kind, title, message, payload) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(n.user_id)
        .bind(n.kind.as_str())
        .bind(&n.title)
        .bind(&n.message)
        .bind(&n.payload)
        .execute(db)
        .await?;
        Ok(id)
    }

    /// Fire-and-forget variant for secondary writes: the primary action has
    /// already succeeded, so a failed notification is logged and dropped.
    pub async fn create_best_effort(db: &Pool<Postgres>, n: NewNotification) {
        let kind = n.kind.as_str();
        if let Err(e) = Self::create(db, n).await {
            tracing::warn!(error = %e, kind, "notification write failed; continuing");
        }
    }
}
