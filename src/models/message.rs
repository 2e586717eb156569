use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::error::AppError;

/// Hard cap on `File` attachments per message, enforced at composition time.
pub const MAX_FILE_ATTACHMENTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    Instant,
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    CounterProposed,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::CounterProposed => "counter_proposed",
        }
    }

    /// Terminal statuses accept no further response.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub name: String,
    pub url: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallInvitation {
    pub call_type: CallType,
    pub status: InvitationStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub is_counter_proposal: bool,
}

/// Message attachment payload. Persisted as a JSONB array; the `kind` tag
/// forces consumers to handle both shapes exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Attachment {
    File(FileAttachment),
    CallInvitation(CallInvitation),
}

impl Attachment {
    pub fn as_call_invitation(&self) -> Option<&CallInvitation> {
        match self {
            Self::CallInvitation(inv) => Some(inv),
            Self::File(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub job_id: Option<Uuid>,
    pub body: String,
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub is_read: bool,
    pub reply_to: Option<Uuid>,
}

impl Message {
    pub fn from_row(row: &PgRow) -> Result<Self, AppError> {
        let attachments_json: serde_json::Value = row.get("attachments");
        let attachments: Vec<Attachment> = serde_json::from_value(attachments_json)
            .map_err(|e| AppError::Config(format!("corrupt attachments column: {e}")))?;
        Ok(Self {
            id: row.get("id"),
            sender_id: row.get("sender_id"),
            recipient_id: row.get("recipient_id"),
            job_id: row.get("job_id"),
            body: row.get("body"),
            attachments,
            created_at: row.get("created_at"),
            edited_at: row.get("edited_at"),
            is_read: row.get("is_read"),
            reply_to: row.get("reply_to"),
        })
    }

    /// The other party of this message from `viewer`'s perspective.
    pub fn counterpart(&self, viewer: Uuid) -> Uuid {
        if self.sender_id == viewer {
            self.recipient_id
        } else {
            self.sender_id
        }
    }

    pub fn call_invitation(&self) -> Option<&CallInvitation> {
        self.attachments.iter().find_map(|a| a.as_call_invitation())
    }
}

/// Composition rules: body and attachments cannot both be empty, at most
/// `MAX_FILE_ATTACHMENTS` files, at most one call invitation.
pub fn validate_composition(body: &str, attachments: &[Attachment]) -> Result<(), AppError> {
    if body.trim().is_empty() && attachments.is_empty() {
        return Err(AppError::EmptyMessage);
    }

    let file_count = attachments
        .iter()
        .filter(|a| matches!(a, Attachment::File(_)))
        .count();
    if file_count > MAX_FILE_ATTACHMENTS {
        return Err(AppError::TooManyAttachments {
            count: file_count,
            max: MAX_FILE_ATTACHMENTS,
        });
    }

    let invitation_count = attachments.len() - file_count;
    if invitation_count > 1 {
        return Err(AppError::BadRequest(
            "a message carries at most one call invitation".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> Attachment {
        Attachment::File(FileAttachment {
            name: name.into(),
            url: format!("https://cdn.example.com/{name}"),
            mime_type: "application/pdf".into(),
            size_bytes: 1024,
        })
    }

    #[test]
    fn attachment_union_is_tagged() {
        let json = serde_json::to_value(file("cv.pdf")).unwrap();
        assert_eq!(json["kind"], "file");
        assert_eq!(json["name"], "cv.pdf");

        let inv = Attachment::CallInvitation(CallInvitation {
            call_type: CallType::Instant,
            status: InvitationStatus::Pending,
            scheduled_at: None,
            is_counter_proposal: false,
        });
        let json = serde_json::to_value(&inv).unwrap();
        assert_eq!(json["kind"], "call_invitation");
        assert_eq!(json["call_type"], "instant");
        assert_eq!(json["status"], "pending");

        let back: Attachment = serde_json::from_value(json).unwrap();
        assert_eq!(back, inv);
    }

    #[test]
    fn counter_proposed_status_tag() {
        let json = serde_json::to_value(InvitationStatus::CounterProposed).unwrap();
        assert_eq!(json, "counter_proposed");
        assert!(InvitationStatus::CounterProposed.is_terminal());
        assert!(!InvitationStatus::Pending.is_terminal());
    }

    #[test]
    fn empty_body_and_attachments_rejected() {
        assert!(matches!(
            validate_composition("   ", &[]),
            Err(AppError::EmptyMessage)
        ));
        assert!(validate_composition("hi", &[]).is_ok());
        assert!(validate_composition("", &[file("a")]).is_ok());
    }

    #[test]
    fn file_attachment_cap_enforced() {
        let five: Vec<_> = (0..5).map(|i| file(&format!("f{i}"))).collect();
        assert!(validate_composition("", &five).is_ok());

        let six: Vec<_> = (0..6).map(|i| file(&format!("f{i}"))).collect();
        match validate_composition("", &six) {
            Err(AppError::TooManyAttachments { count, max }) => {
                assert_eq!(count, 6);
                assert_eq!(max, 5);
            }
            other => panic!("expected TooManyAttachments, got {other:?}"),
        }
    }

    #[test]
    fn at_most_one_call_invitation() {
        let inv = Attachment::CallInvitation(CallInvitation {
            call_type: CallType::Scheduled,
            status: InvitationStatus::Pending,
            scheduled_at: Some(Utc::now()),
            is_counter_proposal: false,
        });
        assert!(validate_composition("", std::slice::from_ref(&inv)).is_ok());
        assert!(validate_composition("", &[inv.clone(), inv]).is_err());
    }
}
