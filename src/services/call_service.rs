use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::message::{
    Attachment, CallInvitation, CallType, InvitationStatus, Message,
};
use crate::services::message_service::{MessageService, NewMessage};

/// What the responder asked for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CallAction {
    Accept,
    Decline,
    CounterPropose { scheduled_at: DateTime<Utc> },
}

#[derive(Debug)]
pub struct RespondOutcome {
    /// The original invitation message with its updated status.
    pub message: Message,
    /// True only when an instant call was accepted; the caller transitions
    /// straight into the active-call UI. Scheduled calls never auto-open.
    pub should_open_call: bool,
    /// The fresh Pending invitation created by a counter-proposal.
    pub counter_invitation: Option<Message>,
}

/// Human-readable summary carried as the invitation message body.
pub fn invitation_body(call_type: CallType, scheduled_at: Option<DateTime<Utc>>) -> String {
    match (call_type, scheduled_at) {
        (CallType::Scheduled, Some(at)) => format!(
            "📞 Video call invitation for {} at {}",
            at.format("%B %-d, %Y"),
            at.format("%-I:%M %p")
        ),
        _ => "📞 Instant video call request".to_string(),
    }
}

/// Accepted instant calls transition the accepting client straight into
/// the active-call UI; scheduled calls never auto-open.
pub fn opens_call_on_accept(call_type: CallType) -> bool {
    call_type == CallType::Instant
}

/// Responding to anything but a Pending invitation is a logic error, not a
/// recoverable condition.
pub fn ensure_pending(invitation: &CallInvitation) -> Result<(), AppError> {
    if invitation.status.is_terminal() {
        return Err(AppError::InvalidTransition {
            status: invitation.status.as_str().to_string(),
        });
    }
    Ok(())
}

/// Rewrite the call invitation entry of an attachment list to `status`.
pub fn with_invitation_status(
    attachments: &[Attachment],
    status: InvitationStatus,
) -> Vec<Attachment> {
    attachments
        .iter()
        .map(|a| match a {
            Attachment::CallInvitation(inv) => Attachment::CallInvitation(CallInvitation {
                status,
                ..inv.clone()
            }),
            file => file.clone(),
        })
        .collect()
}

pub struct CallService;

impl CallService {
    /// Create a Pending invitation message from `proposer` to `recipient`.
    pub async fn propose(
        db: &Pool<Postgres>,
        proposer: Uuid,
        recipient: Uuid,
        job_id: Option<Uuid>,
        call_type: CallType,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Message, AppError> {
        match call_type {
            CallType::Scheduled if scheduled_at.is_none() => {
                return Err(AppError::BadRequest(
                    "scheduled calls require scheduled_at".into(),
                ));
            }
            CallType::Instant if scheduled_at.is_some() => {
                return Err(AppError::BadRequest(
                    "instant calls cannot carry scheduled_at".into(),
                ));
            }
            _ => {}
        }

        let invitation = CallInvitation {
            call_type,
            status: InvitationStatus::Pending,
            scheduled_at,
            is_counter_proposal: false,
        };

        MessageService::send(
            db,
            NewMessage {
                sender_id: proposer,
                recipient_id: recipient,
                job_id,
                body: invitation_body(call_type, scheduled_at),
                attachments: vec![Attachment::CallInvitation(invitation)],
                reply_to: None,
            },
        )
        .await
    }

    /// Drive the negotiation machine on one invitation message.
    ///
    /// Accept and decline mutate the invitation in place. A counter-proposal
    /// terminates the original as CounterProposed and forks a brand-new
    /// Pending invitation back to the original proposer, atomically.
    pub async fn respond(
        db: &Pool<Postgres>,
        invitation_message_id: Uuid,
        actor: Uuid,
        action: CallAction,
    ) -> Result<RespondOutcome, AppError> {
        let mut message = MessageService::fetch_message(db, invitation_message_id).await?;
        let invitation = message
            .call_invitation()
            .cloned()
            .ok_or_else(|| AppError::BadRequest("message carries no call invitation".into()))?;

        // Only the invited party answers.
        if message.recipient_id != actor {
            return Err(AppError::Forbidden);
        }

        ensure_pending(&invitation)?;

        match action {
            CallAction::Accept => {
                let updated = Self::store_status(db, &message, InvitationStatus::Accepted).await?;
                message.attachments = updated;
                Ok(RespondOutcome {
                    should_open_call: opens_call_on_accept(invitation.call_type),
                    message,
                    counter_invitation: None,
                })
            }
            CallAction::Decline => {
                let updated = Self::store_status(db, &message, InvitationStatus::Declined).await?;
                message.attachments = updated;
                Ok(RespondOutcome {
                    message,
                    should_open_call: false,
                    counter_invitation: None,
                })
            }
            CallAction::CounterPropose { scheduled_at } => {
                let updated = with_invitation_status(
                    &message.attachments,
                    InvitationStatus::CounterProposed,
                );
                let updated_json = serde_json::to_value(&updated)
                    .map_err(|e| AppError::Config(format!("serialize attachments: {e}")))?;

                let counter = Message {
                    id: Uuid::new_v4(),
                    sender_id: actor,
                    recipient_id: message.sender_id,
                    job_id: message.job_id,
                    body: invitation_body(CallType::Scheduled, Some(scheduled_at)),
                    attachments: vec![Attachment::CallInvitation(CallInvitation {
                        call_type: CallType::Scheduled,
                        status: InvitationStatus::Pending,
                        scheduled_at: Some(scheduled_at),
                        is_counter_proposal: true,
                    })],
                    created_at: Utc::now(),
                    edited_at: None,
                    is_read: false,
                    reply_to: None,
                };
                let counter_json = serde_json::to_value(&counter.attachments)
                    .map_err(|e| AppError::Config(format!("serialize attachments: {e}")))?;

                // Terminating the original and forking the new invitation
                // must land together.
                let mut tx = db.begin().await?;
                sqlx::query("UPDATE messages SET attachments = $1 WHERE id = $2")
                    .bind(&updated_json)
                    .bind(message.id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(
                    "INSERT INTO messages (id, sender_id, recipient_id, job_id, body, attachments, created_at, is_read, reply_to) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, NULL)",
                )
                .bind(counter.id)
                .bind(counter.sender_id)
                .bind(counter.recipient_id)
                .bind(counter.job_id)
                .bind(&counter.body)
                .bind(&counter_json)
                .bind(counter.created_at)
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;

                message.attachments = updated;
                Ok(RespondOutcome {
                    message,
                    should_open_call: false,
                    counter_invitation: Some(counter),
                })
            }
        }
    }

    async fn store_status(
        db: &Pool<Postgres>,
        message: &Message,
        status: InvitationStatus,
    ) -> Result<Vec<Attachment>, AppError> {
        let updated = with_invitation_status(&message.attachments, status);
        let json = serde_json::to_value(&updated)
            .map_err(|e| AppError::Config(format!("serialize attachments: {e}")))?;
        sqlx::query("UPDATE messages SET attachments = $1 WHERE id = $2")
            .bind(&json)
            .bind(message.id)
            .execute(db)
            .await?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn pending(call_type: CallType) -> CallInvitation {
        CallInvitation {
            call_type,
            status: InvitationStatus::Pending,
            scheduled_at: None,
            is_counter_proposal: false,
        }
    }

    #[test]
    fn responding_to_terminal_invitation_is_invalid() {
        for status in [
            InvitationStatus::Accepted,
            InvitationStatus::Declined,
            InvitationStatus::CounterProposed,
        ] {
            let inv = CallInvitation {
                status,
                ..pending(CallType::Instant)
            };
            match ensure_pending(&inv) {
                Err(AppError::InvalidTransition { status: s }) => {
                    assert_eq!(s, status.as_str())
                }
                other => panic!("expected InvalidTransition, got {other:?}"),
            }
        }
        assert!(ensure_pending(&pending(CallType::Instant)).is_ok());
    }

    #[test]
    fn status_rewrite_touches_only_the_invitation() {
        let attachments = vec![
            Attachment::File(crate::models::message::FileAttachment {
                name: "deck.pdf".into(),
                url: "https://cdn.example.com/deck.pdf".into(),
                mime_type: "application/pdf".into(),
                size_bytes: 9000,
            }),
            Attachment::CallInvitation(pending(CallType::Instant)),
        ];

        let updated = with_invitation_status(&attachments, InvitationStatus::Accepted);
        assert_eq!(updated[0], attachments[0]);
        match &updated[1] {
            Attachment::CallInvitation(inv) => {
                assert_eq!(inv.status, InvitationStatus::Accepted);
                assert_eq!(inv.call_type, CallType::Instant);
            }
            other => panic!("expected invitation, got {other:?}"),
        }
    }

    #[test]
    fn invitation_bodies() {
        assert_eq!(
            invitation_body(CallType::Instant, None),
            "📞 Instant video call request"
        );

        let at = Utc.with_ymd_and_hms(2026, 6, 3, 14, 30, 0).unwrap();
        assert_eq!(
            invitation_body(CallType::Scheduled, Some(at)),
            "📞 Video call invitation for June 3, 2026 at 2:30 PM"
        );
    }
}
