//! Change-feed events.
//!
//! Every mutation of the message set emits one event, delivered to the
//! thread scope and to both participants' inbox scopes. Events carry
//! identifiers only; consumers re-fetch the affected view. The single
//! exception is `call.responded`, which carries enough detail for the
//! original proposer's client to open the call UI without a reload.
//!
//! Payloads are flat:
//! ```json
//! {
//!     "type": "message.new",
//!     "timestamp": "2026-08-04T10:30:00Z",
//!     "message_id": "uuid",
//!     ...
//! }
//! ```

use crate::models::message::{CallType, InvitationStatus};
use crate::websocket::{pubsub, ConnectionRegistry, FeedScope};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChatEvent {
    /// New message persisted (plain, file-carrying, or call invitation).
    #[serde(rename = "message.new")]
    MessageNew {
        message_id: Uuid,
        sender_id: Uuid,
        recipient_id: Uuid,
        job_id: Option<Uuid>,
    },

    /// Message body edited by its sender.
    #[serde(rename = "message.edited")]
    MessageEdited {
        message_id: Uuid,
        sender_id: Uuid,
        recipient_id: Uuid,
        job_id: Option<Uuid>,
    },

    /// Bulk read-state change on one thread key.
    #[serde(rename = "thread.read_state")]
    ThreadReadState {
        reader_id: Uuid,
        counterpart_id: Uuid,
        job_id: Option<Uuid>,
        is_read: bool,
    },

    /// Whole conversation destroyed; viewers of it must navigate away.
    #[serde(rename = "conversation.deleted")]
    ConversationDeleted {
        user_a: Uuid,
        user_b: Uuid,
        job_id: Option<Uuid>,
    },

    /// A call invitation message was created (initial or counter-proposal).
    #[serde(rename = "call.proposed")]
    CallProposed {
        message_id: Uuid,
        proposer_id: Uuid,
        recipient_id: Uuid,
        job_id: Option<Uuid>,
        call_type: CallType,
    },

    /// A pending invitation was accepted or declined. `should_open_call`
    /// is true only for accepted instant calls; the proposer's client acts
    /// on it directly instead of re-fetching.
    #[serde(rename = "call.responded")]
    CallResponded {
        message_id: Uuid,
        proposer_id: Uuid,
        recipient_id: Uuid,
        job_id: Option<Uuid>,
        call_type: CallType,
        status: InvitationStatus,
        should_open_call: bool,
    },
}

impl ChatEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MessageNew { .. } => "message.new",
            Self::MessageEdited { .. } => "message.edited",
            Self::ThreadReadState { .. } => "thread.read_state",
            Self::ConversationDeleted { .. } => "conversation.deleted",
            Self::CallProposed { .. } => "call.proposed",
            Self::CallResponded { .. } => "call.responded",
        }
    }

    /// The two users whose views this event can change.
    pub fn participants(&self) -> (Uuid, Uuid) {
        match *self {
            Self::MessageNew {
                sender_id,
                recipient_id,
                ..
            }
            | Self::MessageEdited {
                sender_id,
                recipient_id,
                ..
            } => (sender_id, recipient_id),
            Self::ThreadReadState {
                reader_id,
                counterpart_id,
                ..
            } => (reader_id, counterpart_id),
            Self::ConversationDeleted { user_a, user_b, .. } => (user_a, user_b),
            Self::CallProposed {
                proposer_id,
                recipient_id,
                ..
            }
            | Self::CallResponded {
                proposer_id,
                recipient_id,
                ..
            } => (proposer_id, recipient_id),
        }
    }

    pub fn job_id(&self) -> Option<Uuid> {
        match *self {
            Self::MessageNew { job_id, .. }
            | Self::MessageEdited { job_id, .. }
            | Self::ThreadReadState { job_id, .. }
            | Self::ConversationDeleted { job_id, .. }
            | Self::CallProposed { job_id, .. }
            | Self::CallResponded { job_id, .. } => job_id,
        }
    }

    /// Scopes this event fans out to: the thread itself plus both inboxes.
    pub fn scopes(&self) -> [FeedScope; 3] {
        let (a, b) = self.participants();
        [
            FeedScope::thread(self.job_id(), a, b),
            FeedScope::inbox(a),
            FeedScope::inbox(b),
        ]
    }

    /// Flat JSON payload: `type` + `timestamp` + the variant's own fields.
    /// This is the only place event serialization happens.
    pub fn to_payload_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        let mut payload = serde_json::json!({
            "type": self.event_type(),
            "timestamp": Utc::now().to_rfc3339(),
        });

        let event_data = serde_json::to_value(self)?;
        if let serde_json::Value::Object(map) = event_data {
            for (_, fields) in map {
                if let serde_json::Value::Object(inner) = fields {
                    for (key, value) in inner {
                        payload[key] = value;
                    }
                }
            }
        }

        Ok(payload)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error("failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to publish to redis: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Broadcast an event through the in-process registry and Redis pub/sub.
/// The canonical fanout path; mutation handlers call this and nothing else.
pub async fn broadcast_event(
    registry: &ConnectionRegistry,
    redis: &redis::Client,
    event: &ChatEvent,
) -> Result<(), BroadcastError> {
    let payload = event.to_payload_value()?.to_string();

    for scope in event.scopes() {
        registry
            .broadcast(scope, axum::extract::ws::Message::Text(payload.clone()))
            .await;
        pubsub::publish(redis, scope, &payload).await?;
    }

    Ok(())
}
