use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inbox filter. `Archived` has no backing attribute yet and behaves like
/// `All`; kept in the API surface so clients can already send it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationFilter {
    #[default]
    All,
    Unread,
    Archived,
}

/// Counterpart display identity, resolved from the user profile projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterpartProfile {
    pub id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Derived conversation row. Never persisted; recomputed on every load and
/// identified solely by its `(job_id, counterpart_id)` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub job_id: Option<Uuid>,
    pub counterpart_id: Uuid,
    pub counterpart: Option<CounterpartProfile>,
    pub last_message_body: String,
    pub last_message_at: DateTime<Utc>,
    pub unread_count: i64,
}
