use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::conversation::CounterpartProfile;
use crate::services::presence_service::UserStatus;

/// Presence-relevant fields of a profile row.
#[derive(Debug, Clone)]
pub struct PresenceFields {
    pub last_seen: Option<DateTime<Utc>>,
    pub status: UserStatus,
    pub show_status: bool,
}

pub struct ProfileService;

impl ProfileService {
    /// Batch lookup of display identities, used by the conversation
    /// aggregator. Unknown ids are simply absent from the map.
    pub async fn display_profiles(
        db: &Pool<Postgres>,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, CounterpartProfile>, AppError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query("SELECT id, display_name, avatar_url FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let id: Uuid = r.get("id");
                (
                    id,
                    CounterpartProfile {
                        id,
                        display_name: r.get("display_name"),
                        avatar_url: r.get("avatar_url"),
                    },
                )
            })
            .collect())
    }

    pub async fn display_name(db: &Pool<Postgres>, id: Uuid) -> Result<String, AppError> {
        let name: Option<String> = sqlx::query_scalar("SELECT display_name FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await?;
        name.ok_or(AppError::NotFound)
    }

    pub async fn presence_fields(db: &Pool<Postgres>, id: Uuid) -> Result<PresenceFields, AppError> {
        let row = sqlx::query("SELECT last_seen, status, show_status FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await?
            .ok_or(AppError::NotFound)?;

        let status: String = row.get("status");
        Ok(PresenceFields {
            last_seen: row.get("last_seen"),
            status: UserStatus::from_str(&status),
            show_status: row.get("show_status"),
        })
    }
}
