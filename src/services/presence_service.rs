use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::AppError;
use crate::services::profile_service::ProfileService;

/// Self-reported availability preference, written by the heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Online,
    Away,
}

impl UserStatus {
    pub fn from_str(value: &str) -> Self {
        match value {
            "away" => UserStatus::Away,
            _ => UserStatus::Online,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Away => "away",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorColor {
    Green,
    Yellow,
}

/// Dot shown next to a recently-active user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusIndicator {
    pub color: IndicatorColor,
    pub label: &'static str,
}

/// Display-ready presence: either an indicator (recent activity) or a
/// "last seen" line, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceDisplay {
    pub indicator: Option<StatusIndicator>,
    pub last_seen_text: Option<String>,
}

impl PresenceDisplay {
    fn hidden() -> Self {
        Self {
            indicator: None,
            last_seen_text: Some("Active recently".to_string()),
        }
    }

    fn text(text: String) -> Self {
        Self {
            indicator: None,
            last_seen_text: Some(text),
        }
    }
}

fn pluralize(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("Last seen 1 {unit} ago")
    } else {
        format!("Last seen {n} {unit}s ago")
    }
}

/// Convert heartbeat state into a display indicator.
///
/// `show_status = false` is a hard privacy override: the caller learns
/// nothing beyond "Active recently" no matter how fresh the heartbeat is.
pub fn compute_status(
    show_status: bool,
    last_seen: Option<DateTime<Utc>>,
    status: UserStatus,
    now: DateTime<Utc>,
) -> PresenceDisplay {
    if !show_status {
        return PresenceDisplay::hidden();
    }
    let Some(last_seen) = last_seen else {
        return PresenceDisplay::hidden();
    };

    let age = now.signed_duration_since(last_seen);
    let minutes = age.num_minutes();

    if minutes < 2 {
        let (color, label) = match status {
            UserStatus::Away => (IndicatorColor::Yellow, "Away"),
            UserStatus::Online => (IndicatorColor::Green, "Online"),
        };
        return PresenceDisplay {
            indicator: Some(StatusIndicator { color, label }),
            last_seen_text: None,
        };
    }
    if minutes < 60 {
        return PresenceDisplay::text(pluralize(minutes, "minute"));
    }
    let hours = age.num_hours();
    if hours < 24 {
        return PresenceDisplay::text(pluralize(hours, "hour"));
    }
    if hours < 48 {
        return PresenceDisplay::text("Last seen yesterday".to_string());
    }
    PresenceDisplay::text(format!("Last seen on {}", last_seen.format("%B %-d, %Y")))
}

pub struct PresenceService;

impl PresenceService {
    /// Heartbeat writer: stamp `last_seen = now` and the self-reported
    /// status. Call sites swallow failures; a missed beat must never
    /// interrupt the session.
    pub async fn heartbeat(
        db: &Pool<Postgres>,
        user_id: Uuid,
        status: UserStatus,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_seen = NOW(), status = $2 WHERE id = $1")
            .bind(user_id)
            .bind(status.as_str())
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn presence_for(
        db: &Pool<Postgres>,
        user_id: Uuid,
    ) -> Result<PresenceDisplay, AppError> {
        let fields = ProfileService::presence_fields(db, user_id).await?;
        Ok(compute_status(
            fields.show_status,
            fields.last_seen,
            fields.status,
            Utc::now(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn privacy_override_beats_everything() {
        for last_seen in [None, Some(now()), Some(now() - Duration::days(30))] {
            for status in [UserStatus::Online, UserStatus::Away] {
                let display = compute_status(false, last_seen, status, now());
                assert_eq!(display.indicator, None);
                assert_eq!(display.last_seen_text.as_deref(), Some("Active recently"));
            }
        }
    }

    #[test]
    fn missing_heartbeat_reads_as_active_recently() {
        let display = compute_status(true, None, UserStatus::Online, now());
        assert_eq!(display.indicator, None);
        assert_eq!(display.last_seen_text.as_deref(), Some("Active recently"));
    }

    #[test]
    fn fresh_heartbeat_shows_indicator() {
        let seen = now() - Duration::seconds(90);

        let display = compute_status(true, Some(seen), UserStatus::Online, now());
        let indicator = display.indicator.expect("online indicator");
        assert_eq!(indicator.color, IndicatorColor::Green);
        assert_eq!(indicator.label, "Online");
        assert_eq!(display.last_seen_text, None);

        let display = compute_status(true, Some(seen), UserStatus::Away, now());
        let indicator = display.indicator.expect("away indicator");
        assert_eq!(indicator.color, IndicatorColor::Yellow);
        assert_eq!(indicator.label, "Away");
        assert_eq!(display.last_seen_text, None);
    }

    #[test]
    fn minute_band_with_plural_wording() {
        let display = compute_status(
            true,
            Some(now() - Duration::minutes(10)),
            UserStatus::Online,
            now(),
        );
        assert_eq!(display.indicator, None);
        assert_eq!(
            display.last_seen_text.as_deref(),
            Some("Last seen 10 minutes ago")
        );
    }

    #[test]
    fn singular_hour_wording() {
        let display = compute_status(
            true,
            Some(now() - Duration::minutes(75)),
            UserStatus::Away,
            now(),
        );
        assert_eq!(display.last_seen_text.as_deref(), Some("Last seen 1 hour ago"));
    }

    #[test]
    fn yesterday_band() {
        let display = compute_status(
            true,
            Some(now() - Duration::hours(30)),
            UserStatus::Online,
            now(),
        );
        assert_eq!(display.last_seen_text.as_deref(), Some("Last seen yesterday"));
    }

    #[test]
    fn older_than_two_days_shows_date() {
        let display = compute_status(
            true,
            Some(now() - Duration::days(5)),
            UserStatus::Online,
            now(),
        );
        assert_eq!(
            display.last_seen_text.as_deref(),
            Some("Last seen on March 9, 2026")
        );
    }

    #[test]
    fn two_minute_boundary_drops_indicator() {
        let display = compute_status(
            true,
            Some(now() - Duration::minutes(2)),
            UserStatus::Online,
            now(),
        );
        assert_eq!(display.indicator, None);
        assert_eq!(
            display.last_seen_text.as_deref(),
            Some("Last seen 2 minutes ago")
        );
    }
}
