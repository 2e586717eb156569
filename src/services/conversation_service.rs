use sqlx::{Pool, Postgres};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::conversation::{ConversationFilter, ConversationSummary};
use crate::models::message::Message;
use crate::services::message_service::MessageService;
use crate::services::profile_service::ProfileService;

/// Fold a viewer's messages (newest first) into one summary per
/// `(job_id, counterpart)` key.
///
/// The first message seen for a key supplies the preview, so the input
/// ordering decides both the preview and the output order
/// (most-recently-active conversation first). Equal timestamps within a key
/// fall back to store return order; no secondary sort key is applied.
pub fn aggregate_messages(
    viewer: Uuid,
    messages: &[Message],
    filter: ConversationFilter,
) -> Vec<ConversationSummary> {
    let mut summaries: Vec<ConversationSummary> = Vec::new();
    let mut index: HashMap<(Option<Uuid>, Uuid), usize> = HashMap::new();

    for message in messages {
        let counterpart = message.counterpart(viewer);
        let key = (message.job_id, counterpart);

        let slot = *index.entry(key).or_insert_with(|| {
            summaries.push(ConversationSummary {
                job_id: message.job_id,
                counterpart_id: counterpart,
                counterpart: None,
                last_message_body: message.body.clone(),
                last_message_at: message.created_at,
                unread_count: 0,
            });
            summaries.len() - 1
        });

        if message.recipient_id == viewer && !message.is_read {
            summaries[slot].unread_count += 1;
        }
    }

    match filter {
        ConversationFilter::Unread => summaries.retain(|s| s.unread_count > 0),
        // No persisted "archived" attribute exists yet, so the filter is an
        // alias of All until product decides what archiving means.
        ConversationFilter::All | ConversationFilter::Archived => {}
    }

    summaries
}

pub struct ConversationService;

impl ConversationService {
    /// Derive the viewer's conversation list and resolve counterpart
    /// display identities in one batch.
    pub async fn list_conversations(
        db: &Pool<Postgres>,
        viewer: Uuid,
        filter: ConversationFilter,
    ) -> Result<Vec<ConversationSummary>, AppError> {
        let messages = MessageService::fetch_for_viewer(db, viewer).await?;
        let mut summaries = aggregate_messages(viewer, &messages, filter);

        let mut ids: Vec<Uuid> = summaries.iter().map(|s| s.counterpart_id).collect();
        ids.sort_unstable();
        ids.dedup();

        let profiles = ProfileService::display_profiles(db, &ids).await?;
        for summary in &mut summaries {
            summary.counterpart = profiles.get(&summary.counterpart_id).cloned();
        }

        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
    }

    struct Draft {
        from: Uuid,
        to: Uuid,
        job: Option<Uuid>,
        body: &'static str,
        minutes_ago: i64,
        read: bool,
    }

    fn build(drafts: Vec<Draft>) -> Vec<Message> {
        let mut messages: Vec<Message> = drafts
            .into_iter()
            .map(|s| Message {
                id: Uuid::new_v4(),
                sender_id: s.from,
                recipient_id: s.to,
                job_id: s.job,
                body: s.body.into(),
                attachments: vec![],
                created_at: base_time() - Duration::minutes(s.minutes_ago),
                edited_at: None,
                is_read: s.read,
                reply_to: None,
            })
            .collect();
        // The store hands the aggregator newest-first rows.
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        messages
    }

    #[test]
    fn one_summary_per_key_with_latest_preview() {
        let viewer = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let job = Uuid::new_v4();

        let messages = build(vec![
            Draft { from: alice, to: viewer, job: None, body: "newest direct", minutes_ago: 1, read: false },
            Draft { from: viewer, to: alice, job: None, body: "older direct", minutes_ago: 10, read: true },
            Draft { from: alice, to: viewer, job: Some(job), body: "job thread", minutes_ago: 5, read: true },
        ]);

        let summaries = aggregate_messages(viewer, &messages, ConversationFilter::All);
        assert_eq!(summaries.len(), 2);

        // Most recently active first.
        assert_eq!(summaries[0].job_id, None);
        assert_eq!(summaries[0].counterpart_id, alice);
        assert_eq!(summaries[0].last_message_body, "newest direct");
        assert_eq!(summaries[1].job_id, Some(job));
        assert_eq!(summaries[1].last_message_body, "job thread");
    }

    #[test]
    fn unread_counts_only_inbound_unread() {
        let viewer = Uuid::new_v4();
        let alice = Uuid::new_v4();

        let messages = build(vec![
            Draft { from: alice, to: viewer, job: None, body: "a", minutes_ago: 1, read: false },
            Draft { from: alice, to: viewer, job: None, body: "b", minutes_ago: 2, read: false },
            Draft { from: alice, to: viewer, job: None, body: "c", minutes_ago: 3, read: true },
            // Outbound unread must not count.
            Draft { from: viewer, to: alice, job: None, body: "d", minutes_ago: 4, read: false },
        ]);

        let summaries = aggregate_messages(viewer, &messages, ConversationFilter::All);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].unread_count, 2);
    }

    #[test]
    fn unread_filter_drops_read_threads() {
        let viewer = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let messages = build(vec![
            Draft { from: alice, to: viewer, job: None, body: "unread", minutes_ago: 1, read: false },
            Draft { from: bob, to: viewer, job: None, body: "read", minutes_ago: 2, read: true },
        ]);

        let unread = aggregate_messages(viewer, &messages, ConversationFilter::Unread);
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].counterpart_id, alice);

        // Archived has no backing data and behaves like All.
        let archived = aggregate_messages(viewer, &messages, ConversationFilter::Archived);
        assert_eq!(archived.len(), 2);
    }

    #[test]
    fn same_pair_in_different_jobs_stays_separate() {
        let viewer = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let job_a = Uuid::new_v4();
        let job_b = Uuid::new_v4();

        let messages = build(vec![
            Draft { from: alice, to: viewer, job: Some(job_a), body: "a", minutes_ago: 1, read: false },
            Draft { from: alice, to: viewer, job: Some(job_b), body: "b", minutes_ago: 2, read: false },
            Draft { from: alice, to: viewer, job: None, body: "c", minutes_ago: 3, read: false },
        ]);

        let summaries = aggregate_messages(viewer, &messages, ConversationFilter::All);
        assert_eq!(summaries.len(), 3);
    }

    #[test]
    fn identical_timestamps_keep_store_order() {
        let viewer = Uuid::new_v4();
        let alice = Uuid::new_v4();

        let mut messages = build(vec![
            Draft { from: alice, to: viewer, job: None, body: "first returned", minutes_ago: 7, read: true },
            Draft { from: alice, to: viewer, job: None, body: "second returned", minutes_ago: 7, read: true },
        ]);
        // Both rows share created_at; whichever the store returned first wins.
        messages[1].created_at = messages[0].created_at;

        let summaries = aggregate_messages(viewer, &messages, ConversationFilter::All);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].last_message_body, messages[0].body);
    }
}
