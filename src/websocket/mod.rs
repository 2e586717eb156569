use axum::extract::ws::Message;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod events;
pub mod pubsub;

/// What a change-feed subscription watches: a user's whole inbox, or one
/// thread key. The thread pair is stored normalized so both parties land on
/// the same scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedScope {
    Inbox {
        user_id: Uuid,
    },
    Thread {
        job_id: Option<Uuid>,
        low: Uuid,
        high: Uuid,
    },
}

impl FeedScope {
    pub fn inbox(user_id: Uuid) -> Self {
        Self::Inbox { user_id }
    }

    pub fn thread(job_id: Option<Uuid>, a: Uuid, b: Uuid) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self::Thread { job_id, low, high }
    }

    /// Redis channel name used for cross-instance fanout.
    pub fn channel(&self) -> String {
        match self {
            Self::Inbox { user_id } => format!("feed:inbox:{user_id}"),
            Self::Thread { job_id, low, high } => {
                let job = job_id
                    .map(|j| j.to_string())
                    .unwrap_or_else(|| "direct".to_string());
                format!("feed:thread:{job}:{low}:{high}")
            }
        }
    }

    pub fn parse_channel(channel: &str) -> Option<Self> {
        let rest = channel.strip_prefix("feed:")?;
        if let Some(user) = rest.strip_prefix("inbox:") {
            return Uuid::parse_str(user).ok().map(Self::inbox);
        }
        let rest = rest.strip_prefix("thread:")?;
        let mut parts = rest.split(':');
        let job = match parts.next()? {
            "direct" => None,
            raw => Some(Uuid::parse_str(raw).ok()?),
        };
        let low = Uuid::parse_str(parts.next()?).ok()?;
        let high = Uuid::parse_str(parts.next()?).ok()?;
        Some(Self::thread(job, low, high))
    }
}

/// In-process subscriber registry, one sender list per scope. Dropping the
/// receiver cancels a subscription; dead senders are pruned on broadcast.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<FeedScope, Vec<UnboundedSender<Message>>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_subscriber(&self, scope: FeedScope) -> UnboundedReceiver<Message> {
        let (tx, rx) = unbounded_channel();
        let mut guard = self.inner.write().await;
        guard.entry(scope).or_default().push(tx);
        rx
    }

    pub async fn broadcast(&self, scope: FeedScope, msg: Message) {
        let mut guard = self.inner.write().await;
        if let Some(list) = guard.get_mut(&scope) {
            list.retain(|sender| sender.send(msg.clone()).is_ok());
            if list.is_empty() {
                guard.remove(&scope);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_scope_normalizes_pair_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(FeedScope::thread(None, a, b), FeedScope::thread(None, b, a));
    }

    #[test]
    fn channel_round_trips() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let job = Uuid::new_v4();
        for scope in [
            FeedScope::inbox(a),
            FeedScope::thread(None, a, b),
            FeedScope::thread(Some(job), b, a),
        ] {
            assert_eq!(FeedScope::parse_channel(&scope.channel()), Some(scope));
        }
        assert_eq!(FeedScope::parse_channel("feed:thread:bogus"), None);
    }

    #[tokio::test]
    async fn dropped_receiver_is_pruned() {
        let registry = ConnectionRegistry::new();
        let scope = FeedScope::inbox(Uuid::new_v4());
        let rx = registry.add_subscriber(scope).await;
        drop(rx);
        registry
            .broadcast(scope, Message::Text("ping".into()))
            .await;
        assert!(registry.inner.read().await.get(&scope).is_none());
    }

    #[tokio::test]
    async fn broadcast_reaches_live_subscriber() {
        let registry = ConnectionRegistry::new();
        let scope = FeedScope::inbox(Uuid::new_v4());
        let mut rx = registry.add_subscriber(scope).await;
        registry
            .broadcast(scope, Message::Text("hello".into()))
            .await;
        match rx.recv().await {
            Some(Message::Text(text)) => assert_eq!(text, "hello"),
            other => panic!("expected text frame, got {other:?}"),
        }
    }
}
