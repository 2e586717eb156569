use crate::websocket::{ConnectionRegistry, FeedScope};
use axum::extract::ws::Message;
use redis::AsyncCommands;
use redis::Client;

pub async fn publish(client: &Client, scope: FeedScope, payload: &str) -> redis::RedisResult<()> {
    let mut conn = client.get_multiplexed_async_connection().await?;
    conn.publish::<_, _, ()>(scope.channel(), payload).await
}

/// Cross-instance fanout: replay every `feed:*` message into the local
/// registry. PubSub requires a dedicated connection, not multiplexed.
pub async fn start_psub_listener(
    client: Client,
    registry: ConnectionRegistry,
) -> redis::RedisResult<()> {
    let conn = client.get_async_connection().await?;
    let mut pubsub = conn.into_pubsub();
    pubsub.psubscribe("feed:*").await?;
    let mut stream = pubsub.on_message();
    use futures_util::StreamExt;
    while let Some(msg) = stream.next().await {
        let channel: String = msg.get_channel_name().into();
        let payload: String = msg.get_payload()?;
        if let Some(scope) = FeedScope::parse_channel(&channel) {
            registry.broadcast(scope, Message::Text(payload)).await;
        }
    }
    Ok(())
}
