use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::{principal_from_claims, verify_token};
use crate::services::presence_service::{PresenceService, UserStatus};
use crate::state::AppState;
use crate::websocket::FeedScope;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Bearer token; browsers cannot set headers on WebSocket upgrades.
    pub token: String,
    /// With a counterpart the feed watches one thread, otherwise the whole
    /// inbox.
    pub counterpart: Option<Uuid>,
    pub job_id: Option<Uuid>,
    #[serde(default)]
    pub status: UserStatus,
}

/// GET /ws?token=&counterpart=&job_id=&status=
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let claims = verify_token(&params.token, &state.config.jwt_secret)?;
    let user_id = principal_from_claims(&claims)?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id, params)))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: Uuid, params: WsParams) {
    let scope = match params.counterpart {
        Some(counterpart) => FeedScope::thread(params.job_id, user_id, counterpart),
        None => FeedScope::inbox(user_id),
    };
    let mut rx = state.registry.add_subscriber(scope).await;
    let (mut ws_tx, mut ws_rx) = socket.split();

    // The open socket is the presence session: one beat immediately (the
    // client just came to the foreground), then every 60 seconds. Failed
    // beats are logged and ignored.
    let heartbeat_db = state.db.clone();
    let status = params.status;
    let heartbeat = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            if let Err(e) = PresenceService::heartbeat(&heartbeat_db, user_id, status).await {
                tracing::debug!(error = %e, "presence heartbeat failed; ignored");
            }
        }
    });

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(msg) => {
                    if ws_tx.send(msg).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            incoming = ws_rx.next() => match incoming {
                // The feed is one-way; inbound frames other than close are
                // ignored (pings are answered by the framework).
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    // Tear down with the owning view: no leaked heartbeats, no duplicate
    // callbacks. Dropping `rx` unsubscribes from the registry.
    heartbeat.abort();
}
