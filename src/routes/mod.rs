use crate::middleware::auth::auth_middleware;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

pub mod calls;
use calls::{propose_call, respond_call};
pub mod conversations;
use conversations::list_conversations;
pub mod messages;
use messages::{
    delete_thread, get_thread, mark_thread_read, mark_thread_unread, send_message, update_message,
};
pub mod presence;
use presence::{get_presence, heartbeat};
pub mod wsroute;
use wsroute::ws_handler;

pub fn build_router(state: AppState) -> Router {
    // API v1 endpoints, all behind bearer auth.
    let api_v1 = Router::new()
        // Conversations (derived inbox)
        .route("/conversations", get(list_conversations))
        // Threads
        .route(
            "/threads/:counterpart/messages",
            post(send_message).get(get_thread),
        )
        .route("/threads/:counterpart/read", post(mark_thread_read))
        .route("/threads/:counterpart/unread", post(mark_thread_unread))
        .route("/threads/:counterpart", delete(delete_thread))
        // Messages
        .route("/messages/:id", put(update_message))
        // Video-call negotiation
        .route("/threads/:counterpart/calls", post(propose_call))
        .route("/calls/:message_id/respond", post(respond_call))
        // Presence
        .route("/presence/heartbeat", post(heartbeat))
        .route("/users/:id/presence", get(get_presence))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // The change feed authenticates via query token inside the handler
    // (browser WebSocket upgrades cannot carry an Authorization header).
    let feed = Router::new().route("/ws", get(ws_handler));

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api/v1", api_v1.merge(feed))
        .with_state(state)
}
