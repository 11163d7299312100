pub mod chat;
pub mod health;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

/// Build the full API router: a public health probe plus the chat
/// WebSocket endpoint (which authenticates itself via the protocol's
/// own `auth` frame rather than an HTTP-layer auth middleware).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/health", get(health::health))
        .route("/v1/chat/ws", get(chat::chat_ws))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
