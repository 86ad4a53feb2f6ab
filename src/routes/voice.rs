//! Voice relay WebSocket route configuration.

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::voice::voice_realtime_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the voice relay router.
///
/// # Endpoint
///
/// `GET /api/voice/realtime?sessionId=...` - WebSocket upgrade for the relay
///
/// # Protocol
///
/// After the upgrade, clients send protocol-framed binary audio and
/// `{"type":"ping"}` keepalives. The server responds with `connected`,
/// `pong`, `error`, and `end` status messages plus raw binary frames from
/// the dialogue service. A missing `sessionId` closes the socket with
/// code 1008.
pub fn create_voice_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/voice/realtime", get(voice_realtime_handler))
        .layer(TraceLayer::new_for_http())
}
