//! Call control route configuration.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::calls;
use crate::state::AppState;
use std::sync::Arc;

/// Create the call control router.
///
/// # Endpoints
///
/// - `POST /api/voice/start` - mint a call session and return the relay URL
/// - `GET /api/voice/start` - voice-call capabilities
/// - `POST /api/voice/end` - record a finished call (analytics only)
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/voice/start",
            post(calls::start_call).get(calls::voice_capabilities),
        )
        .route("/api/voice/end", post(calls::end_call))
        .layer(TraceLayer::new_for_http())
}
