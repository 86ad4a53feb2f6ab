//! Route configuration modules.

use std::sync::Arc;

use axum::Router;

use crate::handlers;
use crate::state::AppState;

pub mod api;
pub mod voice;

/// Assemble the full application router: health check, call control, and the
/// relay WebSocket. Outer layers (CORS, rate limiting, security headers) are
/// applied by the binary.
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", axum::routing::get(handlers::api::health_check))
        .merge(api::create_api_router())
        .merge(voice::create_voice_router())
        .with_state(state)
}
