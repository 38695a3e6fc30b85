use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, sessions};
use crate::state::BrokerState;
use std::sync::Arc;

/// Path served by [`create_sessions_router`]; matches the default credential URL.
pub const SESSIONS_PATH: &str = "/api/realtime/sessions";

/// Create the credential broker router
pub fn create_sessions_router() -> Router<Arc<BrokerState>> {
    Router::new()
        // Browsers fetch credentials with GET; POST is kept for non-browser hosts
        .route(SESSIONS_PATH, get(sessions::mint_session).post(sessions::mint_session))
        .layer(TraceLayer::new_for_http())
}

/// Public health check route
pub fn create_public_router() -> Router<Arc<BrokerState>> {
    Router::new().route("/", get(api::health_check))
}
