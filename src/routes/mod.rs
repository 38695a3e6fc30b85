pub mod sessions;

use axum::Router;
use http::{
    Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::state::BrokerState;

/// Build the CORS layer from the comma separated `CORS_ALLOWED_ORIGINS` value
///
/// `"*"` allows any origin without credentials. A list allows exactly those
/// origins. `None` leaves the broker same-origin only.
pub fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    let headers = [AUTHORIZATION, CONTENT_TYPE];

    match origins {
        Some("*") => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(false),
        Some(origins) => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(methods)
                .allow_headers(headers)
                .allow_credentials(true)
        }
        None => {
            info!(
                "CORS not configured, defaulting to same-origin only. \
                 Set CORS_ALLOWED_ORIGINS to enable cross-origin access."
            );
            CorsLayer::new()
                .allow_methods(methods)
                .allow_headers(headers)
                .allow_credentials(false)
        }
    }
}

/// Assemble the complete broker application
pub fn create_app(state: Arc<BrokerState>) -> Router {
    let cors = cors_layer(state.config.cors_allowed_origins.as_deref());

    sessions::create_public_router()
        .merge(sessions::create_sessions_router())
        .with_state(state)
        .layer(cors)
}
