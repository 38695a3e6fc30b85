use std::sync::Arc;
use std::time::Duration;

use crate::config::ClientConfig;

/// Upstream request timeout for minting sessions.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(15);

/// Shared state of the token broker server.
pub struct BrokerState {
    pub config: ClientConfig,
    /// Reused upstream client (connection pooling)
    pub http: reqwest::Client,
}

impl BrokerState {
    pub fn new(config: ClientConfig) -> Arc<Self> {
        let http = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Arc::new(Self { config, http })
    }
}
