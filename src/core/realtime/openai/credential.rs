//! HTTP credential broker.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::core::realtime::base::{
    Credential, CredentialBroker, RealtimeError, RealtimeResult,
};

/// Broker response body. Only `client_secret` is read.
#[derive(Debug, Deserialize)]
struct SessionSecretResponse {
    client_secret: ClientSecret,
}

#[derive(Debug, Deserialize)]
struct ClientSecret {
    value: String,
    #[serde(default)]
    expires_at: i64,
}

/// Fetches ephemeral credentials from a broker endpoint with a plain `GET`.
pub struct HttpCredentialBroker {
    url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpCredentialBroker {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(10),
            client: reqwest::Client::new(),
        }
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CredentialBroker for HttpCredentialBroker {
    async fn fetch_ephemeral_credential(&self) -> RealtimeResult<Credential> {
        tracing::debug!(url = %self.url, "Requesting ephemeral credential");

        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RealtimeError::CredentialFailed(format!("Broker unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RealtimeError::CredentialFailed(format!(
                "Broker returned {}: {}",
                status, body
            )));
        }

        let body: SessionSecretResponse = response.json().await.map_err(|e| {
            RealtimeError::CredentialFailed(format!("Malformed broker response: {}", e))
        })?;

        if body.client_secret.value.is_empty() {
            return Err(RealtimeError::CredentialFailed(
                "Broker returned an empty client secret".to_string(),
            ));
        }

        tracing::info!(expires_at = body.client_secret.expires_at, "Ephemeral credential obtained");
        Ok(Credential::new(
            body.client_secret.value,
            body.client_secret.expires_at,
        ))
    }
}
