//! HTTP offer/answer exchange against the Realtime endpoint.

use std::time::Duration;

use async_trait::async_trait;
use http::header::{AUTHORIZATION, CONTENT_TYPE};

use super::config::{OpenAIRealtimeModel, OpenAIRealtimeVoice};
use crate::core::realtime::base::{
    Credential, RealtimeError, RealtimeResult, SdpType, SessionDescription, SignalingExchange,
};

const SDP_CONTENT_TYPE: &str = "application/sdp";

/// Posts the local offer SDP and returns the remote answer.
pub struct HttpSignaling {
    base_url: String,
    model: OpenAIRealtimeModel,
    voice: OpenAIRealtimeVoice,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpSignaling {
    pub fn new(
        base_url: impl Into<String>,
        model: OpenAIRealtimeModel,
        voice: OpenAIRealtimeVoice,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model,
            voice,
            timeout: Duration::from_secs(30),
            client: reqwest::Client::new(),
        }
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full exchange URL including `model` and `voice` query parameters.
    pub fn exchange_url(&self) -> RealtimeResult<url::Url> {
        url::Url::parse_with_params(
            &self.base_url,
            &[("model", self.model.as_str()), ("voice", self.voice.as_str())],
        )
        .map_err(|e| RealtimeError::InvalidConfiguration(format!("Invalid realtime URL: {}", e)))
    }
}

#[async_trait]
impl SignalingExchange for HttpSignaling {
    async fn exchange(
        &self,
        credential: Credential,
        offer: SessionDescription,
    ) -> RealtimeResult<SessionDescription> {
        if offer.sdp_type != SdpType::Offer {
            return Err(RealtimeError::NegotiationFailed(
                "Signaling expects an offer".to_string(),
            ));
        }

        let url = self.exchange_url()?;
        tracing::debug!(url = %url, "Exchanging session description");

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, credential.bearer())
            .header(CONTENT_TYPE, SDP_CONTENT_TYPE)
            .body(offer.sdp)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RealtimeError::NegotiationFailed(format!("Signaling request failed: {}", e)))?;
        drop(credential);

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            RealtimeError::NegotiationFailed(format!("Failed to read answer: {}", e))
        })?;

        if !status.is_success() {
            return Err(RealtimeError::NegotiationFailed(format!(
                "Signaling returned {}: {}",
                status, body
            )));
        }

        tracing::info!("Received session answer");
        Ok(SessionDescription::answer(body))
    }
}
