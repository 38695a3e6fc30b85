//! HTTP collaborator tests
//!
//! `HttpCredentialBroker` and `HttpSignaling` against a local wiremock server.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use waav_realtime_client::core::realtime::openai::{
    HttpCredentialBroker, HttpSignaling, OpenAIRealtimeModel, OpenAIRealtimeVoice,
};
use waav_realtime_client::core::realtime::{
    Credential, CredentialBroker, RealtimeError, SdpType, SessionDescription, SignalingExchange,
};

const OFFER_SDP: &str = "v=0\r\no=- 42 2 IN IP4 127.0.0.1\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\n";
const ANSWER_SDP: &str = "v=0\r\no=- 7 2 IN IP4 127.0.0.1\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\n";

// =============================================================================
// Credential Broker
// =============================================================================

#[tokio::test]
async fn test_credential_fetched_with_get() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/realtime/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sess_001",
            "object": "realtime.session",
            "client_secret": {"value": "ek_abc123", "expires_at": 1_735_000_000}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let broker = HttpCredentialBroker::new(format!("{}/api/realtime/sessions", server.uri()));
    let credential = broker.fetch_ephemeral_credential().await.unwrap();

    assert_eq!(credential.bearer(), "Bearer ek_abc123");
    assert_eq!(credential.expires_at(), 1_735_000_000);
}

#[tokio::test]
async fn test_credential_non_success_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "OpenAI API key not configured"})))
        .mount(&server)
        .await;

    let broker = HttpCredentialBroker::new(server.uri());
    match broker.fetch_ephemeral_credential().await {
        Err(RealtimeError::CredentialFailed(msg)) => assert!(msg.contains("500")),
        other => panic!("Unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_credential_missing_client_secret() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "sess_001"})))
        .mount(&server)
        .await;

    let broker = HttpCredentialBroker::new(server.uri());
    assert!(matches!(
        broker.fetch_ephemeral_credential().await,
        Err(RealtimeError::CredentialFailed(_))
    ));
}

#[tokio::test]
async fn test_credential_empty_secret() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"client_secret": {"value": ""}})),
        )
        .mount(&server)
        .await;

    let broker = HttpCredentialBroker::new(server.uri());
    assert!(matches!(
        broker.fetch_ephemeral_credential().await,
        Err(RealtimeError::CredentialFailed(_))
    ));
}

#[tokio::test]
async fn test_credential_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"client_secret": {"value": "ek_slow"}}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let broker = HttpCredentialBroker::new(server.uri()).with_timeout(Duration::from_millis(50));
    assert!(matches!(
        broker.fetch_ephemeral_credential().await,
        Err(RealtimeError::CredentialFailed(_))
    ));
}

#[tokio::test]
async fn test_credential_broker_unreachable() {
    let broker = HttpCredentialBroker::new("http://127.0.0.1:1/api/realtime/sessions");
    assert!(matches!(
        broker.fetch_ephemeral_credential().await,
        Err(RealtimeError::CredentialFailed(_))
    ));
}

// =============================================================================
// Signaling
// =============================================================================

fn signaling(server: &MockServer) -> HttpSignaling {
    HttpSignaling::new(
        format!("{}/v1/realtime", server.uri()),
        OpenAIRealtimeModel::default(),
        OpenAIRealtimeVoice::Verse,
    )
}

#[tokio::test]
async fn test_signaling_posts_offer_and_returns_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/realtime"))
        .and(query_param("model", "gpt-4o-realtime-preview-2024-12-17"))
        .and(query_param("voice", "verse"))
        .and(header("authorization", "Bearer ek_abc123"))
        .and(header("content-type", "application/sdp"))
        .and(body_string(OFFER_SDP))
        .respond_with(ResponseTemplate::new(201).set_body_string(ANSWER_SDP))
        .expect(1)
        .mount(&server)
        .await;

    let answer = signaling(&server)
        .exchange(
            Credential::new("ek_abc123", 0),
            SessionDescription::offer(OFFER_SDP),
        )
        .await
        .unwrap();

    assert_eq!(answer.sdp_type, SdpType::Answer);
    assert_eq!(answer.sdp, ANSWER_SDP);
}

#[tokio::test]
async fn test_signaling_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid ephemeral key"))
        .mount(&server)
        .await;

    let result = signaling(&server)
        .exchange(Credential::new("ek_expired", 0), SessionDescription::offer(OFFER_SDP))
        .await;

    match result {
        Err(RealtimeError::NegotiationFailed(msg)) => {
            assert!(msg.contains("401"));
            assert!(msg.contains("invalid ephemeral key"));
        }
        other => panic!("Unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_signaling_requires_offer() {
    let server = MockServer::start().await;

    let result = signaling(&server)
        .exchange(Credential::new("ek_abc123", 0), SessionDescription::answer(ANSWER_SDP))
        .await;

    assert!(matches!(result, Err(RealtimeError::NegotiationFailed(_))));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
