use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info};

use crate::state::BrokerState;

/// Upstream request body for a new ephemeral session.
#[derive(Debug, Serialize)]
struct MintRequest<'a> {
    model: &'a str,
    voice: &'a str,
    instructions: &'a str,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Mint an ephemeral Realtime session
///
/// Calls the upstream sessions endpoint with the server's API key and returns
/// the upstream JSON unchanged, including `client_secret.value` and
/// `client_secret.expires_at`.
///
/// # Responses
/// - 200: upstream session JSON
/// - 500: API key not configured
/// - 502: upstream unreachable, non-2xx, or not JSON
pub async fn mint_session(State(state): State<Arc<BrokerState>>) -> Response {
    let Some(api_key) = state.config.openai_api_key.as_deref() else {
        error!("Session mint requested but no OpenAI API key is configured");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "OpenAI API key not configured",
        );
    };

    let body = MintRequest {
        model: state.config.session_model.as_str(),
        voice: state.config.session_voice.as_str(),
        instructions: &state.config.session_instructions,
    };

    let response = match state
        .http
        .post(&state.config.sessions_url)
        .bearer_auth(api_key)
        .json(&body)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            error!("Session mint request failed: {}", e);
            return error_response(StatusCode::BAD_GATEWAY, format!("Upstream request failed: {e}"));
        }
    };

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        error!(%status, "Upstream rejected session mint: {}", text);
        return error_response(
            StatusCode::BAD_GATEWAY,
            format!("Upstream returned {status}: {text}"),
        );
    }

    match response.json::<Value>().await {
        Ok(session) => {
            info!(model = body.model, voice = body.voice, "Minted ephemeral session");
            (StatusCode::OK, Json(session)).into_response()
        }
        Err(e) => {
            error!("Upstream session response is not JSON: {}", e);
            error_response(StatusCode::BAD_GATEWAY, format!("Invalid upstream response: {e}"))
        }
    }
}
