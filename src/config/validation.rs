//! Configuration validation.

use super::ClientConfig;
use crate::core::realtime::openai::{MAX_TEMPERATURE, MIN_TEMPERATURE};

/// Validate a merged configuration.
///
/// # Errors
/// Returns an error if:
/// - Any endpoint URL fails to parse or is not http(s)
/// - The temperature is outside [0.6, 1.2]
/// - The control channel label is empty
/// - An ICE server entry has no scheme
pub fn validate(config: &ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_http_url("credential_url", &config.credential_url)?;
    validate_http_url("realtime_url", &config.realtime_url)?;
    validate_http_url("sessions_url", &config.sessions_url)?;
    validate_temperature(config.temperature)?;

    if config.channel_label.trim().is_empty() {
        return Err("channel_label must not be empty".into());
    }

    for server in &config.ice_servers {
        if !(server.starts_with("stun:") || server.starts_with("turn:") || server.starts_with("turns:"))
        {
            return Err(format!("Invalid ICE server '{server}': expected stun:, turn: or turns: URL").into());
        }
    }

    Ok(())
}

fn validate_http_url(name: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
    let url = url::Url::parse(value).map_err(|e| format!("Invalid {name} '{value}': {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(format!("Invalid {name} '{value}': unsupported scheme {scheme}").into()),
    }
}

fn validate_temperature(temperature: f32) -> Result<(), Box<dyn std::error::Error>> {
    if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) {
        return Err(format!(
            "Invalid temperature {temperature}: must be between {MIN_TEMPERATURE} and {MAX_TEMPERATURE}"
        )
        .into());
    }
    Ok(())
}
