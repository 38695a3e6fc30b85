use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::{ClientConfig, parse_noise_reduction, parse_turn_detection};
use crate::core::realtime::openai::{OpenAIRealtimeModel, OpenAIRealtimeVoice};

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///   cors_allowed_origins: "*"
///
/// openai:
///   api_key: "sk-..."
///   sessions_url: "https://api.openai.com/v1/realtime/sessions"
///   realtime_url: "https://api.openai.com/v1/realtime"
///   session_model: "gpt-4o-realtime-preview-2024-12-17"
///   session_voice: "verse"
///   session_instructions: ""
///
/// session:
///   credential_url: "http://localhost:3001/api/realtime/sessions"
///   model: "gpt-4o-realtime-preview-2024-12-17"
///   voice: "alloy"
///   channel_label: "realtime"
///   instructions: "You are a helpful assistant."
///   temperature: 0.6
///   transcription_model: "whisper-1"
///   transcription_language: "en"
///   noise_reduction: "near_field"
///   turn_detection: "server_vad"
///
/// webrtc:
///   ice_servers:
///     - "stun:stun.l.google.com:19302"
///   gathering_timeout_ms: 5000
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub openai: Option<OpenAIYaml>,
    pub session: Option<SessionYaml>,
    pub webrtc: Option<WebRtcYaml>,
}

/// Broker server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cors_allowed_origins: Option<String>,
}

/// OpenAI upstream configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OpenAIYaml {
    pub api_key: Option<String>,
    pub sessions_url: Option<String>,
    pub realtime_url: Option<String>,
    pub session_model: Option<String>,
    pub session_voice: Option<String>,
    pub session_instructions: Option<String>,
}

/// Client session configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    pub credential_url: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub channel_label: Option<String>,
    pub instructions: Option<String>,
    pub temperature: Option<f32>,
    pub transcription_model: Option<String>,
    pub transcription_language: Option<String>,
    /// near_field, far_field or none
    pub noise_reduction: Option<String>,
    /// server_vad, semantic_vad or none
    pub turn_detection: Option<String>,
}

/// WebRTC configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WebRtcYaml {
    pub ice_servers: Option<Vec<String>>,
    pub gathering_timeout_ms: Option<u64>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Required fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }

    /// Override `config` with every value present in this file.
    pub(super) fn apply(self, config: &mut ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(server) = self.server {
            if let Some(host) = server.host {
                config.host = host;
            }
            if let Some(port) = server.port {
                config.port = port;
            }
            if let Some(origins) = server.cors_allowed_origins {
                config.cors_allowed_origins = Some(origins);
            }
        }

        if let Some(openai) = self.openai {
            if let Some(key) = openai.api_key {
                config.openai_api_key = Some(key);
            }
            if let Some(url) = openai.sessions_url {
                config.sessions_url = url;
            }
            if let Some(url) = openai.realtime_url {
                config.realtime_url = url;
            }
            if let Some(model) = openai.session_model {
                config.session_model = OpenAIRealtimeModel::from_str_or_default(&model);
            }
            if let Some(voice) = openai.session_voice {
                config.session_voice = OpenAIRealtimeVoice::from_str_or_default(&voice);
            }
            if let Some(instructions) = openai.session_instructions {
                config.session_instructions = instructions;
            }
        }

        if let Some(session) = self.session {
            if let Some(url) = session.credential_url {
                config.credential_url = url;
            }
            if let Some(model) = session.model {
                config.model = OpenAIRealtimeModel::from_str_or_default(&model);
            }
            if let Some(voice) = session.voice {
                config.voice = OpenAIRealtimeVoice::from_str_or_default(&voice);
            }
            if let Some(label) = session.channel_label {
                config.channel_label = label;
            }
            if let Some(instructions) = session.instructions {
                config.instructions = instructions;
            }
            if let Some(temperature) = session.temperature {
                config.temperature = temperature;
            }
            if let Some(model) = session.transcription_model {
                config.transcription_model = model;
            }
            if let Some(language) = session.transcription_language {
                config.transcription_language = Some(language);
            }
            if let Some(value) = session.noise_reduction {
                config.noise_reduction = parse_noise_reduction(&value)?;
            }
            if let Some(value) = session.turn_detection {
                config.turn_detection = parse_turn_detection(&value)?;
            }
        }

        if let Some(webrtc) = self.webrtc {
            if let Some(servers) = webrtc.ice_servers {
                config.ice_servers = servers;
            }
            if let Some(ms) = webrtc.gathering_timeout_ms {
                config.ice_gathering_timeout = Duration::from_millis(ms);
            }
        }

        Ok(())
    }
}
