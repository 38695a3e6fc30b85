//! Configuration module for the WaaV Realtime client
//!
//! This module handles client and token broker configuration from various sources:
//! .env files, YAML files, and environment variables.
//! Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use waav_realtime_client::config::ClientConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ClientConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ClientConfig::from_file(&config_path)?;
//!
//! println!("Broker listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

mod validation;
mod yaml;

use crate::core::realtime::RealtimeSessionConfig;
use crate::core::realtime::openai::{
    DEFAULT_CHANNEL_LABEL, DEFAULT_INSTRUCTIONS, DEFAULT_TEMPERATURE, DEFAULT_TRANSCRIPTION_MODEL,
    HttpCredentialBroker, HttpSignaling, Modality, NoiseReductionType,
    OPENAI_REALTIME_SESSIONS_URL, OPENAI_REALTIME_URL, OpenAIRealtimeModel, OpenAIRealtimeVoice,
    TurnDetection, TurnDetectionType,
};
use crate::core::realtime::peer::PeerConnectionConfig;

pub use yaml::YamlConfig;

/// Default credential broker endpoint (served by `waav-realtime broker`).
pub const DEFAULT_CREDENTIAL_URL: &str = "http://localhost:3001/api/realtime/sessions";

/// Client and token broker configuration
///
/// Contains everything needed to run a realtime session and the optional
/// token broker server:
/// - Broker server settings (host, port, CORS, OpenAI API key)
/// - Minted session defaults (model, voice, instructions)
/// - Client endpoints (credential broker, signaling)
/// - Session options sent with `session.update`
/// - WebRTC settings (ICE servers, gathering timeout)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // Broker server settings
    pub host: String,
    pub port: u16,
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    // Broker upstream
    /// OpenAI API key used by the broker to mint ephemeral sessions
    pub openai_api_key: Option<String>,
    pub sessions_url: String,
    pub session_model: OpenAIRealtimeModel,
    pub session_voice: OpenAIRealtimeVoice,
    pub session_instructions: String,

    // Client endpoints
    pub credential_url: String,
    pub realtime_url: String,
    pub model: OpenAIRealtimeModel,
    pub voice: OpenAIRealtimeVoice,

    // Session options
    pub channel_label: String,
    pub instructions: String,
    pub temperature: f32,
    pub transcription_model: String,
    pub transcription_language: Option<String>,
    pub noise_reduction: Option<NoiseReductionType>,
    pub turn_detection: Option<TurnDetectionType>,

    // WebRTC
    pub ice_servers: Vec<String>,
    pub ice_gathering_timeout: Duration,
}

/// Zeroize the API key when the configuration is dropped.
impl Drop for ClientConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        let peer = PeerConnectionConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            cors_allowed_origins: None,
            openai_api_key: None,
            sessions_url: OPENAI_REALTIME_SESSIONS_URL.to_string(),
            session_model: OpenAIRealtimeModel::default(),
            session_voice: OpenAIRealtimeVoice::Verse,
            session_instructions: String::new(),
            credential_url: DEFAULT_CREDENTIAL_URL.to_string(),
            realtime_url: OPENAI_REALTIME_URL.to_string(),
            model: OpenAIRealtimeModel::default(),
            voice: OpenAIRealtimeVoice::Alloy,
            channel_label: DEFAULT_CHANNEL_LABEL.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            transcription_language: None,
            noise_reduction: Some(NoiseReductionType::NearField),
            turn_detection: None,
            ice_servers: peer.ice_servers,
            ice_gathering_timeout: peer.gathering_timeout,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// `.env` is loaded into the environment by `main` before this runs.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Self::merge(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = YamlConfig::from_file(path)?;
        let config = Self::merge(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Merge environment variables (base) with YAML overrides.
    fn merge(yaml: Option<YamlConfig>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = Self::default();
        config.apply_env()?;
        if let Some(yaml) = yaml {
            yaml.apply(&mut config)?;
        }
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(host) = env_var("HOST") {
            self.host = host;
        }
        if let Some(port) = env_var("PORT") {
            self.port = port
                .parse()
                .map_err(|e| format!("Invalid PORT value '{port}': {e}"))?;
        }
        if let Some(origins) = env_var("CORS_ALLOWED_ORIGINS") {
            self.cors_allowed_origins = Some(origins);
        }

        // OPEN_AI_API_KEY is accepted for compatibility with existing deployments
        if let Some(key) = env_var("OPENAI_API_KEY").or_else(|| env_var("OPEN_AI_API_KEY")) {
            self.openai_api_key = Some(key);
        }
        if let Some(url) = env_var("REALTIME_SESSIONS_URL") {
            self.sessions_url = url;
        }
        if let Some(model) = env_var("REALTIME_SESSION_MODEL") {
            self.session_model = OpenAIRealtimeModel::from_str_or_default(&model);
        }
        if let Some(voice) = env_var("REALTIME_SESSION_VOICE") {
            self.session_voice = OpenAIRealtimeVoice::from_str_or_default(&voice);
        }
        if let Some(instructions) = env_var("REALTIME_SESSION_INSTRUCTIONS") {
            self.session_instructions = instructions;
        }

        if let Some(url) = env_var("REALTIME_CREDENTIAL_URL") {
            self.credential_url = url;
        }
        if let Some(url) = env_var("REALTIME_URL") {
            self.realtime_url = url;
        }
        if let Some(model) = env_var("REALTIME_MODEL") {
            self.model = OpenAIRealtimeModel::from_str_or_default(&model);
        }
        if let Some(voice) = env_var("REALTIME_VOICE") {
            self.voice = OpenAIRealtimeVoice::from_str_or_default(&voice);
        }

        if let Some(label) = env_var("REALTIME_CHANNEL_LABEL") {
            self.channel_label = label;
        }
        if let Some(instructions) = env_var("REALTIME_INSTRUCTIONS") {
            self.instructions = instructions;
        }
        if let Some(temperature) = env_var("REALTIME_TEMPERATURE") {
            self.temperature = temperature
                .parse()
                .map_err(|e| format!("Invalid REALTIME_TEMPERATURE value '{temperature}': {e}"))?;
        }
        if let Some(model) = env_var("REALTIME_TRANSCRIPTION_MODEL") {
            self.transcription_model = model;
        }
        if let Some(language) = env_var("REALTIME_TRANSCRIPTION_LANGUAGE") {
            self.transcription_language = Some(language);
        }
        if let Some(value) = env_var("REALTIME_NOISE_REDUCTION") {
            self.noise_reduction = parse_noise_reduction(&value)?;
        }
        if let Some(value) = env_var("REALTIME_TURN_DETECTION") {
            self.turn_detection = parse_turn_detection(&value)?;
        }

        if let Some(servers) = env_var("ICE_SERVERS") {
            self.ice_servers = parse_list(&servers);
        }
        if let Some(timeout) = env_var("ICE_GATHERING_TIMEOUT_MS") {
            let ms: u64 = timeout
                .parse()
                .map_err(|e| format!("Invalid ICE_GATHERING_TIMEOUT_MS value '{timeout}': {e}"))?;
            self.ice_gathering_timeout = Duration::from_millis(ms);
        }

        Ok(())
    }

    /// Get the broker address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Session options for [`RealtimeSession`](crate::core::realtime::RealtimeSession).
    pub fn session_config(&self) -> RealtimeSessionConfig {
        RealtimeSessionConfig {
            channel_label: self.channel_label.clone(),
            instructions: self.instructions.clone(),
            modalities: Modality::both(),
            transcription_model: self.transcription_model.clone(),
            transcription_prompt: None,
            transcription_language: self.transcription_language.clone(),
            noise_reduction: self.noise_reduction,
            tools: Vec::new(),
            temperature: self.temperature,
            turn_detection: self.turn_detection.map(|detection_type| TurnDetection {
                detection_type,
                threshold: None,
                prefix_padding_ms: None,
                silence_duration_ms: None,
                create_response: Some(true),
            }),
        }
    }

    pub fn peer_config(&self) -> PeerConnectionConfig {
        PeerConnectionConfig {
            ice_servers: self.ice_servers.clone(),
            gathering_timeout: self.ice_gathering_timeout,
        }
    }

    pub fn credential_broker(&self) -> HttpCredentialBroker {
        HttpCredentialBroker::new(self.credential_url.clone())
    }

    pub fn signaling(&self) -> HttpSignaling {
        HttpSignaling::new(self.realtime_url.clone(), self.model, self.voice)
    }
}

fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a comma-separated list, dropping empty entries.
pub(crate) fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `near_field`, `far_field`, or `none`/`off` to disable.
pub(crate) fn parse_noise_reduction(value: &str) -> Result<Option<NoiseReductionType>, String> {
    match value.trim().to_lowercase().as_str() {
        "near_field" | "near" => Ok(Some(NoiseReductionType::NearField)),
        "far_field" | "far" => Ok(Some(NoiseReductionType::FarField)),
        "none" | "off" | "disabled" => Ok(None),
        other => Err(format!(
            "Invalid noise reduction '{other}', expected near_field, far_field or none"
        )),
    }
}

/// `server_vad`, `semantic_vad`, or `none`/`off` for the server default.
pub(crate) fn parse_turn_detection(value: &str) -> Result<Option<TurnDetectionType>, String> {
    match value.trim().to_lowercase().as_str() {
        "server_vad" => Ok(Some(TurnDetectionType::ServerVad)),
        "semantic_vad" => Ok(Some(TurnDetectionType::SemanticVad)),
        "none" | "off" | "default" => Ok(None),
        other => Err(format!(
            "Invalid turn detection '{other}', expected server_vad, semantic_vad or none"
        )),
    }
}
