//! OpenAI Realtime API configuration types.
//!
//! This module contains configuration types for OpenAI's Realtime API over WebRTC:
//! - Endpoints and defaults
//! - Model and voice selection
//! - Noise reduction, turn detection and modality options
//! - Temperature bounds

use serde::{Deserialize, Serialize};

/// OpenAI Realtime signaling endpoint (SDP offer/answer).
pub const OPENAI_REALTIME_URL: &str = "https://api.openai.com/v1/realtime";

/// OpenAI endpoint minting ephemeral session credentials.
pub const OPENAI_REALTIME_SESSIONS_URL: &str = "https://api.openai.com/v1/realtime/sessions";

/// Default control channel label.
pub const DEFAULT_CHANNEL_LABEL: &str = "realtime";

/// Default system instructions sent with `session.update`.
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful assistant.";

/// Default input transcription model.
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Lowest sampling temperature accepted by the Realtime API.
pub const MIN_TEMPERATURE: f32 = 0.6;

/// Highest sampling temperature accepted by the Realtime API.
pub const MAX_TEMPERATURE: f32 = 1.2;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = MIN_TEMPERATURE;

/// Clamp a temperature into the accepted range.
#[inline]
pub fn clamp_temperature(temperature: f32) -> f32 {
    if temperature.is_nan() {
        return DEFAULT_TEMPERATURE;
    }
    temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE)
}

// =============================================================================
// Models
// =============================================================================

/// Supported OpenAI Realtime models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OpenAIRealtimeModel {
    /// GPT-4o Realtime Preview model
    #[serde(rename = "gpt-4o-realtime-preview")]
    Gpt4oRealtimePreview,
    /// GPT-4o Realtime Preview 2024-12-17 (default)
    #[default]
    #[serde(rename = "gpt-4o-realtime-preview-2024-12-17")]
    Gpt4oRealtimePreview20241217,
    /// GPT-4o Mini Realtime Preview
    #[serde(rename = "gpt-4o-mini-realtime-preview")]
    Gpt4oMiniRealtimePreview,
    /// GPT-4o Mini Realtime Preview 2024-12-17
    #[serde(rename = "gpt-4o-mini-realtime-preview-2024-12-17")]
    Gpt4oMiniRealtimePreview20241217,
}

impl OpenAIRealtimeModel {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt4oRealtimePreview => "gpt-4o-realtime-preview",
            Self::Gpt4oRealtimePreview20241217 => "gpt-4o-realtime-preview-2024-12-17",
            Self::Gpt4oMiniRealtimePreview => "gpt-4o-mini-realtime-preview",
            Self::Gpt4oMiniRealtimePreview20241217 => "gpt-4o-mini-realtime-preview-2024-12-17",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "gpt-4o-realtime-preview" => Self::Gpt4oRealtimePreview,
            "gpt-4o-realtime-preview-2024-12-17" => Self::Gpt4oRealtimePreview20241217,
            "gpt-4o-mini-realtime-preview" => Self::Gpt4oMiniRealtimePreview,
            "gpt-4o-mini-realtime-preview-2024-12-17" => Self::Gpt4oMiniRealtimePreview20241217,
            _ => Self::default(),
        }
    }
}

impl std::fmt::Display for OpenAIRealtimeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Voices
// =============================================================================

/// Output voices for OpenAI Realtime sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAIRealtimeVoice {
    /// Alloy voice (default for signaling)
    #[default]
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Fable,
    Onyx,
    Nova,
    Sage,
    Shimmer,
    /// Verse voice (default for minted sessions)
    Verse,
}

impl OpenAIRealtimeVoice {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Fable => "fable",
            Self::Onyx => "onyx",
            Self::Nova => "nova",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        let lowered = s.to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|voice| voice.as_str() == lowered)
            .unwrap_or_default()
    }

    /// Get all available voices.
    pub fn all() -> &'static [OpenAIRealtimeVoice] {
        &[
            Self::Alloy,
            Self::Ash,
            Self::Ballad,
            Self::Coral,
            Self::Echo,
            Self::Fable,
            Self::Onyx,
            Self::Nova,
            Self::Sage,
            Self::Shimmer,
            Self::Verse,
        ]
    }
}

impl std::fmt::Display for OpenAIRealtimeVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Noise Reduction
// =============================================================================

/// Input noise reduction profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseReductionType {
    /// Close-talking microphones such as headsets (default)
    #[default]
    NearField,
    /// Far-field microphones such as laptop or conference-room mics
    FarField,
}

impl NoiseReductionType {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NearField => "near_field",
            Self::FarField => "far_field",
        }
    }
}

// =============================================================================
// Turn Detection
// =============================================================================

/// Turn detection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnDetectionType {
    /// Silence-based voice activity detection (default)
    #[default]
    ServerVad,
    /// Model-based end-of-turn detection
    SemanticVad,
}

impl TurnDetectionType {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServerVad => "server_vad",
            Self::SemanticVad => "semantic_vad",
        }
    }
}

// =============================================================================
// Modalities
// =============================================================================

/// Output modalities for OpenAI Realtime API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Text output
    Text,
    /// Audio output
    Audio,
}

impl Modality {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Audio => "audio",
        }
    }

    /// Text and audio.
    pub fn both() -> Vec<Modality> {
        vec![Self::Text, Self::Audio]
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_default_is_dated_preview() {
        assert_eq!(
            OpenAIRealtimeModel::default().as_str(),
            "gpt-4o-realtime-preview-2024-12-17"
        );
        assert_eq!(
            OpenAIRealtimeModel::from_str_or_default("GPT-4O-MINI-REALTIME-PREVIEW"),
            OpenAIRealtimeModel::Gpt4oMiniRealtimePreview
        );
        assert_eq!(
            OpenAIRealtimeModel::from_str_or_default("unknown"),
            OpenAIRealtimeModel::Gpt4oRealtimePreview20241217
        );
    }

    #[test]
    fn test_voice_from_str() {
        assert_eq!(
            OpenAIRealtimeVoice::from_str_or_default("NOVA"),
            OpenAIRealtimeVoice::Nova
        );
        assert_eq!(
            OpenAIRealtimeVoice::from_str_or_default("verse"),
            OpenAIRealtimeVoice::Verse
        );
        assert_eq!(
            OpenAIRealtimeVoice::from_str_or_default("unknown"),
            OpenAIRealtimeVoice::Alloy
        );
    }

    #[test]
    fn test_voice_all() {
        let voices = OpenAIRealtimeVoice::all();
        assert_eq!(voices.len(), 11);
        assert!(voices.contains(&OpenAIRealtimeVoice::Fable));
        assert!(voices.contains(&OpenAIRealtimeVoice::Onyx));
    }

    #[test]
    fn test_temperature_clamp() {
        assert_eq!(clamp_temperature(0.1), MIN_TEMPERATURE);
        assert_eq!(clamp_temperature(2.0), MAX_TEMPERATURE);
        assert_eq!(clamp_temperature(0.8), 0.8);
        assert_eq!(clamp_temperature(f32::NAN), DEFAULT_TEMPERATURE);
    }

    #[test]
    fn test_option_wire_names() {
        assert_eq!(
            serde_json::to_string(&NoiseReductionType::FarField).unwrap(),
            "\"far_field\""
        );
        assert_eq!(
            serde_json::to_string(&TurnDetectionType::SemanticVad).unwrap(),
            "\"semantic_vad\""
        );
        assert_eq!(NoiseReductionType::NearField.as_str(), "near_field");
        assert_eq!(Modality::both().len(), 2);
    }
}
