//! OpenAI Realtime API over WebRTC.
//!
//! This module provides the OpenAI-specific pieces of a realtime session:
//!
//! - Configuration types (models, voices, noise reduction, turn detection)
//! - Control-channel message types (`session.update` and the server event set)
//! - `HttpCredentialBroker`, which fetches an ephemeral `client_secret`
//! - `HttpSignaling`, which posts the SDP offer to `/v1/realtime`
//!
//! # Supported Voices
//!
//! alloy, ash, ballad, coral, echo, fable, onyx, nova, sage, shimmer, verse
//!
//! # Example
//!
//! ```rust,ignore
//! use waav_realtime_client::core::realtime::openai::{
//!     HttpCredentialBroker, HttpSignaling, OpenAIRealtimeModel, OpenAIRealtimeVoice,
//!     OPENAI_REALTIME_URL,
//! };
//!
//! let broker = HttpCredentialBroker::new("http://localhost:3001/api/realtime/sessions");
//! let signaling = HttpSignaling::new(
//!     OPENAI_REALTIME_URL,
//!     OpenAIRealtimeModel::default(),
//!     OpenAIRealtimeVoice::Alloy,
//! );
//! ```

mod config;
mod credential;
mod messages;
mod signaling;

pub use config::{
    DEFAULT_CHANNEL_LABEL, DEFAULT_INSTRUCTIONS, DEFAULT_TEMPERATURE, DEFAULT_TRANSCRIPTION_MODEL,
    MAX_TEMPERATURE, MIN_TEMPERATURE, Modality, NoiseReductionType, OPENAI_REALTIME_SESSIONS_URL,
    OPENAI_REALTIME_URL, OpenAIRealtimeModel, OpenAIRealtimeVoice, TurnDetectionType,
    clamp_temperature,
};
pub use credential::HttpCredentialBroker;
pub use messages::{
    ApiError, ClientEvent, ContentPart, ConversationItem, InputAudioTranscription, NoiseReduction,
    ResponseConfig, ServerEvent, SessionConfig, ToolDef, TurnDetection,
};
pub use signaling::HttpSignaling;
