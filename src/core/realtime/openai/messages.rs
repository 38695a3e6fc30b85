//! OpenAI Realtime control-channel message types.
//!
//! All messages are newline-free JSON objects carried over the WebRTC data
//! channel, discriminated by their `type` field.
//!
//! # Protocol Overview
//!
//! Client events (sent to server):
//! - session.update - Initial session configuration, sent once on channel open
//! - input_audio_buffer.append / commit / clear
//! - conversation.item.create / retrieve / truncate / delete
//! - response.create / response.cancel
//! - transcription_session.update
//! - output_audio_buffer.clear
//!
//! Server events (received from server) are enumerated by [`ServerEvent`].
//! Only the transcript-bearing events and `error` carry typed fields; the rest
//! are logged as received.

use serde::{Deserialize, Serialize};

use super::config::{NoiseReductionType, TurnDetectionType};

// =============================================================================
// Session Configuration
// =============================================================================

/// Payload of the initial `session.update` message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// System instructions for the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Response modalities (text, audio)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    /// Input audio transcription configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<InputAudioTranscription>,

    /// Input noise reduction configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_noise_reduction: Option<NoiseReduction>,

    /// Tool definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,

    /// Sampling temperature, within [0.6, 1.2]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Turn detection configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,
}

/// Input audio transcription configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    /// Transcription model (e.g., "whisper-1", "gpt-4o-transcribe")
    pub model: String,
    /// Optional prompt guiding the transcription
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Optional ISO-639-1 input language
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Input noise reduction configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoiseReduction {
    #[serde(rename = "type")]
    pub reduction_type: NoiseReductionType,
}

/// Turn detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub detection_type: TurnDetectionType,
    /// Activation threshold (server VAD)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
    /// Audio included before detected speech, in ms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix_padding_ms: Option<u32>,
    /// Silence closing a turn, in ms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silence_duration_ms: Option<u32>,
    /// Whether a response is created when a turn ends
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_response: Option<bool>,
}

/// Function tool definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    /// Tool type (always "function")
    #[serde(rename = "type", default = "default_tool_type")]
    pub tool_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

fn default_tool_type() -> String {
    "function".to_string()
}

// =============================================================================
// Conversation Items
// =============================================================================

/// Conversation item sent with `conversation.item.create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Item type (message, function_call_output)
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentPart>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Content part within a conversation item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    /// Content type (input_text, input_audio, text, audio)
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Per-response overrides for `response.create`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

// =============================================================================
// Client Events (sent to server)
// =============================================================================

/// Client events sent over the control channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    /// Base64-encoded audio. Unused over WebRTC, where audio rides the media track.
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },

    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,

    #[serde(rename = "input_audio_buffer.clear")]
    InputAudioBufferClear,

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate {
        item: ConversationItem,
        #[serde(skip_serializing_if = "Option::is_none")]
        previous_item_id: Option<String>,
    },

    #[serde(rename = "conversation.item.retrieve")]
    ConversationItemRetrieve { item_id: String },

    #[serde(rename = "conversation.item.truncate")]
    ConversationItemTruncate {
        item_id: String,
        content_index: u32,
        audio_end_ms: u32,
    },

    #[serde(rename = "conversation.item.delete")]
    ConversationItemDelete { item_id: String },

    #[serde(rename = "response.create")]
    ResponseCreate {
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<ResponseConfig>,
    },

    #[serde(rename = "response.cancel")]
    ResponseCancel {
        #[serde(skip_serializing_if = "Option::is_none")]
        response_id: Option<String>,
    },

    #[serde(rename = "transcription_session.update")]
    TranscriptionSessionUpdate { session: serde_json::Value },

    /// Cut off the audio currently playing (WebRTC only)
    #[serde(rename = "output_audio_buffer.clear")]
    OutputAudioBufferClear,
}

impl ClientEvent {
    /// A user text message for the conversation.
    pub fn user_text(text: impl Into<String>) -> Self {
        ClientEvent::ConversationItemCreate {
            item: ConversationItem {
                id: None,
                item_type: "message".to_string(),
                role: Some("user".to_string()),
                content: Some(vec![ContentPart {
                    content_type: "input_text".to_string(),
                    text: Some(text.into()),
                }]),
                call_id: None,
                output: None,
            },
            previous_item_id: None,
        }
    }

    /// Ask the model to respond with the session defaults.
    pub fn create_response() -> Self {
        ClientEvent::ResponseCreate { response: None }
    }

    /// Wire type tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            Self::InputAudioBufferCommit => "input_audio_buffer.commit",
            Self::InputAudioBufferClear => "input_audio_buffer.clear",
            Self::ConversationItemCreate { .. } => "conversation.item.create",
            Self::ConversationItemRetrieve { .. } => "conversation.item.retrieve",
            Self::ConversationItemTruncate { .. } => "conversation.item.truncate",
            Self::ConversationItemDelete { .. } => "conversation.item.delete",
            Self::ResponseCreate { .. } => "response.create",
            Self::ResponseCancel { .. } => "response.cancel",
            Self::TranscriptionSessionUpdate { .. } => "transcription_session.update",
            Self::OutputAudioBufferClear => "output_audio_buffer.clear",
        }
    }

    /// Encode as a single-line JSON frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Server Events (received from server)
// =============================================================================

/// Server events received over the control channel.
///
/// The set is closed: the dispatcher matches it without a wildcard arm, so a
/// new variant does not compile until it is routed. Types outside the set
/// decode as [`ServerEvent::Unknown`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "error")]
    Error { error: ApiError },

    #[serde(rename = "session.created")]
    SessionCreated,

    #[serde(rename = "session.updated")]
    SessionUpdated,

    #[serde(rename = "conversation.created")]
    ConversationCreated,

    #[serde(rename = "conversation.item.created")]
    ConversationItemCreated,

    #[serde(rename = "conversation.item.retrieved")]
    ConversationItemRetrieved,

    /// User transcript finalized
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputTranscriptionCompleted {
        item_id: String,
        content_index: u32,
        transcript: String,
    },

    /// User transcript fragment
    #[serde(rename = "conversation.item.input_audio_transcription.delta")]
    InputTranscriptionDelta {
        #[serde(default)]
        item_id: Option<String>,
        delta: String,
    },

    #[serde(rename = "conversation.item.input_audio_transcription.failed")]
    InputTranscriptionFailed,

    #[serde(rename = "conversation.item.truncated")]
    ConversationItemTruncated,

    #[serde(rename = "conversation.item.deleted")]
    ConversationItemDeleted,

    #[serde(rename = "input_audio_buffer.committed")]
    InputAudioBufferCommitted,

    #[serde(rename = "input_audio_buffer.cleared")]
    InputAudioBufferCleared,

    /// Server VAD detected the start of user speech
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        audio_start_ms: Option<u64>,
        #[serde(default)]
        item_id: Option<String>,
    },

    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped,

    #[serde(rename = "response.created")]
    ResponseCreated,

    #[serde(rename = "response.done")]
    ResponseDone,

    #[serde(rename = "response.output_item.added")]
    OutputItemAdded,

    #[serde(rename = "response.output_item.done")]
    OutputItemDone,

    #[serde(rename = "response.content_part.added")]
    ContentPartAdded,

    #[serde(rename = "response.content_part.done")]
    ContentPartDone,

    #[serde(rename = "response.text.delta")]
    TextDelta,

    #[serde(rename = "response.text.done")]
    TextDone,

    /// Assistant transcript fragment
    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta {
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        item_id: Option<String>,
        delta: String,
    },

    /// Assistant transcript finalized
    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone {
        response_id: String,
        item_id: String,
        output_index: u32,
        content_index: u32,
        transcript: String,
    },

    #[serde(rename = "response.audio.delta")]
    AudioDelta,

    #[serde(rename = "response.audio.done")]
    AudioDone,

    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta,

    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone,

    #[serde(rename = "transcription_session.updated")]
    TranscriptionSessionUpdated,

    #[serde(rename = "rate_limits.updated")]
    RateLimitsUpdated,

    #[serde(rename = "output_audio_buffer.started")]
    OutputAudioBufferStarted,

    #[serde(rename = "output_audio_buffer.stopped")]
    OutputAudioBufferStopped,

    #[serde(rename = "output_audio_buffer.cleared")]
    OutputAudioBufferCleared,

    /// Any type outside the enumerated set
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Every server event type the client recognizes.
    pub const KNOWN_TYPES: [&'static str; 34] = [
        "error",
        "session.created",
        "session.updated",
        "conversation.created",
        "conversation.item.created",
        "conversation.item.retrieved",
        "conversation.item.input_audio_transcription.completed",
        "conversation.item.input_audio_transcription.delta",
        "conversation.item.input_audio_transcription.failed",
        "conversation.item.truncated",
        "conversation.item.deleted",
        "input_audio_buffer.committed",
        "input_audio_buffer.cleared",
        "input_audio_buffer.speech_started",
        "input_audio_buffer.speech_stopped",
        "response.created",
        "response.done",
        "response.output_item.added",
        "response.output_item.done",
        "response.content_part.added",
        "response.content_part.done",
        "response.text.delta",
        "response.text.done",
        "response.audio_transcript.delta",
        "response.audio_transcript.done",
        "response.audio.delta",
        "response.audio.done",
        "response.function_call_arguments.delta",
        "response.function_call_arguments.done",
        "transcription_session.updated",
        "rate_limits.updated",
        "output_audio_buffer.started",
        "output_audio_buffer.stopped",
        "output_audio_buffer.cleared",
    ];

    /// Decode from an already-parsed JSON object.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        ServerEvent::deserialize(value)
    }
}

// =============================================================================
// Supporting Types
// =============================================================================

/// Error details carried by an `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiError {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    /// Client event that caused the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({}): {}", self.error_type, code, self.message),
            None => write!(f, "{}: {}", self.error_type, self.message),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
