pub mod realtime;

// Re-export commonly used types for convenience
pub use realtime::{
    ConversationMessage, ControlEvent, RealtimeError, RealtimeResult, RealtimeSession,
    RealtimeSessionConfig, SessionBackends, SessionStatus, TranscriptRole,
};
