//! Control-channel event dispatch.
//!
//! Every inbound text frame is decoded once, routed to the transcript
//! reconciler when it carries transcript data, and then appended to the
//! session's event log.

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use super::base::{RealtimeError, RealtimeResult, TranscriptRole};
use super::openai::ServerEvent;
use super::transcript::{ConversationMessage, TranscriptReconciler};

/// One decoded control-channel message, exactly as received.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlEvent {
    pub event_id: Option<String>,
    /// The `type` tag, empty when the frame carried none
    pub event_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub received_at: OffsetDateTime,
    pub payload: Value,
}

/// Append-only record of every control message received during a session.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<ControlEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, event: ControlEvent) {
        self.events.push(event);
    }

    /// Events in arrival order.
    pub fn events(&self) -> &[ControlEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn clear(&mut self) {
        self.events.clear();
    }
}

/// Result of dispatching one frame.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// The logged event
    pub event: ControlEvent,
    /// The decoded variant
    pub server_event: ServerEvent,
    /// The conversation message changed by this event, if any
    pub transcript_update: Option<ConversationMessage>,
}

/// Classifies inbound frames and owns the event log and transcript.
#[derive(Debug, Default)]
pub struct EventDispatcher {
    log: EventLog,
    reconciler: TranscriptReconciler,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch one inbound text frame.
    ///
    /// Frames that are not a JSON object are rejected and never logged.
    /// Transcript events are reconciled before the event is appended.
    pub fn dispatch_text(&mut self, raw: &str) -> RealtimeResult<DispatchOutcome> {
        let payload: Value = serde_json::from_str(raw)
            .map_err(|e| RealtimeError::SerializationError(format!("Invalid control frame: {}", e)))?;
        if !payload.is_object() {
            return Err(RealtimeError::SerializationError(
                "Control frame is not a JSON object".to_string(),
            ));
        }

        let event_type = payload
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let event_id = payload
            .get("event_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        let server_event = match ServerEvent::from_value(&payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(event_type = %event_type, "Undecodable server event, passing through: {}", e);
                ServerEvent::Unknown
            }
        };

        let transcript_update = self.route(&server_event, &event_type);

        let event = ControlEvent {
            event_id,
            event_type,
            received_at: OffsetDateTime::now_utc(),
            payload,
        };
        self.log.push(event.clone());

        Ok(DispatchOutcome {
            event,
            server_event,
            transcript_update,
        })
    }

    fn route(&mut self, event: &ServerEvent, event_type: &str) -> Option<ConversationMessage> {
        use TranscriptRole::{Assistant, User};

        match event {
            ServerEvent::AudioTranscriptDelta { delta, .. } => {
                if self.reconciler.is_open(Assistant) {
                    self.reconciler.append(Assistant, delta).cloned()
                } else {
                    Some(self.reconciler.open(Assistant, delta).clone())
                }
            }
            ServerEvent::AudioTranscriptDone { transcript, .. } => {
                tracing::debug!("Assistant transcript: {}", transcript);
                self.reconciler.close(Assistant, transcript).cloned()
            }
            ServerEvent::SpeechStarted { audio_start_ms, .. } => {
                tracing::debug!(audio_start_ms = ?audio_start_ms, "Speech started");
                Some(self.reconciler.open(User, "").clone())
            }
            ServerEvent::InputTranscriptionDelta { delta, .. } => {
                self.reconciler.append(User, delta).cloned()
            }
            ServerEvent::InputTranscriptionCompleted { transcript, .. } => {
                tracing::debug!("User transcript: {}", transcript);
                self.reconciler.close(User, transcript).cloned()
            }
            ServerEvent::Error { error } => {
                tracing::warn!(
                    "Realtime protocol error: {}",
                    RealtimeError::ProtocolError(error.to_string())
                );
                None
            }
            ServerEvent::SessionCreated | ServerEvent::SessionUpdated => {
                tracing::debug!(event_type, "Session acknowledged");
                None
            }
            ServerEvent::Unknown => {
                tracing::debug!(event_type, "Unrecognized server event");
                None
            }
            ServerEvent::ConversationCreated
            | ServerEvent::ConversationItemCreated
            | ServerEvent::ConversationItemRetrieved
            | ServerEvent::InputTranscriptionFailed
            | ServerEvent::ConversationItemTruncated
            | ServerEvent::ConversationItemDeleted
            | ServerEvent::InputAudioBufferCommitted
            | ServerEvent::InputAudioBufferCleared
            | ServerEvent::SpeechStopped
            | ServerEvent::ResponseCreated
            | ServerEvent::ResponseDone
            | ServerEvent::OutputItemAdded
            | ServerEvent::OutputItemDone
            | ServerEvent::ContentPartAdded
            | ServerEvent::ContentPartDone
            | ServerEvent::TextDelta
            | ServerEvent::TextDone
            | ServerEvent::AudioDelta
            | ServerEvent::AudioDone
            | ServerEvent::FunctionCallArgumentsDelta
            | ServerEvent::FunctionCallArgumentsDone
            | ServerEvent::TranscriptionSessionUpdated
            | ServerEvent::RateLimitsUpdated
            | ServerEvent::OutputAudioBufferStarted
            | ServerEvent::OutputAudioBufferStopped
            | ServerEvent::OutputAudioBufferCleared => {
                tracing::trace!(event_type, "Server event");
                None
            }
        }
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Events in arrival order.
    pub fn events(&self) -> &[ControlEvent] {
        self.log.events()
    }

    /// Conversation in turn-open order.
    pub fn conversation(&self) -> &[ConversationMessage] {
        self.reconciler.messages()
    }

    pub fn reconciler(&self) -> &TranscriptReconciler {
        &self.reconciler
    }

    /// Drop the event log and transcript.
    pub fn clear(&mut self) {
        self.log.clear();
        self.reconciler.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::transcript::MessageStatus;
    use serde_json::json;

    fn frame(value: Value) -> String {
        value.to_string()
    }

    #[test]
    fn test_assistant_delta_stream_then_done() {
        let mut dispatcher = EventDispatcher::new();
        for delta in ["Hel", "lo"] {
            dispatcher
                .dispatch_text(&frame(json!({
                    "type": "response.audio_transcript.delta",
                    "delta": delta
                })))
                .unwrap();
        }
        let outcome = dispatcher
            .dispatch_text(&frame(json!({
                "type": "response.audio_transcript.done",
                "response_id": "r",
                "item_id": "i",
                "output_index": 0,
                "content_index": 0,
                "transcript": "Hello there"
            })))
            .unwrap();

        let conversation = dispatcher.conversation();
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation[0].role, TranscriptRole::Assistant);
        assert_eq!(conversation[0].text, "Hello there");
        assert_eq!(conversation[0].status, MessageStatus::Final);
        assert_eq!(outcome.transcript_update.unwrap().text, "Hello there");
        assert_eq!(dispatcher.events().len(), 3);
    }

    #[test]
    fn test_first_assistant_delta_opens_with_text() {
        let mut dispatcher = EventDispatcher::new();
        let outcome = dispatcher
            .dispatch_text(&frame(json!({
                "type": "response.audio_transcript.delta",
                "delta": "Sure"
            })))
            .unwrap();

        let message = outcome.transcript_update.unwrap();
        assert_eq!(message.text, "Sure");
        assert_eq!(message.status, MessageStatus::Processing);
    }

    #[test]
    fn test_user_turn_interleaved_with_assistant() {
        let mut dispatcher = EventDispatcher::new();
        let frames = [
            json!({"type": "input_audio_buffer.speech_started", "audio_start_ms": 10, "item_id": "u1"}),
            json!({"type": "response.audio_transcript.delta", "delta": "Sure"}),
            json!({"type": "conversation.item.input_audio_transcription.completed",
                   "item_id": "u1", "content_index": 0, "transcript": "Can you help?"}),
            json!({"type": "response.audio_transcript.done", "response_id": "r", "item_id": "a1",
                   "output_index": 0, "content_index": 0, "transcript": "Sure thing."}),
        ];
        for f in frames {
            dispatcher.dispatch_text(&frame(f)).unwrap();
        }

        let conversation = dispatcher.conversation();
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation[0].role, TranscriptRole::User);
        assert_eq!(conversation[0].text, "Can you help?");
        assert_eq!(conversation[1].role, TranscriptRole::Assistant);
        assert_eq!(conversation[1].text, "Sure thing.");
        assert!(conversation.iter().all(ConversationMessage::is_final));
    }

    #[test]
    fn test_speech_started_without_transcription_stays_speaking() {
        let mut dispatcher = EventDispatcher::new();
        dispatcher
            .dispatch_text(&frame(json!({"type": "input_audio_buffer.speech_started"})))
            .unwrap();

        let conversation = dispatcher.conversation();
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation[0].text, "");
        assert_eq!(conversation[0].status, MessageStatus::Speaking);
    }

    #[test]
    fn test_user_delta_appends_to_open_turn() {
        let mut dispatcher = EventDispatcher::new();
        dispatcher
            .dispatch_text(&frame(json!({"type": "input_audio_buffer.speech_started"})))
            .unwrap();
        dispatcher
            .dispatch_text(&frame(json!({
                "type": "conversation.item.input_audio_transcription.delta",
                "item_id": "u1",
                "delta": "Can"
            })))
            .unwrap();

        assert_eq!(dispatcher.conversation()[0].text, "Can");
    }

    #[test]
    fn test_unknown_event_is_logged_not_reconciled() {
        let mut dispatcher = EventDispatcher::new();
        let raw = json!({"event_id": "e1", "type": "response.brand_new", "nested": {"a": [1, 2]}});
        let outcome = dispatcher.dispatch_text(&frame(raw.clone())).unwrap();

        assert_eq!(outcome.server_event, ServerEvent::Unknown);
        assert!(outcome.transcript_update.is_none());
        assert!(dispatcher.conversation().is_empty());
        assert_eq!(dispatcher.events().len(), 1);
        assert_eq!(dispatcher.events()[0].payload, raw);
        assert_eq!(dispatcher.events()[0].event_id.as_deref(), Some("e1"));
        assert_eq!(dispatcher.events()[0].event_type, "response.brand_new");
    }

    #[test]
    fn test_malformed_typed_fields_pass_through_as_unknown() {
        let mut dispatcher = EventDispatcher::new();
        let outcome = dispatcher
            .dispatch_text(&frame(json!({"type": "response.audio_transcript.done", "transcript": 7})))
            .unwrap();

        assert_eq!(outcome.server_event, ServerEvent::Unknown);
        assert!(dispatcher.conversation().is_empty());
        assert_eq!(dispatcher.events().len(), 1);
    }

    #[test]
    fn test_invalid_json_is_rejected_and_not_logged() {
        let mut dispatcher = EventDispatcher::new();
        let err = dispatcher.dispatch_text("{not json").unwrap_err();
        assert!(matches!(err, RealtimeError::SerializationError(_)));

        let err = dispatcher.dispatch_text("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, RealtimeError::SerializationError(_)));
        assert!(dispatcher.events().is_empty());
    }

    #[test]
    fn test_error_event_is_logged_not_fatal() {
        let mut dispatcher = EventDispatcher::new();
        let outcome = dispatcher
            .dispatch_text(&frame(json!({
                "type": "error",
                "error": {"type": "invalid_request_error", "message": "bad"}
            })))
            .unwrap();

        assert!(matches!(outcome.server_event, ServerEvent::Error { .. }));
        assert_eq!(dispatcher.events().len(), 1);
    }

    #[test]
    fn test_frame_without_type_is_logged_with_empty_type() {
        let mut dispatcher = EventDispatcher::new();
        let outcome = dispatcher.dispatch_text(r#"{"hello": "world"}"#).unwrap();
        assert_eq!(outcome.event.event_type, "");
        assert_eq!(outcome.server_event, ServerEvent::Unknown);
        assert_eq!(dispatcher.log().len(), 1);
    }

    #[test]
    fn test_log_preserves_arrival_order() {
        let mut dispatcher = EventDispatcher::new();
        for i in 0..5 {
            dispatcher
                .dispatch_text(&frame(json!({"event_id": format!("e{}", i), "type": "rate_limits.updated"})))
                .unwrap();
        }
        let ids: Vec<_> = dispatcher
            .events()
            .iter()
            .map(|e| e.event_id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec!["e0", "e1", "e2", "e3", "e4"]);
    }

    #[test]
    fn test_clear_resets_log_and_conversation() {
        let mut dispatcher = EventDispatcher::new();
        dispatcher
            .dispatch_text(&frame(json!({"type": "response.audio_transcript.delta", "delta": "x"})))
            .unwrap();
        dispatcher.clear();

        assert!(dispatcher.events().is_empty());
        assert!(dispatcher.conversation().is_empty());
        assert!(!dispatcher.reconciler().is_open(TranscriptRole::Assistant));
    }
}
