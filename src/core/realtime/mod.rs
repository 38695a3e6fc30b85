//! Realtime voice session module.
//!
//! This module negotiates a WebRTC media + control connection with the OpenAI
//! Realtime service, streams local audio out, and rebuilds an ordered
//! conversation from the fine-grained events received on the control channel.
//!
//! # Architecture
//!
//! - [`RealtimeSession`] drives the connection lifecycle
//! - [`EventDispatcher`] decodes and routes every inbound control frame
//! - [`TranscriptReconciler`] merges streamed transcript deltas into messages
//! - [`MuteController`] toggles local track transmission
//! - Collaborator traits (`AudioCapture`, `CredentialBroker`, `TransportFactory`,
//!   `SignalingExchange`, `PlaybackSink`) isolate the network and devices
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use waav_realtime_client::core::realtime::{
//!     RealtimeSession, RealtimeSessionConfig, SessionBackends,
//!     openai::{HttpCredentialBroker, HttpSignaling, OPENAI_REALTIME_URL},
//!     peer::PeerConnectionConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let (backends, feeder, mut remote_streams) = SessionBackends::webrtc(
//!         HttpCredentialBroker::new("http://localhost:3001/api/realtime/sessions"),
//!         HttpSignaling::new(OPENAI_REALTIME_URL, Default::default(), Default::default()),
//!         PeerConnectionConfig::default(),
//!     );
//!     let mut session = RealtimeSession::new(RealtimeSessionConfig::default(), backends);
//!
//!     session.on_transcript(Arc::new(|m| Box::pin(async move {
//!         println!("[{}] {}", m.role, m.text);
//!     })));
//!
//!     session.connect().await.unwrap();
//!     // push Opus frames through `feeder`, play streams from `remote_streams`
//!     session.disconnect().await;
//! }
//! ```

mod base;
mod dispatcher;
mod media;
mod mute;
pub mod openai;
pub mod peer;
mod session;
mod transcript;

pub use base::{
    ChannelEvent, ControlChannel, ControlChannelHandle, ControlEventCallback, Credential,
    CredentialBroker, ErrorCategory, PeerTransport, RealtimeError, RealtimeResult, SdpType,
    SessionDescription, SessionStatus, SignalingExchange, TranscriptCallback, TranscriptRole,
    TransportFactory,
};
pub use dispatcher::{ControlEvent, DispatchOutcome, EventDispatcher, EventLog};
pub use media::{
    AudioCapture, AudioFeeder, AudioFrame, ChannelPlayback, LocalAudioTrack, LocalMediaStream,
    PlaybackSink, PushAudioCapture, RemoteAudioStream,
};
pub use mute::MuteController;
pub use session::{RealtimeSession, RealtimeSessionConfig, SessionBackends};
pub use transcript::{ConversationMessage, MessageStatus, TranscriptReconciler};
