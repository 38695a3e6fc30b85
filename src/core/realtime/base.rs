//! Base traits and types for Realtime voice sessions.
//!
//! This module defines the shared vocabulary of the session client: the error
//! taxonomy, the session status state machine, the credential and session
//! description types, and the collaborator traits the negotiator drives
//! (credential broker, signaling exchange, peer transport, control channel).
//!
//! Media collaborators (capture and playback) live in [`super::media`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use zeroize::Zeroize;

use super::dispatcher::ControlEvent;
use super::media::{LocalAudioTrack, PlaybackSink};
use super::transcript::ConversationMessage;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while negotiating or running a realtime session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RealtimeError {
    /// Local media capture was denied or is unavailable
    #[error("Audio capture failed: {0}")]
    CaptureFailed(String),

    /// Credential broker unreachable or returned a malformed response
    #[error("Credential request failed: {0}")]
    CredentialFailed(String),

    /// Transport, control channel or signaling exchange setup failed
    #[error("Negotiation failed: {0}")]
    NegotiationFailed(String),

    /// Server sent an explicit error event
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Control channel or transport was lost after the session connected
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Operation not valid in the current session status
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// No live session
    #[error("Not connected")]
    NotConnected,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Coarse error category, used for surfacing failures to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Capture,
    Credential,
    Negotiation,
    Protocol,
    Session,
}

impl RealtimeError {
    /// Category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::CaptureFailed(_) => ErrorCategory::Capture,
            Self::CredentialFailed(_) => ErrorCategory::Credential,
            Self::NegotiationFailed(_) => ErrorCategory::Negotiation,
            Self::ProtocolError(_) => ErrorCategory::Protocol,
            Self::ConnectionLost(_)
            | Self::InvalidState(_)
            | Self::NotConnected
            | Self::InvalidConfiguration(_)
            | Self::SerializationError(_) => ErrorCategory::Session,
        }
    }

    /// Whether this error moves a session into the `error` status.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CaptureFailed(_)
                | Self::CredentialFailed(_)
                | Self::NegotiationFailed(_)
                | Self::ConnectionLost(_)
        )
    }
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Session Status
// =============================================================================

/// Session state machine.
///
/// `idle → connecting → requesting-ephemeral-token → creating-peer-connection → connected`,
/// with `error` reachable from any non-idle state and `idle` reachable again
/// through `disconnect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionStatus {
    /// No session resources held
    #[default]
    #[serde(rename = "idle")]
    Idle,
    /// Acquiring local audio capture
    #[serde(rename = "connecting")]
    Connecting,
    /// Waiting for the credential broker
    #[serde(rename = "requesting-ephemeral-token")]
    RequestingCredential,
    /// Building the peer transport and exchanging descriptions
    #[serde(rename = "creating-peer-connection")]
    CreatingTransport,
    /// Negotiation complete
    #[serde(rename = "connected")]
    Connected,
    /// Terminal failure; requires `disconnect` before the next `connect`
    #[serde(rename = "error")]
    Error,
}

impl SessionStatus {
    /// Wire name of the status.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::RequestingCredential => "requesting-ephemeral-token",
            Self::CreatingTransport => "creating-peer-connection",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }

    /// Whether a negotiation step is in flight.
    pub fn is_negotiating(&self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::RequestingCredential | Self::CreatingTransport
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Speaker Roles
// =============================================================================

/// Role of the speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    /// Local microphone speech
    User,
    /// Synthesized remote speech
    Assistant,
}

impl fmt::Display for TranscriptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptRole::User => write!(f, "user"),
            TranscriptRole::Assistant => write!(f, "assistant"),
        }
    }
}

// =============================================================================
// Credential
// =============================================================================

/// Short-lived bearer secret authorizing the signaling exchange.
///
/// Never persisted. The secret is wiped from memory on drop and is not
/// printed by `Debug`.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Credential {
    value: String,
    expires_at: i64,
}

impl Credential {
    pub fn new(value: impl Into<String>, expires_at: i64) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Expiry as unix seconds.
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Whether the credential has expired relative to `now` (unix seconds).
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// The `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

// =============================================================================
// Session Descriptions
// =============================================================================

/// SDP message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// An SDP-shaped session description exchanged during negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

// =============================================================================
// Control Channel Events
// =============================================================================

/// Lifecycle and message events surfaced by a control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Channel is open and may carry traffic
    Open,
    /// One inbound text frame
    Message(String),
    /// Channel closed by either side
    Closed,
    /// Underlying transport failed
    TransportFailed(String),
}

/// A control channel together with its inbound event stream.
pub struct ControlChannelHandle {
    pub channel: Arc<dyn ControlChannel>,
    pub events: mpsc::Receiver<ChannelEvent>,
}

// =============================================================================
// Collaborator Traits
// =============================================================================

/// Mints short-lived credentials for one session.
#[async_trait]
pub trait CredentialBroker: Send + Sync {
    async fn fetch_ephemeral_credential(&self) -> RealtimeResult<Credential>;
}

/// Exchanges the local offer for the remote answer.
///
/// The credential is taken by value: it is consumed by exactly one exchange.
#[async_trait]
pub trait SignalingExchange: Send + Sync {
    async fn exchange(
        &self,
        credential: Credential,
        offer: SessionDescription,
    ) -> RealtimeResult<SessionDescription>;
}

/// Message-oriented channel carried alongside the media transport.
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Channel label.
    fn label(&self) -> &str;

    /// Send one text frame.
    async fn send_text(&self, text: String) -> RealtimeResult<()>;

    /// Close the channel. Safe to call more than once.
    async fn close(&self) -> RealtimeResult<()>;
}

/// Peer transport carrying local audio out, remote audio in and the control channel.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Attach a captured local track.
    async fn add_track(&self, track: Arc<LocalAudioTrack>) -> RealtimeResult<()>;

    /// Route remote media streams to the given sink as they arrive.
    fn on_remote_stream(&self, sink: Arc<dyn PlaybackSink>);

    /// Open a control channel with the given label.
    async fn create_control_channel(&self, label: &str) -> RealtimeResult<ControlChannelHandle>;

    /// Produce a local offer.
    async fn create_offer(&self) -> RealtimeResult<SessionDescription>;

    /// Apply the local description.
    async fn set_local_description(&self, description: SessionDescription) -> RealtimeResult<()>;

    /// The local description as it should be sent to the remote peer.
    async fn local_description(&self) -> Option<SessionDescription>;

    /// Apply the remote description.
    async fn set_remote_description(&self, description: SessionDescription)
    -> RealtimeResult<()>;

    /// Close the transport. Safe to call more than once.
    async fn close(&self) -> RealtimeResult<()>;
}

/// Creates one peer transport per session.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(&self) -> RealtimeResult<Arc<dyn PeerTransport>>;
}

// =============================================================================
// Callback Types
// =============================================================================

/// Callback type for transcript updates.
pub type TranscriptCallback =
    Arc<dyn Fn(ConversationMessage) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for every logged control event.
pub type ControlEventCallback =
    Arc<dyn Fn(ControlEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;
