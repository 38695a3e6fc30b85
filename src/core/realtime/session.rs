//! Realtime session negotiator.
//!
//! A [`RealtimeSession`] owns one connection lifecycle:
//!
//! ```text
//! idle → connecting → requesting-ephemeral-token → creating-peer-connection → connected
//!           └──────────────────┴───────────────────────────┴──────────────────────┴→ error
//! ```
//!
//! Inbound control frames are processed by a single control loop task that is
//! the only writer of the event log and transcript. The host reads snapshots,
//! subscribes to status changes, or registers async callbacks.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::base::{
    ChannelEvent, ControlChannel, ControlEventCallback, CredentialBroker,
    ErrorCategory, PeerTransport, RealtimeError, RealtimeResult, SessionStatus, SignalingExchange,
    TranscriptCallback, TransportFactory,
};
use super::dispatcher::{ControlEvent, EventDispatcher};
use super::media::{
    AudioCapture, AudioFeeder, ChannelPlayback, LocalMediaStream, PlaybackSink, PushAudioCapture,
    RemoteAudioStream,
};
use super::mute::MuteController;
use super::openai::{
    ClientEvent, DEFAULT_CHANNEL_LABEL, DEFAULT_INSTRUCTIONS, DEFAULT_TEMPERATURE,
    DEFAULT_TRANSCRIPTION_MODEL, HttpCredentialBroker, HttpSignaling, InputAudioTranscription,
    Modality, NoiseReduction, NoiseReductionType, SessionConfig, ToolDef, TurnDetection,
    clamp_temperature,
};
use super::peer::{PeerConnectionConfig, WebRtcTransportFactory};
use super::transcript::ConversationMessage;

/// Capacity of the outbound client event queue.
const OUTBOUND_CAPACITY: usize = 64;

// =============================================================================
// Configuration
// =============================================================================

/// Session options sent with the initial `session.update`.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeSessionConfig {
    /// Control channel label
    pub channel_label: String,
    pub instructions: String,
    pub modalities: Vec<Modality>,
    /// Input transcription model
    pub transcription_model: String,
    pub transcription_prompt: Option<String>,
    pub transcription_language: Option<String>,
    /// `None` disables input noise reduction
    pub noise_reduction: Option<NoiseReductionType>,
    pub tools: Vec<ToolDef>,
    /// Clamped to [0.6, 1.2] when sent
    pub temperature: f32,
    /// `None` keeps the server default
    pub turn_detection: Option<TurnDetection>,
}

impl Default for RealtimeSessionConfig {
    fn default() -> Self {
        Self {
            channel_label: DEFAULT_CHANNEL_LABEL.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            modalities: Modality::both(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            transcription_prompt: None,
            transcription_language: None,
            noise_reduction: Some(NoiseReductionType::NearField),
            tools: Vec::new(),
            temperature: DEFAULT_TEMPERATURE,
            turn_detection: None,
        }
    }
}

impl RealtimeSessionConfig {
    /// The `session.update` event sent when the control channel opens.
    pub fn session_update(&self) -> ClientEvent {
        ClientEvent::SessionUpdate {
            session: SessionConfig {
                instructions: Some(self.instructions.clone()),
                modalities: Some(
                    self.modalities
                        .iter()
                        .map(|m| m.as_str().to_string())
                        .collect(),
                ),
                input_audio_transcription: Some(InputAudioTranscription {
                    model: self.transcription_model.clone(),
                    prompt: self.transcription_prompt.clone(),
                    language: self.transcription_language.clone(),
                }),
                input_audio_noise_reduction: self
                    .noise_reduction
                    .map(|reduction_type| NoiseReduction { reduction_type }),
                tools: Some(self.tools.clone()),
                temperature: Some(clamp_temperature(self.temperature)),
                turn_detection: self.turn_detection.clone(),
            },
        }
    }
}

// =============================================================================
// Backends
// =============================================================================

/// External collaborators driven by the negotiator.
#[derive(Clone)]
pub struct SessionBackends {
    pub capture: Arc<dyn AudioCapture>,
    pub credentials: Arc<dyn CredentialBroker>,
    pub transports: Arc<dyn TransportFactory>,
    pub signaling: Arc<dyn SignalingExchange>,
    pub playback: Arc<dyn PlaybackSink>,
}

impl SessionBackends {
    /// WebRTC transport with HTTP credential and signaling collaborators.
    ///
    /// Returns the feeder the host pushes encoded microphone frames into and
    /// the receiver of remote audio streams.
    pub fn webrtc(
        credentials: HttpCredentialBroker,
        signaling: HttpSignaling,
        peer: PeerConnectionConfig,
    ) -> (Self, AudioFeeder, mpsc::Receiver<RemoteAudioStream>) {
        let (capture, feeder) = PushAudioCapture::new();
        let (playback, remote_streams) = ChannelPlayback::new();
        let backends = Self {
            capture: Arc::new(capture),
            credentials: Arc::new(credentials),
            transports: Arc::new(WebRtcTransportFactory::new(peer)),
            signaling: Arc::new(signaling),
            playback: Arc::new(playback),
        };
        (backends, feeder, remote_streams)
    }
}

/// Registered host callbacks.
#[derive(Default)]
struct Callbacks {
    transcript: RwLock<Option<TranscriptCallback>>,
    event: RwLock<Option<ControlEventCallback>>,
}

// =============================================================================
// Session
// =============================================================================

/// One realtime voice session.
pub struct RealtimeSession {
    config: RealtimeSessionConfig,
    backends: SessionBackends,

    status: Arc<watch::Sender<SessionStatus>>,
    last_error: Arc<RwLock<Option<RealtimeError>>>,
    /// Control channel loss observed before `connected`
    pending_loss: Arc<Mutex<Option<RealtimeError>>>,
    dispatcher: Arc<RwLock<EventDispatcher>>,
    callbacks: Arc<Callbacks>,
    mute: MuteController,

    stream: Option<LocalMediaStream>,
    transport: Option<Arc<dyn PeerTransport>>,
    channel: Option<Arc<dyn ControlChannel>>,
    outbound: Option<mpsc::Sender<ClientEvent>>,
    control_task: Option<JoinHandle<()>>,
}

impl RealtimeSession {
    pub fn new(config: RealtimeSessionConfig, backends: SessionBackends) -> Self {
        let (status, _) = watch::channel(SessionStatus::Idle);
        Self {
            config,
            backends,
            status: Arc::new(status),
            last_error: Arc::new(RwLock::new(None)),
            pending_loss: Arc::new(Mutex::new(None)),
            dispatcher: Arc::new(RwLock::new(EventDispatcher::new())),
            callbacks: Arc::new(Callbacks::default()),
            mute: MuteController::new(),
            stream: None,
            transport: None,
            channel: None,
            outbound: None,
            control_task: None,
        }
    }

    pub fn config(&self) -> &RealtimeSessionConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Negotiate a session. Valid only from `idle`.
    ///
    /// On failure the session moves to `error`, keeps the cause in
    /// [`last_error`](Self::last_error), releases everything acquired so far
    /// and returns the cause. There are no retries.
    pub async fn connect(&mut self) -> RealtimeResult<()> {
        let current = self.status();
        if current != SessionStatus::Idle {
            return Err(RealtimeError::InvalidState(format!(
                "connect requires an idle session, status is {}",
                current
            )));
        }

        let result = match self.negotiate().await {
            Ok(()) => self.promote(),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            tracing::error!(category = ?e.category(), "Realtime session failed: {}", e);
            self.release().await;
            self.mute.reset();
            self.dispatcher.write().clear();
            *self.last_error.write() = Some(e.clone());
            set_status(&self.status, SessionStatus::Error);
            return Err(e);
        }
        Ok(())
    }

    /// Move to `connected` unless the control loop already saw the channel go.
    ///
    /// Holding `pending_loss` orders this against `ControlLoop::connection_lost`.
    fn promote(&self) -> RealtimeResult<()> {
        let mut pending = self.pending_loss.lock();
        if let Some(loss) = pending.take() {
            return Err(RealtimeError::NegotiationFailed(format!(
                "control channel lost during negotiation: {}",
                loss
            )));
        }
        set_status(&self.status, SessionStatus::Connected);
        Ok(())
    }

    async fn negotiate(&mut self) -> RealtimeResult<()> {
        set_status(&self.status, SessionStatus::Connecting);
        let stream = self
            .backends
            .capture
            .acquire()
            .await
            .map_err(within(ErrorCategory::Capture, RealtimeError::CaptureFailed))?;
        let track = stream.first_track().cloned();
        self.stream = Some(stream);
        let track = track.ok_or_else(|| {
            RealtimeError::CaptureFailed("capture produced no audio track".to_string())
        })?;

        set_status(&self.status, SessionStatus::RequestingCredential);
        let credential = self
            .backends
            .credentials
            .fetch_ephemeral_credential()
            .await
            .map_err(within(ErrorCategory::Credential, RealtimeError::CredentialFailed))?;

        set_status(&self.status, SessionStatus::CreatingTransport);
        let negotiation = within(ErrorCategory::Negotiation, RealtimeError::NegotiationFailed);

        let transport = self.backends.transports.create().await.map_err(negotiation)?;
        self.transport = Some(transport.clone());
        transport.add_track(track).await.map_err(negotiation)?;
        transport.on_remote_stream(self.backends.playback.clone());

        let handle = transport
            .create_control_channel(&self.config.channel_label)
            .await
            .map_err(negotiation)?;
        self.channel = Some(handle.channel.clone());

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        self.outbound = Some(outbound_tx);
        let control_loop = ControlLoop {
            channel: handle.channel,
            session_update: self.config.session_update(),
            dispatcher: self.dispatcher.clone(),
            status: self.status.clone(),
            last_error: self.last_error.clone(),
            pending_loss: self.pending_loss.clone(),
            callbacks: self.callbacks.clone(),
        };
        self.control_task = Some(tokio::spawn(control_loop.run(handle.events, outbound_rx)));

        let offer = transport.create_offer().await.map_err(negotiation)?;
        transport
            .set_local_description(offer.clone())
            .await
            .map_err(negotiation)?;
        let local = transport.local_description().await.unwrap_or(offer);

        let answer = self
            .backends
            .signaling
            .exchange(credential, local)
            .await
            .map_err(negotiation)?;
        transport
            .set_remote_description(answer)
            .await
            .map_err(negotiation)?;

        Ok(())
    }

    /// Tear down the session and return to `idle`. Infallible and idempotent.
    pub async fn disconnect(&mut self) {
        self.release().await;
        self.mute.reset();
        self.dispatcher.write().clear();
        *self.last_error.write() = None;
        set_status(&self.status, SessionStatus::Idle);
    }

    /// Release every held resource. A failure on one never blocks the rest.
    async fn release(&mut self) {
        if let Some(task) = self.control_task.take() {
            task.abort();
        }
        self.outbound = None;
        self.pending_loss.lock().take();

        if let Some(transport) = self.transport.take()
            && let Err(e) = transport.close().await
        {
            tracing::warn!("Failed to close peer transport: {}", e);
        }

        if let Some(channel) = self.channel.take()
            && let Err(e) = channel.close().await
        {
            tracing::warn!(label = channel.label(), "Failed to close control channel: {}", e);
        }

        if let Some(stream) = self.stream.take() {
            stream.stop();
        }
    }

    /// Queue a client event for the control channel.
    ///
    /// Events are written after the initial `session.update`.
    pub async fn send(&self, event: ClientEvent) -> RealtimeResult<()> {
        if self.status() != SessionStatus::Connected {
            return Err(RealtimeError::NotConnected);
        }
        let outbound = self.outbound.as_ref().ok_or(RealtimeError::NotConnected)?;
        outbound
            .send(event)
            .await
            .map_err(|_| RealtimeError::NotConnected)
    }

    // -------------------------------------------------------------------------
    // Mute
    // -------------------------------------------------------------------------

    /// Flip local transmission. Returns the new mute state.
    pub fn toggle_mute(&mut self) -> bool {
        self.mute.toggle(self.stream.as_ref())
    }

    pub fn mute(&mut self) {
        self.mute.mute(self.stream.as_ref());
    }

    pub fn unmute(&mut self) {
        self.mute.unmute(self.stream.as_ref());
    }

    // -------------------------------------------------------------------------
    // Read models
    // -------------------------------------------------------------------------

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Receive every status transition.
    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == SessionStatus::Connected
    }

    /// Cause of the last failure, cleared by `disconnect`.
    pub fn last_error(&self) -> Option<RealtimeError> {
        self.last_error.read().clone()
    }

    /// Conversation snapshot in turn-open order.
    pub fn conversation(&self) -> Vec<ConversationMessage> {
        self.dispatcher.read().conversation().to_vec()
    }

    /// Event log snapshot in arrival order.
    pub fn events(&self) -> Vec<ControlEvent> {
        self.dispatcher.read().events().to_vec()
    }

    pub fn muted(&self) -> bool {
        self.mute.is_muted()
    }

    // -------------------------------------------------------------------------
    // Callbacks
    // -------------------------------------------------------------------------

    /// Called with each conversation message changed by an inbound event.
    pub fn on_transcript(&self, callback: TranscriptCallback) {
        *self.callbacks.transcript.write() = Some(callback);
    }

    /// Called with each logged control event.
    pub fn on_event(&self, callback: ControlEventCallback) {
        *self.callbacks.event.write() = Some(callback);
    }
}

/// Dropping a live session closes its transport and channel on the current
/// runtime. Outside a runtime only the tracks and the control loop are stopped.
impl Drop for RealtimeSession {
    fn drop(&mut self) {
        if let Some(task) = self.control_task.take() {
            task.abort();
        }
        if let Some(stream) = self.stream.take() {
            stream.stop();
        }

        let transport = self.transport.take();
        let channel = self.channel.take();
        if transport.is_none() && channel.is_none() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Some(transport) = transport
                        && let Err(e) = transport.close().await
                    {
                        tracing::warn!("Failed to close dropped peer transport: {}", e);
                    }
                    if let Some(channel) = channel
                        && let Err(e) = channel.close().await
                    {
                        tracing::warn!("Failed to close dropped control channel: {}", e);
                    }
                });
            }
            Err(_) => tracing::warn!("Session dropped outside a runtime, transport left open"),
        }
    }
}

fn set_status(status: &watch::Sender<SessionStatus>, next: SessionStatus) {
    let changed = status.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        *current = next;
        true
    });
    if changed {
        tracing::info!(status = %next, "Realtime session status changed");
    }
}

/// Keep errors already in `category`, wrap anything else.
fn within(
    category: ErrorCategory,
    wrap: fn(String) -> RealtimeError,
) -> impl Fn(RealtimeError) -> RealtimeError + Copy {
    move |e| {
        if e.category() == category {
            e
        } else {
            wrap(e.to_string())
        }
    }
}

// =============================================================================
// Control Loop
// =============================================================================

struct ControlLoop {
    channel: Arc<dyn ControlChannel>,
    session_update: ClientEvent,
    dispatcher: Arc<RwLock<EventDispatcher>>,
    status: Arc<watch::Sender<SessionStatus>>,
    last_error: Arc<RwLock<Option<RealtimeError>>>,
    pending_loss: Arc<Mutex<Option<RealtimeError>>>,
    callbacks: Arc<Callbacks>,
}

impl ControlLoop {
    async fn run(
        self,
        mut events: mpsc::Receiver<ChannelEvent>,
        mut outbound: mpsc::Receiver<ClientEvent>,
    ) {
        let mut opened = false;

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(ChannelEvent::Open) => {
                        if !opened {
                            opened = true;
                            self.write(&self.session_update).await;
                        }
                    }
                    Some(ChannelEvent::Message(text)) => self.handle_frame(&text).await,
                    Some(ChannelEvent::Closed) | None => {
                        self.connection_lost("control channel closed");
                        break;
                    }
                    Some(ChannelEvent::TransportFailed(reason)) => {
                        self.connection_lost(&reason);
                        break;
                    }
                },
                Some(event) = outbound.recv(), if opened => {
                    self.write(&event).await;
                }
            }
        }

        tracing::debug!("Control loop stopped");
    }

    async fn write(&self, event: &ClientEvent) {
        let text = match event.to_json() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(event_type = event.event_type(), "Failed to encode client event: {}", e);
                return;
            }
        };
        match self.channel.send_text(text).await {
            Ok(()) => tracing::debug!(event_type = event.event_type(), "Sent client event"),
            Err(e) => tracing::warn!(event_type = event.event_type(), "Failed to send client event: {}", e),
        }
    }

    async fn handle_frame(&self, text: &str) {
        let outcome = {
            let mut dispatcher = self.dispatcher.write();
            dispatcher.dispatch_text(text)
        };
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Dropping control frame: {}", e);
                return;
            }
        };

        if let Some(message) = outcome.transcript_update {
            let callback = self.callbacks.transcript.read().clone();
            if let Some(cb) = callback {
                cb(message).await;
            }
        }

        let callback = self.callbacks.event.read().clone();
        if let Some(cb) = callback {
            cb(outcome.event).await;
        }
    }

    /// Move a connected session to `error`. A loss during negotiation is
    /// parked in `pending_loss` and fails the `connect` in flight.
    fn connection_lost(&self, reason: &str) {
        let error = RealtimeError::ConnectionLost(reason.to_string());
        let mut pending = self.pending_loss.lock();
        if *self.status.borrow() != SessionStatus::Connected {
            tracing::warn!("Control channel ended before connect completed: {}", reason);
            *pending = Some(error);
            return;
        }
        drop(pending);
        tracing::error!("Realtime session lost: {}", error);
        *self.last_error.write() = Some(error);
        set_status(&self.status, SessionStatus::Error);
    }
}
