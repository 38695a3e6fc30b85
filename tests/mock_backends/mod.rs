//! In-process fakes for every session collaborator.
//!
//! Each fake records what the session asked of it so lifecycle tests can
//! assert on call order, released resources and frames written to the
//! control channel. Inbound control traffic is injected through
//! [`FakeTransport::emit`].

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use tokio::sync::{Notify, watch};

use waav_realtime_client::core::realtime::{
    AudioCapture, ChannelEvent, ControlChannel, ControlChannelHandle, Credential,
    CredentialBroker, LocalAudioTrack, LocalMediaStream, PeerTransport, PlaybackSink,
    RealtimeError, RealtimeResult, RealtimeSession, RemoteAudioStream, SessionBackends,
    SessionDescription, SessionStatus, SignalingExchange, TransportFactory,
};

pub const FAKE_SECRET: &str = "ek_test_secret";
pub const FAKE_OFFER: &str = "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\n";
pub const FAKE_ANSWER: &str = "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\n";

// =============================================================================
// Status Probe
// =============================================================================

/// Records the session status each collaborator observed when it was called.
#[derive(Default)]
pub struct StatusProbe {
    rx: Mutex<Option<watch::Receiver<SessionStatus>>>,
    seen: Mutex<Vec<(&'static str, SessionStatus)>>,
}

impl StatusProbe {
    pub fn attach(&self, session: &RealtimeSession) {
        *self.rx.lock() = Some(session.subscribe_status());
    }

    fn observe(&self, step: &'static str) {
        let status = self.rx.lock().as_ref().map(|rx| *rx.borrow());
        if let Some(status) = status {
            self.seen.lock().push((step, status));
        }
    }

    pub fn seen(&self) -> Vec<(&'static str, SessionStatus)> {
        self.seen.lock().clone()
    }
}

// =============================================================================
// Capture
// =============================================================================

#[derive(Default)]
pub struct FakeCapture {
    pub probe: Arc<StatusProbe>,
    pub fail: AtomicBool,
    pub tracks: Mutex<Vec<Arc<LocalAudioTrack>>>,
}

impl FakeCapture {
    pub fn last_track(&self) -> Option<Arc<LocalAudioTrack>> {
        self.tracks.lock().last().cloned()
    }
}

#[async_trait]
impl AudioCapture for FakeCapture {
    async fn acquire(&self) -> RealtimeResult<LocalMediaStream> {
        self.probe.observe("capture");
        if self.fail.load(Ordering::SeqCst) {
            return Err(RealtimeError::CaptureFailed("permission denied".to_string()));
        }
        let (_tx, rx) = mpsc::channel(1);
        let track = LocalAudioTrack::new(rx);
        self.tracks.lock().push(track.clone());
        Ok(LocalMediaStream::new(vec![track]))
    }
}

// =============================================================================
// Credentials
// =============================================================================

#[derive(Default)]
pub struct FakeCredentials {
    pub probe: Arc<StatusProbe>,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl CredentialBroker for FakeCredentials {
    async fn fetch_ephemeral_credential(&self) -> RealtimeResult<Credential> {
        self.probe.observe("credential");
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(RealtimeError::CredentialFailed("Broker returned 500".to_string()));
        }
        Ok(Credential::new(FAKE_SECRET, 4_102_444_800))
    }
}

// =============================================================================
// Control Channel
// =============================================================================

pub struct FakeChannel {
    label: String,
    pub sent: Mutex<Vec<String>>,
    pub closed: AtomicBool,
}

impl FakeChannel {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Frames written so far, decoded as JSON.
    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .iter()
            .map(|text| serde_json::from_str(text).unwrap())
            .collect()
    }

    pub fn sent_types(&self) -> Vec<String> {
        self.sent_json()
            .iter()
            .map(|v| v["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl ControlChannel for FakeChannel {
    fn label(&self) -> &str {
        &self.label
    }

    async fn send_text(&self, text: String) -> RealtimeResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RealtimeError::ConnectionLost("channel closed".to_string()));
        }
        self.sent.lock().push(text);
        Ok(())
    }

    async fn close(&self) -> RealtimeResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Transport
// =============================================================================

#[derive(Default)]
pub struct FakeTransport {
    pub calls: Mutex<Vec<&'static str>>,
    pub channel: Mutex<Option<Arc<FakeChannel>>>,
    events: Mutex<Option<mpsc::Sender<ChannelEvent>>>,
    local: Mutex<Option<SessionDescription>>,
    pub remote: Mutex<Option<SessionDescription>>,
    pub closed: AtomicBool,
    /// Fail `create_control_channel`
    pub fail_channel: AtomicBool,
}

impl FakeTransport {
    fn record(&self, call: &'static str) {
        self.calls.lock().push(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn channel(&self) -> Arc<FakeChannel> {
        self.channel.lock().clone().expect("control channel not created")
    }

    /// Inject one control channel event.
    pub async fn emit(&self, event: ChannelEvent) {
        let tx = self.events.lock().clone().expect("control channel not created");
        tx.send(event).await.expect("control loop stopped");
    }

    /// Whether the session's control loop has dropped its event receiver.
    pub fn control_loop_stopped(&self) -> bool {
        self.events.lock().as_ref().is_some_and(|tx| tx.is_closed())
    }

    pub async fn emit_json(&self, value: serde_json::Value) {
        self.emit(ChannelEvent::Message(value.to_string())).await;
    }
}

#[async_trait]
impl PeerTransport for FakeTransport {
    async fn add_track(&self, _track: Arc<LocalAudioTrack>) -> RealtimeResult<()> {
        self.record("add_track");
        Ok(())
    }

    fn on_remote_stream(&self, _sink: Arc<dyn PlaybackSink>) {
        self.record("on_remote_stream");
    }

    async fn create_control_channel(&self, label: &str) -> RealtimeResult<ControlChannelHandle> {
        self.record("create_control_channel");
        if self.fail_channel.load(Ordering::SeqCst) {
            return Err(RealtimeError::NegotiationFailed("data channel refused".to_string()));
        }
        let channel = Arc::new(FakeChannel::new(label));
        let (tx, rx) = mpsc::channel(64);
        *self.channel.lock() = Some(channel.clone());
        *self.events.lock() = Some(tx);
        Ok(ControlChannelHandle {
            channel,
            events: rx,
        })
    }

    async fn create_offer(&self) -> RealtimeResult<SessionDescription> {
        self.record("create_offer");
        Ok(SessionDescription::offer(FAKE_OFFER))
    }

    async fn set_local_description(&self, description: SessionDescription) -> RealtimeResult<()> {
        self.record("set_local_description");
        *self.local.lock() = Some(description);
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.local.lock().clone()
    }

    async fn set_remote_description(&self, description: SessionDescription) -> RealtimeResult<()> {
        self.record("set_remote_description");
        *self.remote.lock() = Some(description);
        Ok(())
    }

    async fn close(&self) -> RealtimeResult<()> {
        self.record("close");
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out fresh transports and keeps every one it created.
#[derive(Default)]
pub struct FakeTransportFactory {
    pub probe: Arc<StatusProbe>,
    pub fail: AtomicBool,
    /// Applied to each transport created afterwards
    pub fail_channel: AtomicBool,
    pub created: Mutex<Vec<Arc<FakeTransport>>>,
}

impl FakeTransportFactory {
    pub fn last(&self) -> Arc<FakeTransport> {
        self.created.lock().last().cloned().expect("no transport created")
    }

    pub fn count(&self) -> usize {
        self.created.lock().len()
    }
}

#[async_trait]
impl TransportFactory for FakeTransportFactory {
    async fn create(&self) -> RealtimeResult<Arc<dyn PeerTransport>> {
        self.probe.observe("transport");
        if self.fail.load(Ordering::SeqCst) {
            return Err(RealtimeError::NegotiationFailed("no ICE agent".to_string()));
        }
        let transport = Arc::new(FakeTransport::default());
        transport
            .fail_channel
            .store(self.fail_channel.load(Ordering::SeqCst), Ordering::SeqCst);
        self.created.lock().push(transport.clone());
        Ok(transport)
    }
}

// =============================================================================
// Signaling
// =============================================================================

#[derive(Default)]
pub struct FakeSignaling {
    pub probe: Arc<StatusProbe>,
    pub fail: AtomicBool,
    /// Never answer
    pub hang: AtomicBool,
    /// Hold the answer until `release` is notified
    pub gated: AtomicBool,
    pub release: Notify,
    /// `(authorization header, offer)` per exchange
    pub exchanges: Mutex<Vec<(String, SessionDescription)>>,
}

#[async_trait]
impl SignalingExchange for FakeSignaling {
    async fn exchange(
        &self,
        credential: Credential,
        offer: SessionDescription,
    ) -> RealtimeResult<SessionDescription> {
        self.probe.observe("signaling");
        self.exchanges.lock().push((credential.bearer(), offer));
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.gated.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(RealtimeError::NegotiationFailed(
                "Signaling returned 401 Unauthorized".to_string(),
            ));
        }
        Ok(SessionDescription::answer(FAKE_ANSWER))
    }
}

// =============================================================================
// Playback
// =============================================================================

#[derive(Default)]
pub struct FakePlayback {
    pub played: AtomicUsize,
}

impl PlaybackSink for FakePlayback {
    fn play(&self, _stream: RemoteAudioStream) {
        self.played.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Harness
// =============================================================================

/// Every fake, shared with the [`SessionBackends`] handed to the session.
#[derive(Clone)]
pub struct FakeBackends {
    pub probe: Arc<StatusProbe>,
    pub capture: Arc<FakeCapture>,
    pub credentials: Arc<FakeCredentials>,
    pub transports: Arc<FakeTransportFactory>,
    pub signaling: Arc<FakeSignaling>,
    pub playback: Arc<FakePlayback>,
}

impl FakeBackends {
    pub fn new() -> Self {
        let probe = Arc::new(StatusProbe::default());
        Self {
            capture: Arc::new(FakeCapture {
                probe: probe.clone(),
                ..Default::default()
            }),
            credentials: Arc::new(FakeCredentials {
                probe: probe.clone(),
                ..Default::default()
            }),
            transports: Arc::new(FakeTransportFactory {
                probe: probe.clone(),
                ..Default::default()
            }),
            signaling: Arc::new(FakeSignaling {
                probe: probe.clone(),
                ..Default::default()
            }),
            playback: Arc::new(FakePlayback::default()),
            probe,
        }
    }

    pub fn backends(&self) -> SessionBackends {
        SessionBackends {
            capture: self.capture.clone(),
            credentials: self.credentials.clone(),
            transports: self.transports.clone(),
            signaling: self.signaling.clone(),
            playback: self.playback.clone(),
        }
    }
}

/// Poll `check` until it holds or a second elapses.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
