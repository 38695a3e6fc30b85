//! Local capture and remote playback collaborators.
//!
//! The client never encodes or decodes audio. Captured audio enters as
//! already-encoded frames (Opus for the WebRTC transport) pushed by the host
//! through an [`AudioFeeder`]; remote audio leaves as RTP payloads handed to a
//! [`PlaybackSink`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use super::base::RealtimeResult;

/// Capacity of the per-track frame queue.
const CAPTURE_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the remote stream hand-off queue.
const PLAYBACK_CHANNEL_CAPACITY: usize = 8;

/// One encoded audio frame.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Encoded payload
    pub data: Bytes,
    /// Playback duration of the frame
    pub duration: Duration,
}

impl AudioFrame {
    pub fn new(data: impl Into<Bytes>, duration: Duration) -> Self {
        Self {
            data: data.into(),
            duration,
        }
    }
}

// =============================================================================
// Local Tracks
// =============================================================================

/// A captured local audio track.
///
/// `enabled` is the per-track transmission flag toggled by the mute
/// controller. Stopping a track is permanent.
pub struct LocalAudioTrack {
    id: String,
    enabled: AtomicBool,
    stop: CancellationToken,
    frames: Mutex<Option<mpsc::Receiver<AudioFrame>>>,
}

impl LocalAudioTrack {
    pub fn new(frames: mpsc::Receiver<AudioFrame>) -> Arc<Self> {
        Arc::new(Self {
            id: uuid::Uuid::new_v4().to_string(),
            enabled: AtomicBool::new(true),
            stop: CancellationToken::new(),
            frames: Mutex::new(Some(frames)),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Release the capture. Idempotent.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Resolves once the track is stopped.
    pub fn stopped(&self) -> WaitForCancellationFuture<'_> {
        self.stop.cancelled()
    }

    /// Take the frame queue. The transport that sends the track takes it once.
    pub fn take_frames(&self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.frames.lock().take()
    }
}

impl std::fmt::Debug for LocalAudioTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAudioTrack")
            .field("id", &self.id)
            .field("enabled", &self.is_enabled())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// The set of tracks obtained from one capture acquisition.
#[derive(Debug, Clone, Default)]
pub struct LocalMediaStream {
    tracks: Vec<Arc<LocalAudioTrack>>,
}

impl LocalMediaStream {
    pub fn new(tracks: Vec<Arc<LocalAudioTrack>>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[Arc<LocalAudioTrack>] {
        &self.tracks
    }

    /// The track attached to the transport.
    pub fn first_track(&self) -> Option<&Arc<LocalAudioTrack>> {
        self.tracks.first()
    }

    /// Stop every track.
    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

/// Acquires local audio capture.
#[async_trait]
pub trait AudioCapture: Send + Sync {
    async fn acquire(&self) -> RealtimeResult<LocalMediaStream>;
}

// =============================================================================
// Push Capture
// =============================================================================

/// Capture fed by the host application through an [`AudioFeeder`].
///
/// Each acquisition creates a fresh single-track stream; the feeder always
/// writes into the most recent one. Frames pushed while no capture is live are
/// discarded.
pub struct PushAudioCapture {
    current: Arc<Mutex<Option<mpsc::Sender<AudioFrame>>>>,
}

impl PushAudioCapture {
    pub fn new() -> (Self, AudioFeeder) {
        let current = Arc::new(Mutex::new(None));
        (
            Self {
                current: current.clone(),
            },
            AudioFeeder { current },
        )
    }
}

#[async_trait]
impl AudioCapture for PushAudioCapture {
    async fn acquire(&self) -> RealtimeResult<LocalMediaStream> {
        let (tx, rx) = mpsc::channel(CAPTURE_CHANNEL_CAPACITY);
        let track = LocalAudioTrack::new(rx);
        *self.current.lock() = Some(tx);
        tracing::debug!(track_id = track.id(), "Local audio capture acquired");
        Ok(LocalMediaStream::new(vec![track]))
    }
}

/// Host-side handle pushing encoded frames into the live capture.
#[derive(Clone)]
pub struct AudioFeeder {
    current: Arc<Mutex<Option<mpsc::Sender<AudioFrame>>>>,
}

impl AudioFeeder {
    /// Push one frame. Returns `false` when the frame was dropped (no live
    /// capture, or the transport is not keeping up).
    pub fn push(&self, frame: AudioFrame) -> bool {
        let mut current = self.current.lock();
        let Some(tx) = current.as_ref() else {
            return false;
        };
        match tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::trace!("Capture queue full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                *current = None;
                false
            }
        }
    }
}

// =============================================================================
// Playback
// =============================================================================

/// A remote media stream exposed for playback.
#[derive(Debug)]
pub struct RemoteAudioStream {
    pub stream_id: String,
    pub mime_type: String,
    pub clock_rate: u32,
    /// Encoded payloads in arrival order
    pub frames: mpsc::Receiver<Bytes>,
}

/// Routes remote streams to an output device.
pub trait PlaybackSink: Send + Sync {
    fn play(&self, stream: RemoteAudioStream);
}

/// Playback sink that hands remote streams to the host over a channel.
pub struct ChannelPlayback {
    tx: mpsc::Sender<RemoteAudioStream>,
}

impl ChannelPlayback {
    pub fn new() -> (Self, mpsc::Receiver<RemoteAudioStream>) {
        let (tx, rx) = mpsc::channel(PLAYBACK_CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }
}

impl PlaybackSink for ChannelPlayback {
    fn play(&self, stream: RemoteAudioStream) {
        let stream_id = stream.stream_id.clone();
        if let Err(e) = self.tx.try_send(stream) {
            tracing::warn!(stream_id = %stream_id, "Dropping remote stream: {}", e);
        } else {
            tracing::info!(stream_id = %stream_id, "Remote audio stream ready for playback");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_capture_routes_frames_to_latest_track() {
        let (capture, feeder) = PushAudioCapture::new();
        assert!(!feeder.push(AudioFrame::new(vec![1u8], Duration::from_millis(20))));

        let stream = capture.acquire().await.unwrap();
        let track = stream.first_track().unwrap().clone();
        let mut frames = track.take_frames().unwrap();
        assert!(track.take_frames().is_none());

        assert!(feeder.push(AudioFrame::new(vec![7u8, 8], Duration::from_millis(20))));
        let frame = frames.recv().await.unwrap();
        assert_eq!(frame.data.as_ref(), &[7u8, 8]);
    }

    #[tokio::test]
    async fn test_feeder_forgets_closed_capture() {
        let (capture, feeder) = PushAudioCapture::new();
        let stream = capture.acquire().await.unwrap();
        drop(stream.first_track().unwrap().take_frames());

        assert!(!feeder.push(AudioFrame::new(vec![1u8], Duration::from_millis(20))));
        assert!(capture.current.lock().is_none());
    }

    #[tokio::test]
    async fn test_track_stop_is_idempotent() {
        let (_tx, rx) = mpsc::channel(1);
        let track = LocalAudioTrack::new(rx);
        assert!(track.is_enabled());
        assert!(!track.is_stopped());

        track.stop();
        track.stop();
        assert!(track.is_stopped());
        track.stopped().await;
    }

    #[tokio::test]
    async fn test_channel_playback_hands_off_stream() {
        let (sink, mut streams) = ChannelPlayback::new();
        let (frame_tx, frame_rx) = mpsc::channel(1);
        sink.play(RemoteAudioStream {
            stream_id: "remote".to_string(),
            mime_type: "audio/opus".to_string(),
            clock_rate: 48000,
            frames: frame_rx,
        });

        let mut stream = streams.recv().await.unwrap();
        assert_eq!(stream.stream_id, "remote");
        frame_tx.send(Bytes::from_static(b"rtp")).await.unwrap();
        assert_eq!(stream.frames.recv().await.unwrap().as_ref(), b"rtp");
    }
}
