//! WebRTC peer connection management.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MediaEngine};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

use super::channel::WebRtcControlChannel;
use crate::core::realtime::base::{
    ChannelEvent, ControlChannelHandle, PeerTransport, RealtimeError, RealtimeResult, SdpType,
    SessionDescription, TransportFactory,
};
use crate::core::realtime::media::{LocalAudioTrack, PlaybackSink, RemoteAudioStream};

/// Capacity of the control channel event queue.
const CHANNEL_EVENT_CAPACITY: usize = 256;

/// Capacity of each remote track's payload queue.
const REMOTE_FRAME_CAPACITY: usize = 256;

const OPUS_CLOCK_RATE: u32 = 48000;
const OPUS_CHANNELS: u16 = 2;

/// Peer connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerState {
    /// Connection not yet established
    New,
    /// ICE checking / DTLS handshake
    Connecting,
    /// Media flowing
    Connected,
    /// Temporarily lost connectivity; may recover
    Disconnected,
    /// Connection failed
    Failed,
    /// Connection closed
    Closed,
}

impl From<RTCPeerConnectionState> for PeerState {
    fn from(state: RTCPeerConnectionState) -> Self {
        match state {
            RTCPeerConnectionState::New => PeerState::New,
            RTCPeerConnectionState::Connecting => PeerState::Connecting,
            RTCPeerConnectionState::Connected => PeerState::Connected,
            RTCPeerConnectionState::Disconnected => PeerState::Disconnected,
            RTCPeerConnectionState::Failed => PeerState::Failed,
            RTCPeerConnectionState::Closed => PeerState::Closed,
            _ => PeerState::New,
        }
    }
}

/// Configuration for peer connections
#[derive(Debug, Clone)]
pub struct PeerConnectionConfig {
    /// ICE servers for NAT traversal
    pub ice_servers: Vec<String>,
    /// Upper bound on ICE gathering before the offer is sent
    pub gathering_timeout: Duration,
}

impl Default for PeerConnectionConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            gathering_timeout: Duration::from_secs(5),
        }
    }
}

fn rtc_error(context: &str) -> impl Fn(webrtc::Error) -> RealtimeError + '_ {
    move |e| RealtimeError::NegotiationFailed(format!("{}: {}", context, e))
}

/// Builds one WebRTC peer connection per session.
#[derive(Debug, Clone, Default)]
pub struct WebRtcTransportFactory {
    config: PeerConnectionConfig,
}

impl WebRtcTransportFactory {
    pub fn new(config: PeerConnectionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TransportFactory for WebRtcTransportFactory {
    async fn create(&self) -> RealtimeResult<Arc<dyn PeerTransport>> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(rtc_error("Codec registration failed"))?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)
            .map_err(rtc_error("Interceptor registration failed"))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers: Vec<RTCIceServer> = self
            .config
            .ice_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .collect();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let pc = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .map_err(rtc_error("Peer connection creation failed"))?,
        );

        Ok(Arc::new(WebRtcTransport::new(
            pc,
            self.config.gathering_timeout,
        )))
    }
}

/// Peer transport backed by an `RTCPeerConnection`.
pub struct WebRtcTransport {
    pc: Arc<RTCPeerConnection>,
    gathering_timeout: Duration,
    /// Where a failed peer connection is reported once the control channel exists
    failure_tx: Arc<Mutex<Option<mpsc::Sender<ChannelEvent>>>>,
}

impl WebRtcTransport {
    fn new(pc: Arc<RTCPeerConnection>, gathering_timeout: Duration) -> Self {
        let failure_tx: Arc<Mutex<Option<mpsc::Sender<ChannelEvent>>>> =
            Arc::new(Mutex::new(None));

        let slot = failure_tx.clone();
        pc.on_peer_connection_state_change(Box::new(move |state| {
            let peer_state = PeerState::from(state);
            tracing::info!(state = ?peer_state, "Peer connection state changed");
            let tx = if peer_state == PeerState::Failed {
                slot.lock().clone()
            } else {
                None
            };
            Box::pin(async move {
                if let Some(tx) = tx {
                    let _ = tx
                        .send(ChannelEvent::TransportFailed(
                            "peer connection failed".to_string(),
                        ))
                        .await;
                }
            })
        }));

        pc.on_ice_connection_state_change(Box::new(move |state| {
            tracing::debug!(ice_state = ?state, "ICE connection state changed");
            Box::pin(async {})
        }));

        Self {
            pc,
            gathering_timeout,
            failure_tx,
        }
    }

    /// Forward payloads of one remote track until it ends or the consumer goes away.
    async fn pump_remote_track(track: Arc<TrackRemote>, frames: mpsc::Sender<bytes::Bytes>) {
        loop {
            match track.read_rtp().await {
                Ok((packet, _attributes)) => {
                    if packet.payload.is_empty() {
                        continue;
                    }
                    if frames.send(packet.payload).await.is_err() {
                        tracing::debug!("Playback consumer dropped");
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!("Remote track read ended: {}", e);
                    break;
                }
            }
        }
    }

    /// Write captured frames to the local track. Frames of a disabled track are dropped.
    async fn pump_local_track(
        track: Arc<LocalAudioTrack>,
        mut frames: mpsc::Receiver<crate::core::realtime::media::AudioFrame>,
        local: Arc<TrackLocalStaticSample>,
    ) {
        loop {
            tokio::select! {
                _ = track.stopped() => break,
                frame = frames.recv() => {
                    let Some(frame) = frame else { break };
                    if !track.is_enabled() {
                        continue;
                    }
                    let sample = Sample {
                        data: frame.data,
                        duration: frame.duration,
                        ..Default::default()
                    };
                    if let Err(e) = local.write_sample(&sample).await {
                        tracing::warn!(track_id = track.id(), "Failed to write audio sample: {}", e);
                    }
                }
            }
        }
        tracing::debug!(track_id = track.id(), "Local audio pump stopped");
    }
}

#[async_trait]
impl PeerTransport for WebRtcTransport {
    async fn add_track(&self, track: Arc<LocalAudioTrack>) -> RealtimeResult<()> {
        let local = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: OPUS_CLOCK_RATE,
                channels: OPUS_CHANNELS,
                ..Default::default()
            },
            "audio".to_owned(),
            track.id().to_owned(),
        ));

        let rtp_sender = self
            .pc
            .add_track(Arc::clone(&local) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(rtc_error("Failed to add local track"))?;

        // RTCP must be drained for interceptors to run.
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while rtp_sender.read(&mut rtcp_buf).await.is_ok() {}
        });

        match track.take_frames() {
            Some(frames) => {
                tokio::spawn(Self::pump_local_track(track, frames, local));
            }
            None => tracing::warn!(track_id = track.id(), "Local track already attached"),
        }
        Ok(())
    }

    fn on_remote_stream(&self, sink: Arc<dyn PlaybackSink>) {
        self.pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let sink = sink.clone();
            Box::pin(async move {
                if track.kind() != RTPCodecType::Audio {
                    return;
                }
                let codec = track.codec();
                tracing::info!(
                    codec = %codec.capability.mime_type,
                    clock_rate = codec.capability.clock_rate,
                    "Remote audio track received"
                );

                let (tx, rx) = mpsc::channel(REMOTE_FRAME_CAPACITY);
                sink.play(RemoteAudioStream {
                    stream_id: track.stream_id(),
                    mime_type: codec.capability.mime_type.clone(),
                    clock_rate: codec.capability.clock_rate,
                    frames: rx,
                });
                tokio::spawn(Self::pump_remote_track(track, tx));
            })
        }));
    }

    async fn create_control_channel(&self, label: &str) -> RealtimeResult<ControlChannelHandle> {
        let dc = self
            .pc
            .create_data_channel(label, None)
            .await
            .map_err(rtc_error("Failed to create control channel"))?;

        let (tx, rx) = mpsc::channel(CHANNEL_EVENT_CAPACITY);
        *self.failure_tx.lock() = Some(tx.clone());
        let channel = WebRtcControlChannel::attach(dc, tx);

        Ok(ControlChannelHandle {
            channel: Arc::new(channel),
            events: rx,
        })
    }

    async fn create_offer(&self) -> RealtimeResult<SessionDescription> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(rtc_error("Failed to create offer"))?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn set_local_description(&self, description: SessionDescription) -> RealtimeResult<()> {
        let rtc = to_rtc(description)?;
        let mut gather_complete = self.pc.gathering_complete_promise().await;
        self.pc
            .set_local_description(rtc)
            .await
            .map_err(rtc_error("Failed to set local description"))?;

        if tokio::time::timeout(self.gathering_timeout, gather_complete.recv())
            .await
            .is_err()
        {
            tracing::warn!(
                timeout_ms = self.gathering_timeout.as_millis() as u64,
                "ICE gathering incomplete, sending offer with partial candidates"
            );
        }
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        let description = self.pc.local_description().await?;
        match description.sdp_type {
            RTCSdpType::Offer => Some(SessionDescription::offer(description.sdp)),
            RTCSdpType::Answer => Some(SessionDescription::answer(description.sdp)),
            _ => None,
        }
    }

    async fn set_remote_description(&self, description: SessionDescription) -> RealtimeResult<()> {
        let rtc = to_rtc(description)?;
        self.pc
            .set_remote_description(rtc)
            .await
            .map_err(rtc_error("Failed to apply remote description"))
    }

    async fn close(&self) -> RealtimeResult<()> {
        self.failure_tx.lock().take();
        self.pc
            .close()
            .await
            .map_err(|e| RealtimeError::ConnectionLost(format!("Peer connection close failed: {}", e)))
    }
}

fn to_rtc(description: SessionDescription) -> RealtimeResult<RTCSessionDescription> {
    let parsed = match description.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(description.sdp),
        SdpType::Answer => RTCSessionDescription::answer(description.sdp),
    };
    parsed.map_err(|e| RealtimeError::NegotiationFailed(format!("Invalid SDP: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::base::ControlChannel;

    #[test]
    fn test_peer_state_from_rtc() {
        assert_eq!(PeerState::from(RTCPeerConnectionState::New), PeerState::New);
        assert_eq!(
            PeerState::from(RTCPeerConnectionState::Connected),
            PeerState::Connected
        );
        assert_eq!(
            PeerState::from(RTCPeerConnectionState::Disconnected),
            PeerState::Disconnected
        );
        assert_eq!(
            PeerState::from(RTCPeerConnectionState::Failed),
            PeerState::Failed
        );
    }

    #[test]
    fn test_config_defaults() {
        let config = PeerConnectionConfig::default();
        assert!(!config.ice_servers.is_empty());
        assert_eq!(config.gathering_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_sdp_is_negotiation_error() {
        let err = to_rtc(SessionDescription::answer("not sdp")).unwrap_err();
        assert!(matches!(err, RealtimeError::NegotiationFailed(_)));
    }

    #[tokio::test]
    async fn test_offer_carries_audio_and_data_channel() {
        let factory = WebRtcTransportFactory::new(PeerConnectionConfig {
            ice_servers: vec![],
            gathering_timeout: Duration::from_millis(500),
        });
        let transport = factory.create().await.unwrap();

        let (_tx, rx) = mpsc::channel(1);
        transport.add_track(LocalAudioTrack::new(rx)).await.unwrap();
        let handle = transport.create_control_channel("realtime").await.unwrap();
        assert_eq!(handle.channel.label(), "realtime");

        let offer = transport.create_offer().await.unwrap();
        assert_eq!(offer.sdp_type, SdpType::Offer);
        transport.set_local_description(offer).await.unwrap();

        let local = transport.local_description().await.unwrap();
        assert!(local.sdp.contains("m=audio"));
        assert!(local.sdp.contains("m=application"));

        transport.close().await.unwrap();
        transport.close().await.unwrap();
    }
}
