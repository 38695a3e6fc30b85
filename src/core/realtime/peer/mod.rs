//! WebRTC peer transport.
//!
//! Carries the local Opus track out, remote audio tracks in, and the
//! `realtime` data channel used as the control channel.

mod channel;
mod transport;

pub use channel::WebRtcControlChannel;
pub use transport::{PeerConnectionConfig, PeerState, WebRtcTransport, WebRtcTransportFactory};
