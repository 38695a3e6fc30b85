//! Local microphone mute control.
//!
//! Muting flips the `enabled` flag on every captured track; the transport
//! drops frames of a disabled track. Nothing is sent over the control channel.

use super::media::LocalMediaStream;

/// Tracks whether local transmission is suppressed.
#[derive(Debug, Default)]
pub struct MuteController {
    muted: bool,
}

impl MuteController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Disable every track of the active stream. No-op without one.
    pub fn mute(&mut self, stream: Option<&LocalMediaStream>) {
        self.set(stream, true);
    }

    /// Re-enable every track of the active stream. No-op without one.
    pub fn unmute(&mut self, stream: Option<&LocalMediaStream>) {
        self.set(stream, false);
    }

    /// Flip the mute state. Returns the new state.
    pub fn toggle(&mut self, stream: Option<&LocalMediaStream>) -> bool {
        if self.muted {
            self.unmute(stream);
        } else {
            self.mute(stream);
        }
        self.muted
    }

    /// Back to unmuted, without touching any track.
    pub fn reset(&mut self) {
        self.muted = false;
    }

    fn set(&mut self, stream: Option<&LocalMediaStream>, muted: bool) {
        let Some(stream) = stream else {
            return;
        };
        for track in stream.tracks() {
            track.set_enabled(!muted);
        }
        self.muted = muted;
        tracing::info!(muted, "Local audio {}", if muted { "muted" } else { "unmuted" });
    }
}
