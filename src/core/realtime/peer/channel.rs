//! Data channel used as the control channel.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;

use crate::core::realtime::base::{ChannelEvent, ControlChannel, RealtimeError, RealtimeResult};

/// Control channel backed by an `RTCDataChannel`.
pub struct WebRtcControlChannel {
    label: String,
    inner: Arc<RTCDataChannel>,
}

impl WebRtcControlChannel {
    /// Wrap a data channel and forward its lifecycle and text frames to `events`.
    pub(super) fn attach(inner: Arc<RTCDataChannel>, events: mpsc::Sender<ChannelEvent>) -> Self {
        let label = inner.label().to_string();

        let tx = events.clone();
        inner.on_open(Box::new(move || {
            Box::pin(async move {
                tracing::info!("Control channel open");
                let _ = tx.send(ChannelEvent::Open).await;
            })
        }));

        let tx = events.clone();
        inner.on_message(Box::new(move |msg: DataChannelMessage| {
            let tx = tx.clone();
            Box::pin(async move {
                if !msg.is_string {
                    tracing::debug!(len = msg.data.len(), "Ignoring binary control frame");
                    return;
                }
                match String::from_utf8(msg.data.to_vec()) {
                    Ok(text) => {
                        let _ = tx.send(ChannelEvent::Message(text)).await;
                    }
                    Err(e) => tracing::warn!("Control frame is not UTF-8: {}", e),
                }
            })
        }));

        let tx = events;
        inner.on_close(Box::new(move || {
            let tx = tx.clone();
            Box::pin(async move {
                tracing::info!("Control channel closed");
                let _ = tx.send(ChannelEvent::Closed).await;
            })
        }));

        Self { label, inner }
    }
}

#[async_trait]
impl ControlChannel for WebRtcControlChannel {
    fn label(&self) -> &str {
        &self.label
    }

    async fn send_text(&self, text: String) -> RealtimeResult<()> {
        self.inner
            .send_text(text)
            .await
            .map(|_| ())
            .map_err(|e| RealtimeError::ConnectionLost(format!("Control channel send failed: {}", e)))
    }

    async fn close(&self) -> RealtimeResult<()> {
        self.inner
            .close()
            .await
            .map_err(|e| RealtimeError::ConnectionLost(format!("Control channel close failed: {}", e)))
    }
}
