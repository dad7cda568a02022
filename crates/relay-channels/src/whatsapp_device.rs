use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    channel::Channel,
    error::ChannelError,
    types::{ChannelKind, ChannelStatus, OutboundMessage},
};

/// The device-session WhatsApp variant pairs a real WhatsApp Web session
/// rather than going through Meta's hosted Cloud API, so this adapter talks
/// to a locally-run pairing bridge instead of `graph.facebook.com` directly.
/// `session_start`/`qr_code` back the gateway's session-start and
/// QR-retrieval endpoints (§6a).
pub struct WhatsAppDeviceAdapter {
    client: reqwest::Client,
    bridge_url: String,
    session_id: String,
    status: ChannelStatus,
}

impl WhatsAppDeviceAdapter {
    pub fn new(bridge_url: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            bridge_url: bridge_url.into(),
            session_id: session_id.into(),
            status: ChannelStatus::Disconnected,
        }
    }

    /// Start (or resume) pairing. The bridge begins generating a QR code;
    /// callers poll [`Self::qr_code`] until it returns `None`, which means
    /// the phone has scanned it and the session is live.
    pub async fn session_start(&mut self) -> Result<(), ChannelError> {
        let url = format!("{}/sessions/{}/start", self.bridge_url, self.session_id);
        self.client
            .post(&url)
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;
        self.status = ChannelStatus::Connecting;
        Ok(())
    }

    /// Fetch the current pairing QR code, base64-encoded PNG. `None` once
    /// the session has finished pairing.
    pub async fn qr_code(&mut self) -> Result<Option<String>, ChannelError> {
        let url = format!("{}/sessions/{}/qr", self.bridge_url, self.session_id);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ChannelError::ConnectionFailed(format!(
                "bridge returned {}",
                resp.status()
            )));
        }

        let parsed: QrResponse = resp
            .json()
            .await
            .map_err(|e| ChannelError::ConnectionFailed(format!("malformed response: {e}")))?;

        if parsed.qr.is_none() && parsed.paired {
            self.status = ChannelStatus::Connected;
        }
        Ok(parsed.qr)
    }
}

#[async_trait]
impl Channel for WhatsAppDeviceAdapter {
    fn name(&self) -> &str {
        "whatsapp_device"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::WhatsAppDevice
    }

    async fn connect(&mut self) -> Result<(), ChannelError> {
        self.session_start().await
    }

    async fn disconnect(&mut self) -> Result<(), ChannelError> {
        let url = format!("{}/sessions/{}/stop", self.bridge_url, self.session_id);
        self.client
            .post(&url)
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;
        self.status = ChannelStatus::Disconnected;
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<String, ChannelError> {
        let url = format!("{}/sessions/{}/messages", self.bridge_url, self.session_id);

        debug!(to = %msg.recipient_id, "sending WhatsApp device-session message");

        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "to": msg.recipient_id,
                "text": msg.text,
                "media_url": msg.media_url,
            }))
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            warn!(%status, body = %text, "WhatsApp device bridge rejected the message");
            return Err(ChannelError::SendFailed(format!("{status}: {text}")));
        }

        let parsed: SendResponse = resp
            .json()
            .await
            .map_err(|e| ChannelError::SendFailed(format!("malformed response: {e}")))?;
        Ok(parsed.id)
    }

    fn status(&self) -> ChannelStatus {
        self.status.clone()
    }
}

#[derive(Debug, Deserialize)]
struct QrResponse {
    qr: Option<String>,
    #[serde(default)]
    paired: bool,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}
