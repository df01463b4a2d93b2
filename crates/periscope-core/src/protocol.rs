//! Wire envelope shared by both directions of the viewer socket.
//!
//! Every text frame is a JSON object `{"type": <tag>, "payload": <value>}`.
//! Inbound frames carry commands; outbound frames carry base64 JPEG
//! screenshots under the [`SCREENSHOT`] tag.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DecodeError;

/// Outbound tag for a screenshot frame.
pub const SCREENSHOT: &str = "screenshot";

/// Inbound message tags.
pub mod tags {
    /// Navigate the page.
    pub const OPEN_URL: &str = "open_url";
    /// Click at a viewport coordinate.
    pub const CLICK_AT: &str = "click_at";
    /// Scroll by a percentage of the viewport height.
    pub const SCROLL: &str = "scroll";
    /// Touch swipe between two points.
    pub const SWIPE: &str = "swipe";
    /// Write text into the focused element.
    pub const TYPE_TEXT: &str = "type_text";
    /// Hardware-style button press.
    pub const SEND_BUTTON: &str = "send_button";

    /// Every tag the relay accepts.
    pub const ALL: [&str; 6] = [OPEN_URL, CLICK_AT, SCROLL, SWIPE, TYPE_TEXT, SEND_BUTTON];
}

/// Generic `{type, payload}` envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Message tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Tag-specific payload; absent payloads decode as `null`.
    #[serde(default)]
    pub payload: Value,
}

impl WireMessage {
    /// Parse a text frame into an envelope.
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build an envelope from parts.
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// Outbound screenshot frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameMessage {
    #[serde(rename = "type")]
    kind: &'static str,
    payload: String,
}

impl FrameMessage {
    /// Wrap raw JPEG bytes as a base64 screenshot frame.
    pub fn from_jpeg(bytes: &[u8]) -> Self {
        Self {
            kind: SCREENSHOT,
            payload: STANDARD.encode(bytes),
        }
    }

    /// Base64 payload.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Serialize to the JSON text sent on the socket.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
