//! Typed viewer commands.
//!
//! [`Command::decode`] is the single place where a raw [`WireMessage`] is
//! validated. Everything downstream works on the closed [`Command`] type.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::errors::DecodeError;
use crate::input::scroll::ScrollDirection;
use crate::input::swipe::SwipeGesture;
use crate::protocol::{WireMessage, tags};

/// Hardware-style buttons a viewer can press.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Button {
    /// Raise system volume one step.
    VolumeUp,
    /// Lower system volume one step.
    VolumeDown,
    /// Leave fullscreen in the page.
    ExitFullscreen,
    /// Power off the host.
    Shutdown,
}

impl Button {
    /// Wire name of the button.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VolumeUp => "volume_up",
            Self::VolumeDown => "volume_down",
            Self::ExitFullscreen => "exit_fullscreen",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Button {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "volume_up" => Ok(Self::VolumeUp),
            "volume_down" => Ok(Self::VolumeDown),
            "exit_fullscreen" => Ok(Self::ExitFullscreen),
            "shutdown" => Ok(Self::Shutdown),
            other => Err(DecodeError::UnknownButton(other.to_owned())),
        }
    }
}

/// A validated viewer command.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Navigate to a URL.
    OpenUrl(String),
    /// Left-click at viewport coordinates.
    ClickAt {
        /// Horizontal position in CSS pixels.
        x: f64,
        /// Vertical position in CSS pixels.
        y: f64,
    },
    /// Scroll by a percentage of the viewport height.
    Scroll {
        /// Up or down.
        direction: ScrollDirection,
        /// Percent of `innerHeight`; never negative.
        percent: f64,
    },
    /// Touch swipe.
    Swipe(SwipeGesture),
    /// Replace the focused element's value.
    TypeText(String),
    /// Button press.
    SendButton(Button),
}

#[derive(Deserialize)]
struct ClickPayload {
    x: f64,
    y: f64,
}

#[derive(Deserialize)]
struct ScrollPayload {
    direction: ScrollDirection,
    percent: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextPayload {
    Plain(String),
    Object { text: String },
}

impl Command {
    /// Validate an envelope into a command.
    pub fn decode(msg: &WireMessage) -> Result<Self, DecodeError> {
        match msg.kind.as_str() {
            tags::OPEN_URL => {
                let url = payload_str(tags::OPEN_URL, &msg.payload)?;
                if url.trim().is_empty() {
                    return Err(DecodeError::payload(tags::OPEN_URL, "url is empty"));
                }
                Ok(Self::OpenUrl(url.to_owned()))
            }
            tags::CLICK_AT => {
                let p: ClickPayload = from_payload(tags::CLICK_AT, &msg.payload)?;
                Ok(Self::ClickAt { x: p.x, y: p.y })
            }
            tags::SCROLL => {
                let p: ScrollPayload = from_payload(tags::SCROLL, &msg.payload)?;
                if p.percent < 0.0 {
                    return Err(DecodeError::payload(tags::SCROLL, "percent is negative"));
                }
                Ok(Self::Scroll {
                    direction: p.direction,
                    percent: p.percent,
                })
            }
            tags::SWIPE => {
                let gesture: SwipeGesture = from_payload(tags::SWIPE, &msg.payload)?;
                if gesture.duration_ms < 0.0 {
                    return Err(DecodeError::payload(tags::SWIPE, "duration is negative"));
                }
                Ok(Self::Swipe(gesture))
            }
            tags::TYPE_TEXT => {
                let text = match from_payload(tags::TYPE_TEXT, &msg.payload)? {
                    TextPayload::Plain(text) | TextPayload::Object { text } => text,
                };
                Ok(Self::TypeText(text))
            }
            tags::SEND_BUTTON => {
                let name = payload_str(tags::SEND_BUTTON, &msg.payload)?;
                Ok(Self::SendButton(name.parse()?))
            }
            other => Err(DecodeError::UnknownType(other.to_owned())),
        }
    }

    /// Parse and decode a raw text frame.
    pub fn from_text(text: &str) -> Result<Self, DecodeError> {
        Self::decode(&WireMessage::parse(text)?)
    }

    /// Wire tag this command was decoded from.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::OpenUrl(_) => tags::OPEN_URL,
            Self::ClickAt { .. } => tags::CLICK_AT,
            Self::Scroll { .. } => tags::SCROLL,
            Self::Swipe(_) => tags::SWIPE,
            Self::TypeText(_) => tags::TYPE_TEXT,
            Self::SendButton(_) => tags::SEND_BUTTON,
        }
    }
}

fn payload_str<'a>(tag: &'static str, payload: &'a Value) -> Result<&'a str, DecodeError> {
    payload
        .as_str()
        .ok_or_else(|| DecodeError::payload(tag, "expected a string"))
}

fn from_payload<T: for<'de> Deserialize<'de>>(
    tag: &'static str,
    payload: &Value,
) -> Result<T, DecodeError> {
    T::deserialize(payload).map_err(|e| DecodeError::payload(tag, e.to_string()))
}
