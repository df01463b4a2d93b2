//! Decode errors for inbound viewer messages.

use thiserror::Error;

/// Why an inbound text frame could not be turned into a [`crate::Command`].
///
/// Decode failures are logged and dropped by the relay; they never close
/// the viewer connection.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Frame is not JSON, or lacks the `type` field.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// `type` names no known command.
    #[error("unknown message type '{0}'")]
    UnknownType(String),

    /// Payload shape does not match the command's contract.
    #[error("invalid payload for {tag}: {reason}")]
    InvalidPayload {
        /// Command tag whose payload was rejected.
        tag: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// `send_button` named a button outside the supported set.
    #[error("unknown button '{0}'")]
    UnknownButton(String),
}

impl DecodeError {
    pub(crate) fn payload(tag: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            tag,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_display() {
        let err = DecodeError::UnknownType("teleport".into());
        assert_eq!(err.to_string(), "unknown message type 'teleport'");
    }

    #[test]
    fn invalid_payload_display() {
        let err = DecodeError::payload("click_at", "missing field `y`");
        assert_eq!(
            err.to_string(),
            "invalid payload for click_at: missing field `y`"
        );
    }

    #[test]
    fn unknown_button_display() {
        let err = DecodeError::UnknownButton("eject".into());
        assert_eq!(err.to_string(), "unknown button 'eject'");
    }
}
