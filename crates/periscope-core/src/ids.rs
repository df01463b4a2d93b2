//! Viewer identifiers.
//!
//! IDs are UUID v7 (time-ordered) generated via [`uuid::Uuid::now_v7`], so
//! log lines for consecutive connections sort naturally.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one connected viewer for the lifetime of its socket.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewerId(String);

impl ViewerId {
    /// Create a new random ID (UUID v7, time-ordered).
    #[must_use]
    pub fn new() -> Self {
        Self(format!("viewer_{}", Uuid::now_v7()))
    }

    /// Create from an existing string value.
    #[must_use]
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ViewerId {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<str> for ViewerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ViewerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}
