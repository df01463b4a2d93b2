//! Failures while reading `config.json` or interpreting its values.

use thiserror::Error;

/// Why settings could not be produced.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The file exists but could not be read.
    #[error("config file unreadable: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid JSON.
    #[error("config file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A value parsed but is out of range or malformed.
    #[error("bad config value: {0}")]
    InvalidValue(String),
}

/// Shorthand used across the settings crate.
pub type Result<T> = std::result::Result<T, SettingsError>;
