//! # periscope-settings
//!
//! Configuration for the Periscope relay, loaded once at startup from three
//! layers (in priority order):
//! 1. **Compiled defaults**: [`PeriscopeSettings::default()`]
//! 2. **Config file**: `config.json` (deep-merged over defaults)
//! 3. **Environment variables**: `PERISCOPE_*` and `CHROME_PATH`
//!
//! Command-line flags are applied on top by the binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::{BrowserSettings, PeriscopeSettings, Resolution, ServerSettings};
