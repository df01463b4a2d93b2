//! Settings types and their compiled defaults.
//!
//! Field names serialize as camelCase to match `config.json`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::SettingsError;

/// Browser window size in CSS pixels, written `"<w>x<h>"` in the file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// Window width.
    pub width: u32,
    /// Window height.
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 530,
            height: 900,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SettingsError::InvalidValue(format!("resolution '{s}' is not <w>x<h>"));
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

impl Serialize for Resolution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Resolution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Root settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PeriscopeSettings {
    /// Browser window size.
    pub resolution: Resolution,
    /// Chrome profile directory name inside the user data dir.
    pub profile: String,
    /// Page opened at startup.
    pub default_webpage: String,
    /// Relay server settings.
    pub server: ServerSettings,
    /// Browser launch settings.
    pub browser: BrowserSettings,
}

impl Default for PeriscopeSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            profile: "Profile".into(),
            default_webpage: "https://google.com".into(),
            server: ServerSettings::default(),
            browser: BrowserSettings::default(),
        }
    }
}

/// Relay server settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port. `0` picks a free port.
    pub port: u16,
    /// Directory holding the viewer bundle.
    pub static_dir: PathBuf,
    /// Period between frame captures per viewer.
    pub frame_interval_ms: u64,
    /// Bound on a single capture.
    pub capture_timeout_ms: u64,
    /// How long shutdown waits for the listener to drain.
    pub drain_timeout_ms: u64,
    /// Pause after the browser is cancelled before exiting.
    pub settle_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            static_dir: PathBuf::from("./dist"),
            frame_interval_ms: 100,
            capture_timeout_ms: 2_000,
            drain_timeout_ms: 5_000,
            settle_ms: 1_000,
        }
    }
}

impl ServerSettings {
    /// Frame interval as a [`Duration`].
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// Capture timeout as a [`Duration`].
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    /// Drain timeout as a [`Duration`].
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Settle period as a [`Duration`].
    pub fn settle_period(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Browser launch settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserSettings {
    /// Explicit Chrome binary; discovered when unset.
    pub chrome_path: Option<PathBuf>,
    /// Run Chrome headless.
    pub headless: bool,
    /// Chrome user data dir; `<exe dir>/ChromeProfile` when unset.
    pub user_data_dir: Option<PathBuf>,
}
