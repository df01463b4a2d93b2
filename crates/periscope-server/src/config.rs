//! Relay server configuration.

use std::path::PathBuf;
use std::time::Duration;

use periscope_settings::ServerSettings;

/// Runtime configuration for [`RelayServer`](crate::server::RelayServer).
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to (0 = OS picks).
    pub port: u16,
    /// Directory holding the viewer bundle.
    pub static_dir: PathBuf,
    /// Time between frame captures for each viewer.
    pub frame_interval: Duration,
    /// Upper bound on a single capture.
    pub capture_timeout: Duration,
    /// How long shutdown waits for the listener and viewers to drain.
    pub drain_timeout: Duration,
    /// Pause after the browser is cancelled, before exit.
    pub settle_period: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

impl From<&ServerSettings> for RelayConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            static_dir: settings.static_dir.clone(),
            frame_interval: settings.frame_interval(),
            capture_timeout: settings.capture_timeout(),
            drain_timeout: settings.drain_timeout(),
            settle_period: settings.settle_period(),
        }
    }
}
