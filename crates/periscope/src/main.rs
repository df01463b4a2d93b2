//! # periscope
//!
//! Relay binary: launches the shared Chrome, serves the viewer bundle and the
//! `/ws` relay, and tears everything down on SIGINT or SIGTERM.

#![deny(unsafe_code)]

mod banner;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use periscope_browser::chrome::find_chrome;
use periscope_browser::{AutomationFacade, BrowserError, CdpSession, LaunchOptions};
use periscope_core::logging::{LogFormat, init_subscriber};
use periscope_settings::{PeriscopeSettings, load_settings_from_path};
use periscope_server::{RelayConfig, RelayServer};
use tracing::{error, info};

/// Share one browser with remote viewers.
#[derive(Parser, Debug)]
#[command(name = "periscope", about = "Share one browser with remote viewers")]
struct Cli {
    /// Config file (JSON).
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Host to bind (overrides config and env).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides config and env).
    #[arg(long)]
    port: Option<u16>,

    /// Directory holding the viewer bundle (overrides config and env).
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Log level when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format: `compact` or `json`.
    #[arg(long, default_value = "compact")]
    log_format: LogFormat,
}

impl Cli {
    /// Apply flag overrides on top of file and env settings.
    fn apply(&self, settings: &mut PeriscopeSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(dir) = &self.static_dir {
            settings.server.static_dir.clone_from(dir);
        }
    }
}

fn launch_options(settings: &PeriscopeSettings, chrome_path: PathBuf) -> LaunchOptions {
    let mut options = LaunchOptions::new(
        chrome_path,
        settings.resolution.width,
        settings.resolution.height,
    );
    options.profile.clone_from(&settings.profile);
    options.headless = settings.browser.headless;
    if let Some(dir) = &settings.browser.user_data_dir {
        options.user_data_dir.clone_from(dir);
    }
    options
}

async fn start_browser(settings: &PeriscopeSettings) -> Result<Arc<CdpSession>> {
    let chrome = find_chrome(settings.browser.chrome_path.as_deref())
        .ok_or(BrowserError::ChromeNotFound)?;
    info!(chrome = %chrome.display(), "launching Chrome");
    let session = CdpSession::launch(&launch_options(settings, chrome))
        .await
        .context("Failed to launch Chrome")?;

    if let Err(e) = session.navigate(&settings.default_webpage).await {
        session.cancel().await;
        return Err(e).with_context(|| format!("Failed to open {}", settings.default_webpage));
    }
    info!(url = %settings.default_webpage, "browser ready");
    Ok(session)
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to listen for SIGTERM")?;
    tokio::select! {
        interrupted = tokio::signal::ctrl_c() => interrupted.context("Failed to listen for ctrl-c")?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_subscriber(&args.log_level, args.log_format);

    let mut settings = load_settings_from_path(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    args.apply(&mut settings);
    info!(
        resolution = %settings.resolution,
        profile = %settings.profile,
        "settings loaded"
    );

    let metrics = periscope_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let session = start_browser(&settings).await?;
    let facade: Arc<dyn AutomationFacade> = session;
    let server = RelayServer::new(
        RelayConfig::from(&settings.server),
        facade,
        periscope_platform::system_bridge(),
        Some(metrics),
    );

    let (addr, handle) = match server.listen().await {
        Ok(bound) => bound,
        Err(e) => {
            server.shutdown().run(Vec::new()).await;
            return Err(e).context("Failed to bind server");
        }
    };
    banner::announce(&settings.server.host, addr).await;

    let signal = shutdown_signal().await;
    match &signal {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => error!(error = %e, "signal handling failed, shutting down"),
    }
    server.shutdown().run(vec![handle]).await;
    signal
}

#[cfg(test)]
mod tests {
    use super::*;
    use periscope_settings::Resolution;

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["periscope"]);
        assert_eq!(cli.config, PathBuf::from("config.json"));
        assert_eq!(cli.log_level, "info");
        assert_eq!(cli.log_format, LogFormat::Compact);
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
        assert!(cli.static_dir.is_none());
    }

    #[test]
    fn cli_flags_parse() {
        let cli = Cli::parse_from([
            "periscope",
            "--config",
            "/etc/periscope.json",
            "--host",
            "127.0.0.1",
            "--port",
            "9090",
            "--static-dir",
            "/srv/viewer",
            "--log-level",
            "debug",
            "--log-format",
            "json",
        ]);
        assert_eq!(cli.config, PathBuf::from("/etc/periscope.json"));
        assert_eq!(cli.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(cli.port, Some(9090));
        assert_eq!(cli.static_dir, Some(PathBuf::from("/srv/viewer")));
        assert_eq!(cli.log_level, "debug");
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn cli_rejects_bad_port() {
        assert!(Cli::try_parse_from(["periscope", "--port", "99999"]).is_err());
    }

    #[test]
    fn flags_override_settings() {
        let mut settings = PeriscopeSettings::default();
        let cli = Cli::parse_from(["periscope", "--port", "7000", "--static-dir", "web"]);

        cli.apply(&mut settings);

        assert_eq!(settings.server.port, 7000);
        assert_eq!(settings.server.static_dir, PathBuf::from("web"));
        assert_eq!(settings.server.host, "0.0.0.0");
    }

    #[test]
    fn config_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"server":{"host":"10.0.0.2","port":8181}}"#).unwrap();
        let cli = Cli::parse_from(["periscope", "--port", "8282"]);

        let mut settings = periscope_settings::loader::load_file(&path).unwrap();
        cli.apply(&mut settings);

        assert_eq!(settings.server.host, "10.0.0.2");
        assert_eq!(settings.server.port, 8282);
    }

    #[test]
    fn launch_options_follow_settings() {
        let mut settings = PeriscopeSettings {
            resolution: Resolution {
                width: 800,
                height: 600,
            },
            profile: "Work".into(),
            ..PeriscopeSettings::default()
        };
        settings.browser.headless = true;
        settings.browser.user_data_dir = Some(PathBuf::from("/tmp/profile"));

        let options = launch_options(&settings, PathBuf::from("/usr/bin/chromium"));

        assert_eq!(options.chrome_path, PathBuf::from("/usr/bin/chromium"));
        assert_eq!((options.window_width, options.window_height), (800, 600));
        assert_eq!(options.profile, "Work");
        assert!(options.headless);
        assert_eq!(options.user_data_dir, PathBuf::from("/tmp/profile"));
    }

    #[test]
    fn launch_options_default_profile_dir() {
        let settings = PeriscopeSettings::default();
        let options = launch_options(&settings, PathBuf::from("chrome"));
        assert!(options.user_data_dir.ends_with("ChromeProfile"));
        assert!(!options.headless);
        assert_eq!(options.profile, "Profile");
    }
}
