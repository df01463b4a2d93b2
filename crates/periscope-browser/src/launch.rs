//! Chrome launch options and command-line flags.

use std::path::{Path, PathBuf};

/// Profile directory name used next to the executable when none is configured.
pub const PROFILE_DIR_NAME: &str = "ChromeProfile";

/// How to start the shared Chrome instance.
#[derive(Clone, Debug, PartialEq)]
pub struct LaunchOptions {
    /// Chrome binary.
    pub chrome_path: PathBuf,
    /// Window width in CSS pixels.
    pub window_width: u32,
    /// Window height in CSS pixels.
    pub window_height: u32,
    /// `--profile-directory` value.
    pub profile: String,
    /// `--user-data-dir` value.
    pub user_data_dir: PathBuf,
    /// Run headless.
    pub headless: bool,
}

impl LaunchOptions {
    /// Options with the default user data dir.
    pub fn new(chrome_path: PathBuf, window_width: u32, window_height: u32) -> Self {
        Self {
            chrome_path,
            window_width,
            window_height,
            profile: "Profile".into(),
            user_data_dir: default_user_data_dir(),
            headless: false,
        }
    }

    /// Full argument list for a Chrome listening on `debug_port`.
    pub fn args(&self, debug_port: u16) -> Vec<String> {
        let mut args = vec![format!("--remote-debugging-port={debug_port}")];
        if self.headless {
            args.push("--headless=new".into());
        }
        args.extend(
            [
                "--disable-gpu",
                "--no-sandbox",
                "--autoplay-policy=no-user-gesture-required",
                "--force-device-scale-factor=1",
                "--no-first-run",
                "--no-default-browser-check",
            ]
            .map(String::from),
        );
        args.push(format!(
            "--window-size={},{}",
            self.window_width, self.window_height
        ));
        args.push(format!("--user-data-dir={}", self.user_data_dir.display()));
        args.push(format!("--profile-directory={}", self.profile));
        args.push("about:blank".into());
        args
    }
}

/// `<directory of the running executable>/ChromeProfile`, or a relative
/// `ChromeProfile` when the executable path is unknown.
pub fn default_user_data_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .as_deref()
        .and_then(Path::parent)
        .map_or_else(|| PathBuf::from(PROFILE_DIR_NAME), |dir| dir.join(PROFILE_DIR_NAME))
}
