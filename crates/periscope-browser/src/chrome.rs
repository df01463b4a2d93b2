//! Locating a Chrome or Chromium executable.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

#[cfg(target_os = "macos")]
const INSTALL_LOCATIONS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/homebrew/bin/chromium",
];

#[cfg(target_os = "linux")]
const INSTALL_LOCATIONS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
];

#[cfg(target_os = "windows")]
const INSTALL_LOCATIONS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
];

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
const INSTALL_LOCATIONS: &[&str] = &[];

/// Executable names tried against `PATH` after the install locations.
#[cfg(windows)]
const PATH_NAMES: &[&str] = &["chrome.exe"];
#[cfg(not(windows))]
const PATH_NAMES: &[&str] = &["google-chrome", "chromium", "chromium-browser"];

/// Resolve the browser binary.
///
/// The configured path is honoured when it points at an executable file;
/// otherwise the platform install locations are tried, then `PATH`.
pub fn find_chrome(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured.filter(|p| !runnable(p)) {
        tracing::debug!(path = %path.display(), "configured Chrome is not runnable, searching");
    }
    let path_var = env::var_os("PATH");
    let found = configured
        .filter(|p| runnable(p))
        .map(Path::to_path_buf)
        .or_else(|| first_runnable(search_paths()))
        .or_else(|| first_runnable(on_path(path_var.as_deref())));
    if let Some(path) = &found {
        tracing::debug!(path = %path.display(), "using Chrome binary");
    }
    found
}

/// Platform install locations in the order they are tried.
pub fn search_paths() -> Vec<PathBuf> {
    INSTALL_LOCATIONS.iter().map(PathBuf::from).collect()
}

fn on_path(path_var: Option<&OsStr>) -> Vec<PathBuf> {
    let Some(var) = path_var else {
        return Vec::new();
    };
    env::split_paths(var)
        .flat_map(|dir| PATH_NAMES.iter().map(move |name| dir.join(name)))
        .collect()
}

fn first_runnable(candidates: Vec<PathBuf>) -> Option<PathBuf> {
    candidates.into_iter().find(|p| runnable(p))
}

#[cfg(unix)]
fn runnable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn runnable(path: &Path) -> bool {
    path.is_file()
}
