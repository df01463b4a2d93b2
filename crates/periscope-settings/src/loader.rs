//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`PeriscopeSettings::default()`]
//! 2. If the config file exists, deep-merge its values over the defaults
//! 3. Apply environment variable overrides (highest priority short of CLI flags)
//!
//! A config file that cannot be parsed is logged and ignored. An invalid
//! `resolution` is logged and the default kept; the rest of the file still
//! applies.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{PeriscopeSettings, Resolution};

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Path of the default config file.
pub fn settings_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<PeriscopeSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// Only an I/O failure other than "not found" is an error.
pub fn load_settings_from_path(path: &Path) -> Result<PeriscopeSettings> {
    let mut settings = load_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Load settings from a file without consulting the environment.
pub fn load_file(path: &Path) -> Result<PeriscopeSettings> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(?path, "config file not found, using defaults");
            return Ok(PeriscopeSettings::default());
        }
        Err(e) => return Err(e.into()),
    };
    debug!(?path, "loading config file");
    Ok(parse_settings(&content))
}

/// Merge a config document over the defaults.
pub fn parse_settings(content: &str) -> PeriscopeSettings {
    let user: Value = match serde_json::from_str(content) {
        Ok(user) => user,
        Err(error) => {
            warn!(%error, "config file is not valid JSON, using defaults");
            return PeriscopeSettings::default();
        }
    };
    if !user.is_object() {
        warn!("config file is not a JSON object, using defaults");
        return PeriscopeSettings::default();
    }

    let defaults = match serde_json::to_value(PeriscopeSettings::default()) {
        Ok(defaults) => defaults,
        Err(error) => {
            warn!(%error, "failed to serialize default settings");
            return PeriscopeSettings::default();
        }
    };
    let mut merged = deep_merge(defaults, user);
    reset_invalid_resolution(&mut merged);

    serde_json::from_value(merged).unwrap_or_else(|error| {
        warn!(%error, "config file has invalid values, using defaults");
        PeriscopeSettings::default()
    })
}

fn reset_invalid_resolution(merged: &mut Value) {
    let Some(slot) = merged.get_mut("resolution") else {
        return;
    };
    let valid = slot
        .as_str()
        .is_some_and(|s| s.parse::<Resolution>().is_ok());
    if !valid {
        let fallback = Resolution::default();
        warn!(value = %slot, %fallback, "invalid resolution, keeping default");
        *slot = Value::String(fallback.to_string());
    }
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides from the process environment.
pub fn apply_env_overrides(settings: &mut PeriscopeSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides using `lookup` as the environment.
///
/// Empty values are ignored. Invalid ports are logged and ignored.
pub fn apply_overrides_from<F>(settings: &mut PeriscopeSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read("PERISCOPE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("PERISCOPE_PORT") {
        match parse_u16_range(&v, 0, u16::MAX) {
            Some(port) => settings.server.port = port,
            None => warn!(key = "PERISCOPE_PORT", value = %v, "invalid port env var, ignoring"),
        }
    }
    if let Some(v) = read("PERISCOPE_STATIC_DIR") {
        settings.server.static_dir = PathBuf::from(v);
    }
    if let Some(v) = read("CHROME_PATH") {
        settings.browser.chrome_path = Some(PathBuf::from(v));
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
