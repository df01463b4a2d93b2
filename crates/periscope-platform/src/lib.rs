//! # periscope-platform
//!
//! The device bridge: host-level actions a viewer can trigger with
//! `send_button` (volume up/down, power off).
//!
//! Each supported OS has a pure command plan ([`linux`], [`macos`],
//! [`windows`]) run by [`CommandBridge`]; [`system_bridge`] picks the plan for
//! the compile target and falls back to [`UnsupportedBridge`] elsewhere.

#![deny(unsafe_code)]

pub mod error;
pub mod linux;
pub mod macos;
pub mod process;
pub mod testing;
pub mod windows;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

pub use error::DeviceError;
pub use process::CommandSpec;

/// A host-level action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceAction {
    /// Raise system volume one step.
    VolumeUp,
    /// Lower system volume one step.
    VolumeDown,
    /// Power the host off.
    PowerOff,
}

impl DeviceAction {
    /// Stable name for logs and errors.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VolumeUp => "volume_up",
            Self::VolumeDown => "volume_down",
            Self::PowerOff => "power_off",
        }
    }
}

impl fmt::Display for DeviceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host device control.
#[async_trait]
pub trait DeviceBridge: Send + Sync {
    /// Perform `action` on the host.
    async fn perform(&self, action: DeviceAction) -> Result<(), DeviceError>;
}

/// Maps an action to a command line.
pub type CommandPlan = fn(DeviceAction) -> CommandSpec;

/// Runs the command an OS plan yields for each action.
pub struct CommandBridge {
    os: &'static str,
    plan: CommandPlan,
}

impl CommandBridge {
    /// Bridge for the named OS using `plan`.
    pub fn new(os: &'static str, plan: CommandPlan) -> Self {
        Self { os, plan }
    }
}

#[async_trait]
impl DeviceBridge for CommandBridge {
    async fn perform(&self, action: DeviceAction) -> Result<(), DeviceError> {
        let spec = (self.plan)(action);
        info!(os = self.os, %action, command = %spec, "performing device action");
        spec.run().await
    }
}

/// Bridge for targets without a plan. Logs and refuses every action.
pub struct UnsupportedBridge {
    os: &'static str,
}

impl UnsupportedBridge {
    /// Bridge that refuses actions on `os`.
    pub fn new(os: &'static str) -> Self {
        Self { os }
    }
}

#[async_trait]
impl DeviceBridge for UnsupportedBridge {
    async fn perform(&self, action: DeviceAction) -> Result<(), DeviceError> {
        warn!(os = self.os, %action, "device action not supported on this platform");
        Err(DeviceError::Unsupported {
            action: action.as_str(),
            os: self.os,
        })
    }
}

/// The bridge for the compile target.
pub fn system_bridge() -> Arc<dyn DeviceBridge> {
    let os = std::env::consts::OS;
    match os {
        "linux" => Arc::new(CommandBridge::new(os, linux::plan)),
        "macos" => Arc::new(CommandBridge::new(os, macos::plan)),
        "windows" => Arc::new(CommandBridge::new(os, windows::plan)),
        _ => Arc::new(UnsupportedBridge::new(os)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unsupported_bridge_refuses() {
        let bridge = UnsupportedBridge::new("plan9");
        let err = bridge.perform(DeviceAction::VolumeUp).await.unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Unsupported {
                action: "volume_up",
                os: "plan9"
            }
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_bridge_reports_failure() {
        fn failing(_: DeviceAction) -> CommandSpec {
            CommandSpec::new("sh", ["-c", "echo broken >&2; exit 3"])
        }
        let bridge = CommandBridge::new("test", failing);
        let err = bridge.perform(DeviceAction::VolumeDown).await.unwrap_err();
        let DeviceError::CommandFailed { program, stderr, .. } = err else {
            panic!("expected CommandFailed, got {err:?}");
        };
        assert_eq!(program, "sh");
        assert_eq!(stderr, "broken");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_bridge_runs_plan() {
        fn ok(_: DeviceAction) -> CommandSpec {
            CommandSpec::new("true", std::iter::empty::<&str>())
        }
        let bridge = CommandBridge::new("test", ok);
        bridge.perform(DeviceAction::VolumeUp).await.unwrap();
    }
}
