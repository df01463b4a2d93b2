//! Linux: ALSA mixer for volume, `shutdown` for power.

use crate::DeviceAction;
use crate::process::CommandSpec;

/// Volume step passed to `amixer`.
pub const VOLUME_STEP: &str = "5%";

/// Command line for `action`.
pub fn plan(action: DeviceAction) -> CommandSpec {
    match action {
        DeviceAction::VolumeUp => {
            CommandSpec::new("amixer", ["set", "Master", format!("{VOLUME_STEP}+").as_str()])
        }
        DeviceAction::VolumeDown => {
            CommandSpec::new("amixer", ["set", "Master", format!("{VOLUME_STEP}-").as_str()])
        }
        DeviceAction::PowerOff => CommandSpec::new("shutdown", ["-h", "now"]),
    }
}
