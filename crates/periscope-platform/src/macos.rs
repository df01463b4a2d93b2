//! macOS: AppleScript through `osascript`.

use crate::DeviceAction;
use crate::process::CommandSpec;

/// Volume change per press, out of 100.
pub const VOLUME_STEP: u8 = 6;

/// Command line for `action`.
pub fn plan(action: DeviceAction) -> CommandSpec {
    let script = match action {
        DeviceAction::VolumeUp => volume_script('+'),
        DeviceAction::VolumeDown => volume_script('-'),
        DeviceAction::PowerOff => "tell application \"System Events\" to shut down".to_owned(),
    };
    CommandSpec::new("osascript", ["-e".to_owned(), script])
}

fn volume_script(sign: char) -> String {
    format!(
        "set volume output volume ((output volume of (get volume settings)) {sign} {VOLUME_STEP})"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_adjusts_output_volume() {
        let spec = plan(DeviceAction::VolumeUp);
        assert_eq!(spec.program, "osascript");
        assert_eq!(spec.args[0], "-e");
        assert!(spec.args[1].ends_with("+ 6)"));
        assert!(plan(DeviceAction::VolumeDown).args[1].ends_with("- 6)"));
    }

    #[test]
    fn power_off_asks_system_events() {
        let spec = plan(DeviceAction::PowerOff);
        assert_eq!(spec.args[1], "tell application \"System Events\" to shut down");
    }
}
