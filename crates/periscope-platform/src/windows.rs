//! Windows: media keys through `WScript.Shell`, `shutdown.exe` for power.

use crate::DeviceAction;
use crate::process::CommandSpec;

/// Virtual-key code of the volume-up media key.
pub const VK_VOLUME_UP: u8 = 0xAF;
/// Virtual-key code of the volume-down media key.
pub const VK_VOLUME_DOWN: u8 = 0xAE;

/// Command line for `action`.
pub fn plan(action: DeviceAction) -> CommandSpec {
    match action {
        DeviceAction::VolumeUp => send_key(VK_VOLUME_UP),
        DeviceAction::VolumeDown => send_key(VK_VOLUME_DOWN),
        DeviceAction::PowerOff => CommandSpec::new("shutdown", ["/s", "/t", "0"]),
    }
}

fn send_key(code: u8) -> CommandSpec {
    CommandSpec::new(
        "powershell",
        [
            "-NoProfile".to_owned(),
            "-Command".to_owned(),
            format!("(New-Object -ComObject WScript.Shell).SendKeys([char]{code})"),
        ],
    )
}
