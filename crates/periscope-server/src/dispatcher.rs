//! Routes decoded viewer commands onto the browser or the host.
//!
//! Every accepted command runs as a detached task. Its outcome is only
//! visible in the logs; nothing is reported back to the viewer.

use std::sync::Arc;

use metrics::counter;
use periscope_browser::{AutomationFacade, BrowserError};
use periscope_core::{Button, Command, DecodeError, ScrollDirection, SwipeGesture, ViewerId};
use periscope_platform::{DeviceAction, DeviceBridge};
use tracing::{debug, warn};

use crate::metrics::{COMMANDS_REJECTED_TOTAL, COMMANDS_TOTAL};

/// Where a message was routed.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Handed to the browser, by wire tag.
    Browser(&'static str),
    /// Handed to the device bridge.
    Device(DeviceAction),
    /// Dropped without side effects.
    Rejected(DecodeError),
}

/// Decodes viewer messages and starts their side effects.
pub struct Dispatcher {
    facade: Arc<dyn AutomationFacade>,
    bridge: Arc<dyn DeviceBridge>,
}

/// Destination of a decoded command.
enum Route {
    Browser(BrowserAction),
    Device(DeviceAction),
}

/// Commands the browser carries out. Device buttons have no variant here.
enum BrowserAction {
    Navigate(String),
    Click { x: f64, y: f64 },
    Scroll { direction: ScrollDirection, percent: f64 },
    Swipe(SwipeGesture),
    Type(String),
    ExitFullscreen,
}

impl From<Command> for Route {
    fn from(command: Command) -> Self {
        let action = match command {
            Command::OpenUrl(url) => BrowserAction::Navigate(url),
            Command::ClickAt { x, y } => BrowserAction::Click { x, y },
            Command::Scroll { direction, percent } => BrowserAction::Scroll { direction, percent },
            Command::Swipe(gesture) => BrowserAction::Swipe(gesture),
            Command::TypeText(text) => BrowserAction::Type(text),
            Command::SendButton(Button::ExitFullscreen) => BrowserAction::ExitFullscreen,
            Command::SendButton(Button::VolumeUp) => return Self::Device(DeviceAction::VolumeUp),
            Command::SendButton(Button::VolumeDown) => {
                return Self::Device(DeviceAction::VolumeDown);
            }
            Command::SendButton(Button::Shutdown) => return Self::Device(DeviceAction::PowerOff),
        };
        Self::Browser(action)
    }
}

impl Dispatcher {
    /// Dispatcher over the shared browser and host bridge.
    pub fn new(facade: Arc<dyn AutomationFacade>, bridge: Arc<dyn DeviceBridge>) -> Self {
        Self { facade, bridge }
    }

    /// Decode one text frame and route it. Must run inside a tokio runtime.
    pub fn dispatch(&self, viewer: &ViewerId, text: &str) -> DispatchOutcome {
        let command = match Command::from_text(text) {
            Ok(command) => command,
            Err(error) => {
                counter!(COMMANDS_REJECTED_TOTAL).increment(1);
                warn!(viewer_id = %viewer, %error, "rejected viewer message");
                return DispatchOutcome::Rejected(error);
            }
        };
        let tag = command.tag();
        counter!(COMMANDS_TOTAL, "tag" => tag).increment(1);
        debug!(viewer_id = %viewer, tag, "dispatching command");

        match Route::from(command) {
            Route::Device(action) => {
                self.spawn_device(viewer.clone(), action);
                DispatchOutcome::Device(action)
            }
            Route::Browser(action) => {
                self.spawn_browser(viewer.clone(), tag, action);
                DispatchOutcome::Browser(tag)
            }
        }
    }

    fn spawn_browser(&self, viewer: ViewerId, tag: &'static str, action: BrowserAction) {
        let facade = Arc::clone(&self.facade);
        drop(tokio::spawn(async move {
            if let Err(error) = run_browser_action(facade.as_ref(), action).await {
                warn!(viewer_id = %viewer, tag, %error, "browser command failed");
            }
        }));
    }

    fn spawn_device(&self, viewer: ViewerId, action: DeviceAction) {
        let bridge = Arc::clone(&self.bridge);
        drop(tokio::spawn(async move {
            if let Err(error) = bridge.perform(action).await {
                warn!(viewer_id = %viewer, %action, %error, "device action failed");
            }
        }));
    }
}

async fn run_browser_action(
    facade: &dyn AutomationFacade,
    action: BrowserAction,
) -> Result<(), BrowserError> {
    match action {
        BrowserAction::Navigate(url) => facade.navigate(&url).await,
        BrowserAction::Click { x, y } => facade.click_at(x, y).await,
        BrowserAction::Scroll { direction, percent } => facade.scroll_by(direction, percent).await,
        BrowserAction::Swipe(gesture) => facade.swipe(&gesture).await,
        BrowserAction::Type(text) => {
            if !facade.type_text(&text).await? {
                debug!("no editable element focused, text dropped");
            }
            Ok(())
        }
        BrowserAction::ExitFullscreen => facade.exit_fullscreen().await,
    }
}
