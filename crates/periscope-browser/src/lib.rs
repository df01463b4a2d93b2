//! # periscope-browser
//!
//! The shared browser every viewer watches and drives.
//!
//! - [`AutomationFacade`]: the operations the relay needs, safe to call
//!   concurrently and fail-fast after cancellation
//! - [`CdpSession`]: the Chrome implementation over the DevTools protocol,
//!   including popup suppression
//! - [`chrome::find_chrome`] and [`LaunchOptions`]: locating and starting Chrome
//! - [`testing::RecordingFacade`]: an in-memory facade for tests

#![deny(unsafe_code)]

pub mod cdp;
pub mod chrome;
pub mod error;
pub mod facade;
pub mod launch;
pub mod session;
pub mod testing;

pub use error::BrowserError;
pub use facade::AutomationFacade;
pub use launch::LaunchOptions;
pub use session::CdpSession;
