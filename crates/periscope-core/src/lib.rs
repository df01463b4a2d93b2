//! # periscope-core
//!
//! Shared vocabulary for the Periscope relay.
//!
//! - **Wire protocol**: the `{type, payload}` envelope in both directions
//! - **Commands**: the closed [`Command`] variant type decoded from inbound messages
//! - **Input geometry**: clamped scroll deltas, swipe interpolation, page scripts
//! - **IDs**: [`ViewerId`] newtype for connected viewers
//! - **Logging**: subscriber setup and an in-memory capture layer for tests

#![deny(unsafe_code)]

pub mod command;
pub mod errors;
pub mod ids;
pub mod input;
pub mod logging;
pub mod protocol;

pub use command::{Button, Command};
pub use errors::DecodeError;
pub use ids::ViewerId;
pub use input::scroll::{ScrollDirection, ScrollMetrics};
pub use input::swipe::{SwipeGesture, TouchPhase, TouchPoint};
pub use protocol::{FrameMessage, WireMessage};
