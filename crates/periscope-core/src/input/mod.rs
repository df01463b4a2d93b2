//! Input geometry and the page scripts built from it.
//!
//! Everything here is pure: the browser facade evaluates the scripts, and
//! the math behind them is exposed for property tests.

pub mod scroll;
pub mod swipe;
pub mod typing;

/// Leaves fullscreen if the page is in it. Resolves to whether it was.
pub const EXIT_FULLSCREEN_SCRIPT: &str = "document.fullscreenElement \
     ? document.exitFullscreen().then(() => true) \
     : false";

/// Whether the page has rendered a body yet.
pub const BODY_READY_SCRIPT: &str = "document.readyState !== 'loading' && !!document.body";
