//! The automation facade the relay drives.
//!
//! Implementations provide a handful of primitives; scrolling, swiping,
//! typing and fullscreen exit are built on top of them here so every
//! implementation shares the same page scripts and gesture timing.

use std::time::Duration;

use async_trait::async_trait;
use periscope_core::input::scroll::scroll_script;
use periscope_core::input::swipe::SWIPE_STEPS;
use periscope_core::input::typing::type_text_script;
use periscope_core::input::EXIT_FULLSCREEN_SCRIPT;
use periscope_core::{ScrollDirection, SwipeGesture, TouchPoint};
use serde_json::Value;

use crate::error::BrowserError;

/// One shared browser session, safe to call concurrently from many tasks.
///
/// Once [`cancel`](Self::cancel) has run, every operation fails fast with
/// [`BrowserError::Cancelled`].
#[async_trait]
pub trait AutomationFacade: Send + Sync {
    /// Navigate the controlled page.
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// Evaluate a script in the page and return its (awaited) value.
    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError>;

    /// Left-click at viewport coordinates.
    async fn click_at(&self, x: f64, y: f64) -> Result<(), BrowserError>;

    /// Dispatch a single touch event.
    async fn dispatch_touch(&self, point: &TouchPoint) -> Result<(), BrowserError>;

    /// Capture the viewport as JPEG, bounded by `timeout`.
    async fn capture_frame(&self, timeout: Duration) -> Result<Vec<u8>, BrowserError>;

    /// Close a browser target that is not the controlled page.
    async fn close_popup(&self, target_id: &str) -> Result<(), BrowserError>;

    /// Release the session. Idempotent.
    async fn cancel(&self);

    /// Scroll vertically by `percent` of the viewport, clamped to the page.
    async fn scroll_by(&self, direction: ScrollDirection, percent: f64) -> Result<(), BrowserError> {
        let _ = self.evaluate(&scroll_script(direction, percent)).await?;
        Ok(())
    }

    /// Play a swipe as touch-start, interpolated moves and touch-end.
    async fn swipe(&self, gesture: &SwipeGesture) -> Result<(), BrowserError> {
        let started = tokio::time::Instant::now();
        for point in gesture.touch_sequence(SWIPE_STEPS) {
            tokio::time::sleep_until(started + point.offset).await;
            self.dispatch_touch(&point).await?;
        }
        Ok(())
    }

    /// Write `text` into the focused editable element.
    ///
    /// Returns `false` when nothing editable had focus.
    async fn type_text(&self, text: &str) -> Result<bool, BrowserError> {
        let typed = self.evaluate(&type_text_script(text)).await?;
        Ok(typed.as_bool().unwrap_or(false))
    }

    /// Leave fullscreen if the page is in it.
    async fn exit_fullscreen(&self) -> Result<(), BrowserError> {
        let _ = self.evaluate(EXIT_FULLSCREEN_SCRIPT).await?;
        Ok(())
    }
}
