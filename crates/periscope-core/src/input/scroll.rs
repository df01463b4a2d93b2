//! Clamped vertical scrolling.
//!
//! A scroll of `percent` moves the page by `percent * innerHeight / 100`,
//! clamped so the page never scrolls above its top or below
//! `scrollHeight - clientHeight`.

use serde::{Deserialize, Serialize};

/// Scroll direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    /// Towards the top of the page.
    Up,
    /// Towards the bottom of the page.
    Down,
}

/// Page geometry the clamp depends on, in CSS pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollMetrics {
    /// `window.innerHeight`
    pub viewport_height: f64,
    /// `window.scrollY`
    pub scroll_y: f64,
    /// `document.documentElement.scrollHeight`
    pub scroll_height: f64,
    /// `document.documentElement.clientHeight`
    pub client_height: f64,
}

impl ScrollMetrics {
    /// Largest reachable `scrollY`.
    pub fn max_scroll(&self) -> f64 {
        self.scroll_height - self.client_height
    }
}

/// Signed delta the page will actually move by.
pub fn scroll_delta(direction: ScrollDirection, percent: f64, metrics: &ScrollMetrics) -> f64 {
    let amount = percent * metrics.viewport_height / 100.0;
    match direction {
        ScrollDirection::Up => (-amount).max(-metrics.scroll_y),
        ScrollDirection::Down => amount.min(metrics.max_scroll() - metrics.scroll_y),
    }
}

/// Script that applies [`scroll_delta`] in the page.
pub fn scroll_script(direction: ScrollDirection, percent: f64) -> String {
    match direction {
        ScrollDirection::Up => format!(
            "(() => {{ \
             var scrollAmount = -({percent}) * window.innerHeight / 100; \
             window.scrollBy(0, Math.max(scrollAmount, -window.scrollY)); \
             }})()"
        ),
        ScrollDirection::Down => format!(
            "(() => {{ \
             var scrollAmount = ({percent}) * window.innerHeight / 100; \
             var maxScroll = document.documentElement.scrollHeight - document.documentElement.clientHeight; \
             window.scrollBy(0, Math.min(scrollAmount, maxScroll - window.scrollY)); \
             }})()"
        ),
    }
}
