//! Touch swipe interpolation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Number of interpolated touch-move events per swipe.
pub const SWIPE_STEPS: u32 = 10;

/// A straight-line swipe from one viewport point to another.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwipeGesture {
    /// Start x.
    pub start_x: f64,
    /// Start y.
    pub start_y: f64,
    /// End x.
    pub end_x: f64,
    /// End y.
    pub end_y: f64,
    /// Total gesture time in milliseconds.
    #[serde(rename = "duration")]
    pub duration_ms: f64,
}

/// Phase of a single touch event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TouchPhase {
    /// Finger down.
    Start,
    /// Finger moved.
    Move,
    /// Finger up.
    End,
}

impl TouchPhase {
    /// CDP `Input.dispatchTouchEvent` type string.
    pub fn as_cdp(self) -> &'static str {
        match self {
            Self::Start => "touchStart",
            Self::Move => "touchMove",
            Self::End => "touchEnd",
        }
    }
}

/// One scheduled touch event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TouchPoint {
    /// Event phase.
    pub phase: TouchPhase,
    /// Viewport x.
    pub x: f64,
    /// Viewport y.
    pub y: f64,
    /// Time since the gesture began.
    pub offset: Duration,
}

impl SwipeGesture {
    /// Total gesture time. Negative or non-finite durations collapse to zero.
    pub fn duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.duration_ms.max(0.0) / 1000.0).unwrap_or_default()
    }

    /// Start, `steps` evenly spaced moves ending at the end point, then end.
    ///
    /// Move `i` (1-based) sits at `start + (end - start) * i / steps` and fires
    /// at `duration * i / steps`, so the offsets of the moves sum the gesture
    /// into exactly `duration`.
    pub fn touch_sequence(&self, steps: u32) -> Vec<TouchPoint> {
        let steps = steps.max(1);
        let total = self.duration();
        let mut points = Vec::with_capacity(steps as usize + 2);
        points.push(TouchPoint {
            phase: TouchPhase::Start,
            x: self.start_x,
            y: self.start_y,
            offset: Duration::ZERO,
        });
        for i in 1..=steps {
            let t = f64::from(i) / f64::from(steps);
            points.push(TouchPoint {
                phase: TouchPhase::Move,
                x: self.start_x + (self.end_x - self.start_x) * t,
                y: self.start_y + (self.end_y - self.start_y) * t,
                offset: total.checked_mul(i).map_or(total, |d| d / steps),
            });
        }
        points.push(TouchPoint {
            phase: TouchPhase::End,
            x: self.end_x,
            y: self.end_y,
            offset: total,
        });
        points
    }
}
