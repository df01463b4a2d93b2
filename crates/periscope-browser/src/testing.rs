//! In-memory [`AutomationFacade`] for tests.
//!
//! [`RecordingFacade`] records every call except captures (which run every
//! tick and are only counted), and lets a test script what captures return.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use periscope_core::TouchPoint;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::BrowserError;
use crate::facade::AutomationFacade;

/// A recorded facade call.
#[derive(Clone, Debug, PartialEq)]
pub enum FacadeCall {
    /// `navigate(url)`
    Navigate(String),
    /// `evaluate(script)`
    Evaluate(String),
    /// `click_at(x, y)`
    ClickAt {
        /// x
        x: f64,
        /// y
        y: f64,
    },
    /// `dispatch_touch(point)`
    Touch(TouchPoint),
    /// `close_popup(target_id)`
    ClosePopup(String),
    /// `cancel()`
    Cancel,
}

/// What `capture_frame` does.
#[derive(Clone, Debug)]
pub enum CaptureBehavior {
    /// Return these bytes.
    Frame(Vec<u8>),
    /// Return an empty buffer.
    Empty,
    /// Fail with an action error.
    Fail,
    /// Fail with a timeout error.
    TimedOut,
    /// Never complete.
    Hang,
}

/// Recording fake facade.
pub struct RecordingFacade {
    calls: Mutex<Vec<FacadeCall>>,
    observer: Mutex<Option<mpsc::UnboundedSender<FacadeCall>>>,
    capture: Mutex<CaptureBehavior>,
    evaluate_result: Mutex<Value>,
    captures: AtomicUsize,
    cancels: AtomicUsize,
    cancelled: AtomicBool,
}

impl RecordingFacade {
    /// A facade whose captures return a tiny JPEG header.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            observer: Mutex::new(None),
            capture: Mutex::new(CaptureBehavior::Frame(vec![0xFF, 0xD8, 0xFF, 0xE0])),
            evaluate_result: Mutex::new(Value::Null),
            captures: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
        })
    }

    /// Stream every recorded call to the returned receiver from now on.
    pub fn observe(&self) -> mpsc::UnboundedReceiver<FacadeCall> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.observer.lock() = Some(tx);
        rx
    }

    /// Change what captures return.
    pub fn set_capture(&self, behavior: CaptureBehavior) {
        *self.capture.lock() = behavior;
    }

    /// Change what `evaluate` resolves to.
    pub fn set_evaluate_result(&self, value: Value) {
        *self.evaluate_result.lock() = value;
    }

    /// Calls recorded so far.
    pub fn calls(&self) -> Vec<FacadeCall> {
        self.calls.lock().clone()
    }

    /// Number of `capture_frame` calls.
    pub fn capture_count(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    /// Number of `cancel` calls.
    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    fn record(&self, call: FacadeCall) -> Result<(), BrowserError> {
        if self.cancelled.load(Ordering::SeqCst) && call != FacadeCall::Cancel {
            return Err(BrowserError::Cancelled);
        }
        self.calls.lock().push(call.clone());
        if let Some(tx) = self.observer.lock().as_ref() {
            let _ = tx.send(call);
        }
        Ok(())
    }
}

#[async_trait]
impl AutomationFacade for RecordingFacade {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.record(FacadeCall::Navigate(url.to_owned()))
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        self.record(FacadeCall::Evaluate(script.to_owned()))?;
        Ok(self.evaluate_result.lock().clone())
    }

    async fn click_at(&self, x: f64, y: f64) -> Result<(), BrowserError> {
        self.record(FacadeCall::ClickAt { x, y })
    }

    async fn dispatch_touch(&self, point: &TouchPoint) -> Result<(), BrowserError> {
        self.record(FacadeCall::Touch(*point))
    }

    async fn capture_frame(&self, timeout: Duration) -> Result<Vec<u8>, BrowserError> {
        let _ = self.captures.fetch_add(1, Ordering::SeqCst);
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(BrowserError::Cancelled);
        }
        let behavior = self.capture.lock().clone();
        match behavior {
            CaptureBehavior::Frame(bytes) => Ok(bytes),
            CaptureBehavior::Empty => Ok(Vec::new()),
            CaptureBehavior::Fail => Err(BrowserError::ActionFailed {
                action: "capture".into(),
                reason: "target crashed".into(),
            }),
            CaptureBehavior::TimedOut => Err(BrowserError::timeout(timeout, "capture")),
            CaptureBehavior::Hang => std::future::pending().await,
        }
    }

    async fn close_popup(&self, target_id: &str) -> Result<(), BrowserError> {
        self.record(FacadeCall::ClosePopup(target_id.to_owned()))
    }

    async fn cancel(&self) {
        let _ = self.cancels.fetch_add(1, Ordering::SeqCst);
        self.cancelled.store(true, Ordering::SeqCst);
        let _ = self.record(FacadeCall::Cancel);
    }
}
