//! In-memory [`DeviceBridge`] for tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::{DeviceAction, DeviceBridge, DeviceError};

/// Records every action instead of touching the host.
#[derive(Default)]
pub struct RecordingBridge {
    actions: Mutex<Vec<DeviceAction>>,
    observer: Mutex<Option<mpsc::UnboundedSender<DeviceAction>>>,
}

impl RecordingBridge {
    /// A fresh bridge.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Stream every action to the returned receiver from now on.
    pub fn observe(&self) -> mpsc::UnboundedReceiver<DeviceAction> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.observer.lock() = Some(tx);
        rx
    }

    /// Actions performed so far.
    pub fn actions(&self) -> Vec<DeviceAction> {
        self.actions.lock().clone()
    }
}

#[async_trait]
impl DeviceBridge for RecordingBridge {
    async fn perform(&self, action: DeviceAction) -> Result<(), DeviceError> {
        self.actions.lock().push(action);
        if let Some(tx) = self.observer.lock().as_ref() {
            let _ = tx.send(action);
        }
        Ok(())
    }
}
