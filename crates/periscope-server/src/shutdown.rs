//! Shutdown orchestration.
//!
//! Teardown runs through observable phases:
//!
//! 1. **Draining**: the shutdown token is cancelled. The listener stops
//!    accepting, `/ws` refuses upgrades, and every viewer token (a child of
//!    the shutdown token) fires. Waits up to `drain_timeout` for the listener
//!    task and all viewer sessions.
//! 2. **Terminating**: the shared browser is cancelled, exactly once.
//! 3. **Exited**: reached after `settle_period`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use periscope_browser::AutomationFacade;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Where shutdown currently stands. Phases only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownPhase {
    /// Serving viewers.
    Running,
    /// Refusing new viewers, waiting for existing ones to go.
    Draining,
    /// Tearing down the shared browser.
    Terminating,
    /// Done.
    Exited,
}

impl ShutdownPhase {
    /// Stable name for logs and `/health`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Terminating => "terminating",
            Self::Exited => "exited",
        }
    }
}

/// Drives shutdown and owns the only path that cancels the shared browser.
pub struct ShutdownOrchestrator {
    token: CancellationToken,
    phase: watch::Sender<ShutdownPhase>,
    viewers: TaskTracker,
    facade: Arc<dyn AutomationFacade>,
    facade_cancelled: AtomicBool,
    drain_timeout: Duration,
    settle_period: Duration,
}

impl ShutdownOrchestrator {
    /// Orchestrator for `facade` with the given drain and settle bounds.
    pub fn new(
        facade: Arc<dyn AutomationFacade>,
        drain_timeout: Duration,
        settle_period: Duration,
    ) -> Self {
        let (phase, _) = watch::channel(ShutdownPhase::Running);
        Self {
            token: CancellationToken::new(),
            phase,
            viewers: TaskTracker::new(),
            facade,
            facade_cancelled: AtomicBool::new(false),
            drain_timeout,
            settle_period,
        }
    }

    /// Clone of the shutdown token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Fresh token for one viewer, cancelled when shutdown begins.
    pub fn viewer_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Tracker that viewer sessions run under, so draining can wait on them.
    pub fn tracker(&self) -> &TaskTracker {
        &self.viewers
    }

    /// Current phase.
    pub fn phase(&self) -> ShutdownPhase {
        *self.phase.borrow()
    }

    /// Watch phase transitions.
    pub fn subscribe(&self) -> watch::Receiver<ShutdownPhase> {
        self.phase.subscribe()
    }

    /// Whether new viewers should be refused.
    pub fn is_draining(&self) -> bool {
        self.phase() != ShutdownPhase::Running || self.token.is_cancelled()
    }

    /// Run the full teardown. `listeners` are the server tasks to drain.
    ///
    /// Safe to call more than once; the browser is cancelled on the first
    /// call only.
    pub async fn run(&self, listeners: Vec<JoinHandle<()>>) {
        self.advance(ShutdownPhase::Draining);
        info!(viewers = self.viewers.len(), "shutdown: draining");
        self.token.cancel();
        let _ = self.viewers.close();

        let aborts: Vec<_> = listeners.iter().map(JoinHandle::abort_handle).collect();
        let drain = async {
            let _ = futures::future::join_all(listeners).await;
            self.viewers.wait().await;
        };
        if tokio::time::timeout(self.drain_timeout, drain).await.is_err() {
            warn!(
                timeout_ms = u64::try_from(self.drain_timeout.as_millis()).unwrap_or(u64::MAX),
                remaining_viewers = self.viewers.len(),
                "drain timed out, terminating anyway"
            );
            for abort in aborts {
                abort.abort();
            }
        }

        self.terminate().await;

        if !self.settle_period.is_zero() {
            tokio::time::sleep(self.settle_period).await;
        }
        self.advance(ShutdownPhase::Exited);
        info!("shutdown complete");
    }

    async fn terminate(&self) {
        self.advance(ShutdownPhase::Terminating);
        if self.facade_cancelled.swap(true, Ordering::SeqCst) {
            debug!("browser already cancelled");
            return;
        }
        info!("shutdown: cancelling shared browser");
        self.facade.cancel().await;
    }

    fn advance(&self, next: ShutdownPhase) {
        let moved = self.phase.send_if_modified(|phase| {
            if next > *phase {
                *phase = next;
                true
            } else {
                false
            }
        });
        if moved {
            debug!(phase = next.as_str(), "shutdown phase changed");
        }
    }
}
