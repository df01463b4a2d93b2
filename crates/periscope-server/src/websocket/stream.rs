//! Per-viewer frame streaming.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use periscope_browser::{AutomationFacade, BrowserError};
use periscope_core::FrameMessage;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{debug, trace, warn};

use super::connection::ViewerConnection;
use super::registry::SessionRegistry;
use crate::metrics::{FRAME_CAPTURE_FAILURES_TOTAL, FRAMES_SENT_TOTAL};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// A viewer that takes longer than this to accept one frame is dropped.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Capture pacing for one viewer.
#[derive(Clone, Copy, Debug)]
pub struct FrameTiming {
    /// Time between captures.
    pub interval: Duration,
    /// Upper bound on one capture.
    pub capture_timeout: Duration,
}

/// Why a stream loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamExit {
    /// A frame could not be delivered; the viewer was unregistered.
    Disconnected,
    /// The viewer token fired or the browser is gone.
    Cancelled,
}

/// Push frames to one viewer until it goes away.
///
/// Slow or failed captures skip a tick and keep the viewer connected. A failed
/// send, or one stuck for [`SEND_TIMEOUT`], unregisters the viewer and ends the
/// loop. The shared browser is never cancelled from here.
pub async fn stream_frames(
    connection: Arc<ViewerConnection>,
    registry: Arc<SessionRegistry>,
    facade: Arc<dyn AutomationFacade>,
    timing: FrameTiming,
) -> StreamExit {
    let token = connection.token().clone();
    let mut ticker = interval(timing.interval.max(MIN_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = token.cancelled() => return StreamExit::Cancelled,
            _ = ticker.tick() => {}
        }

        let captured = tokio::select! {
            () = token.cancelled() => return StreamExit::Cancelled,
            result = timeout(timing.capture_timeout, facade.capture_frame(timing.capture_timeout)) => result,
        };
        let bytes = match captured {
            Err(_) => {
                trace!("capture timed out, skipping frame");
                continue;
            }
            Ok(Err(BrowserError::Cancelled)) => {
                debug!("browser cancelled, stopping frame stream");
                return StreamExit::Cancelled;
            }
            Ok(Err(error)) if error.is_timeout() => {
                trace!("capture timed out, skipping frame");
                continue;
            }
            Ok(Err(error)) => {
                counter!(FRAME_CAPTURE_FAILURES_TOTAL).increment(1);
                warn!(%error, "frame capture failed");
                continue;
            }
            Ok(Ok(bytes)) if bytes.is_empty() => {
                trace!("empty frame, skipping");
                continue;
            }
            Ok(Ok(bytes)) => bytes,
        };

        let text = match FrameMessage::from_jpeg(&bytes).to_json() {
            Ok(text) => text,
            Err(error) => {
                warn!(%error, "failed to encode frame");
                continue;
            }
        };
        let sent = tokio::select! {
            () = token.cancelled() => return StreamExit::Cancelled,
            sent = timeout(SEND_TIMEOUT, registry.send_to(&connection, text)) => sent,
        };
        match sent {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                debug!(%error, "frame send failed, dropping viewer");
                let _ = registry.release(&connection).await;
                return StreamExit::Disconnected;
            }
            Err(_) => {
                warn!("viewer stopped reading, dropping it");
                let _ = registry.release(&connection).await;
                return StreamExit::Disconnected;
            }
        }
        counter!(FRAMES_SENT_TOTAL).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::ws::Message;
    use futures::StreamExt;
    use periscope_browser::testing::{CaptureBehavior, RecordingFacade};

    use super::*;
    use crate::websocket::connection::test_support::{channel_connection, stalled_connection};

    const TIMING: FrameTiming = FrameTiming {
        interval: Duration::from_millis(100),
        capture_timeout: Duration::from_secs(2),
    };

    fn start(
        facade: &Arc<RecordingFacade>,
        conn: ViewerConnection,
    ) -> (
        Arc<ViewerConnection>,
        Arc<SessionRegistry>,
        tokio::task::JoinHandle<StreamExit>,
    ) {
        let conn = Arc::new(conn);
        let registry = Arc::new(SessionRegistry::new());
        let _ = registry.register(Arc::clone(&conn));
        let handle = tokio::spawn(stream_frames(
            Arc::clone(&conn),
            Arc::clone(&registry),
            facade.clone(),
            TIMING,
        ));
        (conn, registry, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn sends_screenshot_frames() {
        let facade = RecordingFacade::new();
        facade.set_capture(CaptureBehavior::Frame(vec![1, 2, 3]));
        let (conn, mut rx) = channel_connection("viewer_a");
        let (conn, _registry, handle) = start(&facade, conn);

        let Some(Message::Text(text)) = rx.next().await else {
            panic!("expected a frame");
        };
        let json: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(json["type"], "screenshot");
        assert_eq!(json["payload"], "AQID");

        conn.token().cancel();
        assert_eq!(handle.await.unwrap(), StreamExit::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn capture_timeout_keeps_viewer() {
        let facade = RecordingFacade::new();
        facade.set_capture(CaptureBehavior::Hang);
        let (conn, _rx) = channel_connection("viewer_a");
        let (conn, registry, handle) = start(&facade, conn);

        tokio::time::sleep(Duration::from_secs(7)).await;

        assert!(facade.capture_count() >= 3);
        assert!(registry.contains(conn.id()));
        assert!(conn.is_alive());
        assert!(!handle.is_finished());

        conn.token().cancel();
        assert_eq!(handle.await.unwrap(), StreamExit::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_and_empty_captures_are_skipped() {
        let facade = RecordingFacade::new();
        facade.set_capture(CaptureBehavior::Fail);
        let (conn, mut rx) = channel_connection("viewer_a");
        let (conn, registry, handle) = start(&facade, conn);

        tokio::time::sleep(Duration::from_millis(350)).await;
        facade.set_capture(CaptureBehavior::Empty);
        tokio::time::sleep(Duration::from_millis(300)).await;
        facade.set_capture(CaptureBehavior::TimedOut);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(registry.contains(conn.id()));

        facade.set_capture(CaptureBehavior::Frame(vec![9]));
        assert!(rx.next().await.is_some());

        conn.token().cancel();
        assert_eq!(handle.await.unwrap(), StreamExit::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn send_failure_unregisters() {
        let facade = RecordingFacade::new();
        let (conn, rx) = channel_connection("viewer_a");
        drop(rx);
        let (conn, registry, handle) = start(&facade, conn);

        assert_eq!(handle.await.unwrap(), StreamExit::Disconnected);
        assert!(!registry.contains(conn.id()));
        assert!(conn.token().is_cancelled());
        assert_eq!(facade.cancel_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unregister_stops_stream() {
        let facade = RecordingFacade::new();
        let (conn, _rx) = channel_connection("viewer_a");
        let (conn, registry, handle) = start(&facade, conn);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(registry.unregister(conn.id()).await);

        assert_eq!(handle.await.unwrap(), StreamExit::Cancelled);
        assert_eq!(facade.cancel_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_browser_ends_stream() {
        let facade = RecordingFacade::new();
        facade.cancel().await;
        let (conn, _rx) = channel_connection("viewer_a");
        let (_conn, _registry, handle) = start(&facade, conn);

        assert_eq!(handle.await.unwrap(), StreamExit::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn unregister_interrupts_stuck_send() {
        let facade = RecordingFacade::new();
        let (conn, registry, handle) = start(&facade, stalled_connection("viewer_a"));
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(facade.capture_count() >= 1);

        let removed = timeout(Duration::from_secs(3), registry.unregister(conn.id())).await;

        assert_eq!(removed, Ok(true));
        let exit = timeout(Duration::from_secs(3), handle).await.unwrap().unwrap();
        assert_eq!(exit, StreamExit::Cancelled);
        assert_eq!(facade.cancel_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_viewer_is_dropped_after_send_timeout() {
        let facade = RecordingFacade::new();
        let (conn, registry, handle) = start(&facade, stalled_connection("viewer_a"));

        let exit = timeout(SEND_TIMEOUT * 2, handle).await.unwrap().unwrap();

        assert_eq!(exit, StreamExit::Disconnected);
        assert!(!registry.contains(conn.id()));
        assert!(conn.token().is_cancelled());
        assert_eq!(facade.cancel_count(), 0);
    }
}
