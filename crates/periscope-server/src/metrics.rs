//! Prometheus recorder and metric names.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::error::ServerError;

/// Install the global Prometheus recorder.
///
/// Call once at startup before anything records. The returned handle renders
/// `/metrics`.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// Viewer connections accepted (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Viewer connections currently open (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Viewer connections closed (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Frames delivered to viewers (counter).
pub const FRAMES_SENT_TOTAL: &str = "frames_sent_total";
/// Captures that failed for reasons other than a timeout (counter).
pub const FRAME_CAPTURE_FAILURES_TOTAL: &str = "frame_capture_failures_total";
/// Commands accepted (counter, labels: tag).
pub const COMMANDS_TOTAL: &str = "commands_total";
/// Messages rejected at decode (counter).
pub const COMMANDS_REJECTED_TOTAL: &str = "commands_rejected_total";
