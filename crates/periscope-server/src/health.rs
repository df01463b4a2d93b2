//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

use crate::shutdown::ShutdownPhase;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` while serving, `"shutting_down"` once draining starts.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Viewers currently registered.
    pub viewers: usize,
    /// Shutdown phase.
    pub phase: ShutdownPhase,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, viewers: usize, phase: ShutdownPhase) -> HealthResponse {
    let status = if phase == ShutdownPhase::Running {
        "ok"
    } else {
        "shutting_down"
    };
    HealthResponse {
        status: status.into(),
        uptime_secs: start_time.elapsed().as_secs(),
        viewers,
        phase,
    }
}
