//! Relay server errors.

use thiserror::Error;

/// Errors from the relay server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not bind.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Socket-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The viewer's socket is already closed.
    #[error("viewer connection closed")]
    ConnectionClosed,

    /// Writing a frame to the viewer failed.
    #[error("send failed: {0}")]
    Send(#[source] axum::Error),

    /// The Prometheus recorder could not be installed.
    #[error("failed to install metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}
