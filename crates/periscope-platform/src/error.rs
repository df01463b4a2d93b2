//! Device bridge errors.

use thiserror::Error;

/// Errors from host device control.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The helper program could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program name.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The helper program ran and reported failure.
    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        /// Program name.
        program: String,
        /// Exit status as reported by the OS.
        status: String,
        /// Trimmed standard error output.
        stderr: String,
    },

    /// This host has no implementation for the action.
    #[error("{action} is not supported on {os}")]
    Unsupported {
        /// Action name.
        action: &'static str,
        /// Target OS name.
        os: &'static str,
    },
}
