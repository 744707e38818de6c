//! Error types for the sentarr binary.

use sentarr_alerts::AlertError;
use sentarr_logs::TailError;
use thiserror::Error;

/// Errors that can stop the monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Configuration could not be read or is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The log file could not be followed.
    #[error("log tailing failed: {0}")]
    Tail(#[from] TailError),

    /// Alerting pipeline error.
    #[error("alerting error: {0}")]
    Alert(#[from] AlertError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
