//! Error types for log tailing.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while following a log file.
#[derive(Debug, Error)]
pub enum TailError {
    /// An I/O error occurred while opening, stat-ing or reading the file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The followed path exists but is not a regular file.
    #[error("not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    /// The file stayed unreadable after every retry attempt.
    #[error("giving up on {} after {attempts} attempts: {source}", path.display())]
    RetriesExhausted {
        /// The path being followed.
        path: PathBuf,
        /// Number of consecutive failed attempts.
        attempts: u32,
        /// The last error observed.
        #[source]
        source: Box<TailError>,
    },
}

/// Result type alias for tailing operations.
pub type Result<T> = std::result::Result<T, TailError>;
