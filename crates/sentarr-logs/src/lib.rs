//! # sentarr-logs
//!
//! Log file tailing for the Sentarr Plex monitor.
//!
//! This crate provides:
//!
//! - [`LogLine`] - A single line read from a followed log file
//! - [`LogTailer`] - `tail -F` equivalent that survives truncation and rotation
//! - [`TailerConfig`] - Poll interval, start position and I/O retry policy
//! - [`resolve_log_file`] - Maps a Plex log directory to its main log file
//!
//! ## Example
//!
//! ```rust,no_run
//! use sentarr_logs::{LogTailer, TailerConfig};
//!
//! # async fn run() -> sentarr_logs::Result<()> {
//! let mut tailer = LogTailer::new("/var/log/plex/Plex Media Server.log", TailerConfig::default());
//! loop {
//!     let line = tailer.next_line().await?;
//!     println!("{} @ {}: {}", line.offset, line.received_at, line.text);
//! }
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod tailer;
pub mod types;

// Re-export main types
pub use error::{Result, TailError};
pub use tailer::{
    DEFAULT_MAX_LINE_BYTES, LogTailer, PLEX_MAIN_LOG, TailerConfig, resolve_log_file,
};
pub use types::LogLine;
