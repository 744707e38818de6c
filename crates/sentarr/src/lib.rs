//! # sentarr
//!
//! The Sentarr Plex monitor: configuration and the tail → aggregate → notify
//! pipeline behind the `sentarr` binary.
//!
//! - [`config`] - TOML configuration with validation
//! - [`monitor`] - [`Monitor`], the ordered per-line pipeline, and
//!   [`ConfigHandle`] for hot reload
//! - [`error`] - [`MonitorError`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod monitor;

pub use config::{DEFAULT_CONFIG_PATH, DEFAULT_LOG_PATH, SentarrConfig, TailerSettings};
pub use error::MonitorError;
pub use monitor::{ConfigHandle, Monitor, crashed_alert, started_alert};
