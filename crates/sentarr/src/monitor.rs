//! The tail → aggregate → notify loop.
//!
//! Lines are processed strictly in file order: a line is classified, counted
//! and (if it fires) dispatched to every channel before the next line is read.
//! Channels are snapshotted per alert, so a reload never changes the channel
//! list of an alert that is already being delivered.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use sentarr_alerts::{
    Aggregator, Alert, AlertStore, ChannelConfig, ChannelResult, Notifier, Outcome, Severity,
};
use sentarr_logs::{LogLine, LogTailer};
use tracing::{debug, error, info, warn};

use crate::config::SentarrConfig;
use crate::error::MonitorError;

/// Shared, swappable runtime settings.
///
/// Cloned into the reload task; every clone updates the same monitor.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    aggregator: Arc<Aggregator>,
    channels: Arc<RwLock<Vec<ChannelConfig>>>,
}

impl ConfigHandle {
    /// Validates `config` and swaps in its aggregator settings and channels.
    ///
    /// On error nothing changes. The log path and tailer settings only take
    /// effect on restart.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid.
    pub fn apply(&self, config: &SentarrConfig) -> Result<(), MonitorError> {
        config.validate()?;
        self.aggregator.update_config(config.monitor.clone())?;
        *self.channels.write() = config.channels.clone();
        info!(channels = config.channels.len(), "configuration reloaded");
        Ok(())
    }

    /// A copy of the current channel list.
    #[must_use]
    pub fn channels(&self) -> Vec<ChannelConfig> {
        self.channels.read().clone()
    }
}

/// Follows one Plex log and alerts on it.
#[derive(Debug)]
pub struct Monitor {
    tailer: LogTailer,
    handle: ConfigHandle,
    notifier: Notifier,
}

impl Monitor {
    /// Creates a monitor for `config`, storing fired alerts in `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &SentarrConfig, store: AlertStore) -> Result<Self, MonitorError> {
        config.validate()?;
        let aggregator = Aggregator::new(config.monitor.clone(), store)?;
        Ok(Self {
            tailer: LogTailer::new(config.log_file(), config.tailer_config()),
            handle: ConfigHandle {
                aggregator: Arc::new(aggregator),
                channels: Arc::new(RwLock::new(config.channels.clone())),
            },
            notifier: Notifier::new(),
        })
    }

    /// Replaces the notifier (for a shared HTTP client).
    #[must_use]
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Returns a handle for runtime reconfiguration.
    #[must_use]
    pub fn config_handle(&self) -> ConfigHandle {
        self.handle.clone()
    }

    /// Returns the aggregator.
    #[must_use]
    pub fn aggregator(&self) -> &Aggregator {
        &self.handle.aggregator
    }

    /// Returns the alert store.
    #[must_use]
    pub fn store(&self) -> &AlertStore {
        self.handle.aggregator.store()
    }

    /// Returns the followed log file.
    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.tailer.path().to_path_buf()
    }

    /// Processes one line.
    ///
    /// Returns the delivery results if the line fired an alert. Errors on a
    /// single line are logged and skipped.
    pub async fn handle_line(&self, line: &LogLine) -> Option<Vec<ChannelResult>> {
        match self.handle.aggregator.observe(line) {
            Ok(Outcome::Fired(alert)) => Some(self.dispatch(&alert).await),
            Ok(_) => None,
            Err(e) => {
                warn!(offset = line.offset, error = %e, "skipping log line");
                None
            }
        }
    }

    /// Sends an alert to the current channels, bypassing the aggregator.
    pub async fn dispatch(&self, alert: &Alert) -> Vec<ChannelResult> {
        let channels = self.handle.channels();
        if channels.iter().all(|c| !c.enabled) {
            debug!(alert_id = %alert.id, "no enabled channels");
        }
        self.notifier.dispatch(alert, &channels).await
    }

    /// Follows the log until `shutdown` completes or tailing fails for good.
    ///
    /// Sends a "Sentarr Started" notification once the log file is attached
    /// (or immediately if it does not exist yet) and a "Sentarr Crashed"
    /// notification before returning a fatal error.
    ///
    /// # Errors
    ///
    /// Returns an error once the tailer has exhausted its I/O retries.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<(), MonitorError>
    where
        F: Future<Output = ()> + Send,
    {
        let log_file = self.log_file();
        if let Err(e) = self.tailer.attach() {
            warn!(path = %log_file.display(), error = %e, "log file not available yet");
        }
        info!(path = %log_file.display(), "monitoring Plex log");
        self.dispatch(&started_alert(&log_file)).await;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("shutting down");
                    return Ok(());
                }
                next = self.tailer.next_line() => match next {
                    Ok(line) => {
                        self.handle_line(&line).await;
                    }
                    Err(e) => {
                        error!(error = %e, "log tailing failed");
                        self.dispatch(&crashed_alert(&e.to_string())).await;
                        return Err(e.into());
                    }
                }
            }
        }
    }
}

/// The notification sent when monitoring starts.
#[must_use]
pub fn started_alert(log_file: &std::path::Path) -> Alert {
    Alert::new(
        "Sentarr Started",
        "Plex log monitoring has started.",
        Severity::Info,
        Utc::now(),
    )
    .with_detail("Log File", log_file.display().to_string())
}

/// The notification sent when monitoring stops on a fatal error.
#[must_use]
pub fn crashed_alert(reason: &str) -> Alert {
    Alert::new(
        "Sentarr Crashed",
        format!("Plex log monitoring stopped: {reason}"),
        Severity::Critical,
        Utc::now(),
    )
    .with_detail("Error", reason)
}
