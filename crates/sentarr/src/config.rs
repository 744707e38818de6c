//! Monitor configuration.
//!
//! Configuration for the Sentarr monitor, loaded from a TOML file:
//! - The Plex log file or directory to follow
//! - Thresholds, window and cooldown (`[monitor]`)
//! - Tailer polling and retry policy (`[tailer]`)
//! - Notification channels (`[[channels]]`)

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sentarr_alerts::{AggregatorConfig, ChannelConfig, ChannelSettings, EmailSettings};
use sentarr_logs::{DEFAULT_MAX_LINE_BYTES, TailerConfig, resolve_log_file};
use serde::{Deserialize, Serialize};

use crate::error::MonitorError;

/// Where the config file is looked up when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "/config/sentarr.toml";

/// The Plex log directory inside the standard Plex container layout.
pub const DEFAULT_LOG_PATH: &str = "/config/Library/Application Support/Plex Media Server/Logs";

/// Polling and retry settings for the log tailer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TailerSettings {
    /// Sleep between polls when no new data is available, in milliseconds.
    pub poll_interval_ms: u64,
    /// Consecutive I/O failures tolerated before the monitor exits.
    pub max_io_retries: u32,
    /// Initial retry delay in milliseconds, doubled per failure.
    pub retry_backoff_ms: u64,
    /// Longer lines are skipped without being buffered.
    pub max_line_bytes: usize,
}

impl Default for TailerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            max_io_retries: 5,
            retry_backoff_ms: 1000,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

/// Main monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SentarrConfig {
    /// Plex log file, or the directory containing `Plex Media Server.log`.
    pub log_path: PathBuf,
    /// Replay the existing file instead of starting at its end.
    pub start_at_beginning: bool,
    /// Aggregator thresholds.
    pub monitor: AggregatorConfig,
    /// Tailer settings.
    pub tailer: TailerSettings,
    /// Notification channels.
    pub channels: Vec<ChannelConfig>,
}

impl Default for SentarrConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            start_at_beginning: false,
            monitor: AggregatorConfig::default(),
            tailer: TailerSettings::default(),
            channels: Vec::new(),
        }
    }
}

impl SentarrConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MonitorError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            MonitorError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self, MonitorError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| MonitorError::Config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, MonitorError> {
        toml::to_string_pretty(self)
            .map_err(|e| MonitorError::Config(format!("failed to serialize config: {e}")))
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.log_path.as_os_str().is_empty() {
            return Err(MonitorError::Config("log_path cannot be empty".to_string()));
        }

        self.monitor
            .validate()
            .map_err(|e| MonitorError::Config(format!("monitor: {e}")))?;

        if self.tailer.poll_interval_ms == 0 {
            return Err(MonitorError::Config(
                "tailer.poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.tailer.max_line_bytes == 0 {
            return Err(MonitorError::Config(
                "tailer.max_line_bytes must be greater than 0".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for channel in &self.channels {
            channel
                .validate()
                .map_err(|e| MonitorError::Config(format!("channels: {e}")))?;
            if !names.insert(channel.name.as_str()) {
                return Err(MonitorError::Config(format!(
                    "duplicate channel name '{}'",
                    channel.name
                )));
            }
        }

        Ok(())
    }

    /// The file the tailer follows.
    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        resolve_log_file(&self.log_path)
    }

    /// Tailer settings in the tailer's own terms.
    #[must_use]
    pub fn tailer_config(&self) -> TailerConfig {
        TailerConfig::default()
            .with_poll_interval(Duration::from_millis(self.tailer.poll_interval_ms))
            .from_beginning(self.start_at_beginning)
            .with_retries(
                self.tailer.max_io_retries,
                Duration::from_millis(self.tailer.retry_backoff_ms),
            )
            .with_max_line_bytes(self.tailer.max_line_bytes)
    }

    /// Looks up a channel by name.
    #[must_use]
    pub fn channel(&self, name: &str) -> Option<&ChannelConfig> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// A starter configuration with one disabled channel of every kind.
    #[must_use]
    pub fn sample() -> Self {
        let email = ChannelConfig::new(
            "email",
            ChannelSettings::Email(EmailSettings {
                smtp_host: "smtp.gmail.com".to_string(),
                smtp_port: 587,
                username: Some("you@gmail.com".to_string()),
                password: Some("app-password".to_string()),
                from: "you@gmail.com".to_string(),
                to: vec!["you@gmail.com".to_string()],
                starttls: true,
            }),
        );

        Self {
            channels: vec![
                ChannelConfig::discord("discord", "https://discord.com/api/webhooks/ID/TOKEN")
                    .with_enabled(false),
                ChannelConfig::slack("slack", "https://hooks.slack.com/services/T000/B000/XXXX")
                    .with_enabled(false),
                ChannelConfig::webhook("webhook", "https://example.com/sentarr")
                    .with_enabled(false),
                email.with_enabled(false),
            ],
            ..Self::default()
        }
    }
}
