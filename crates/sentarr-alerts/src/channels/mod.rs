//! Notification channels for alert delivery.
//!
//! Each channel kind has its own settings struct; [`ChannelConfig`] is the
//! tagged union read from configuration and [`ChannelConfig::build`] turns it
//! into a [`NotificationChannel`] the notifier can drive.

mod discord;
mod email;
mod slack;
mod webhook;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AlertError, Result};
use crate::types::{Alert, Severity};

pub use discord::DiscordChannel;
pub use email::EmailChannel;
pub use slack::SlackChannel;
pub use webhook::WebhookChannel;

/// Default per-channel delivery timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// The content every channel delivers, whatever its wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Alert title.
    pub title: String,
    /// Alert message.
    pub message: String,
    /// Alert severity.
    pub severity: Severity,
    /// Alert creation time, RFC 3339.
    pub timestamp: String,
    /// Alert details as string or number values.
    pub details: BTreeMap<String, serde_json::Value>,
}

impl NotificationPayload {
    /// Builds the payload for an alert.
    #[must_use]
    pub fn from_alert(alert: &Alert) -> Self {
        let details = alert
            .details
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(_) | serde_json::Value::Number(_) => v.clone(),
                    other => serde_json::Value::String(other.to_string()),
                };
                (k.clone(), value)
            })
            .collect();

        Self {
            title: alert.title.clone(),
            message: alert.message.clone(),
            severity: alert.severity,
            timestamp: alert.timestamp.to_rfc3339(),
            details,
        }
    }

    /// Details rendered as display strings, in key order.
    #[must_use]
    pub fn detail_pairs(&self) -> Vec<(String, String)> {
        self.details
            .iter()
            .map(|(k, v)| {
                let text = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), text)
            })
            .collect()
    }
}

/// The supported channel kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// SMTP email.
    Email,
    /// Discord webhook.
    Discord,
    /// Slack incoming webhook.
    Slack,
    /// Generic JSON webhook.
    Webhook,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Discord => write!(f, "discord"),
            Self::Slack => write!(f, "slack"),
            Self::Webhook => write!(f, "webhook"),
        }
    }
}

/// SMTP settings for an email channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailSettings {
    /// SMTP relay host.
    pub smtp_host: String,
    /// SMTP port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP username.
    #[serde(default)]
    pub username: Option<String>,
    /// SMTP password.
    #[serde(default)]
    pub password: Option<String>,
    /// Sender address.
    pub from: String,
    /// Recipient addresses.
    pub to: Vec<String>,
    /// Upgrade the connection with STARTTLS.
    #[serde(default = "default_true")]
    pub starttls: bool,
}

/// Settings for a Discord webhook channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordSettings {
    /// The Discord webhook URL.
    pub webhook_url: String,
    /// Overrides the webhook's display name.
    #[serde(default)]
    pub username: Option<String>,
}

/// Settings for a Slack webhook channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackSettings {
    /// The Slack incoming webhook URL.
    pub webhook_url: String,
    /// Overrides the webhook's default channel.
    #[serde(default)]
    pub channel: Option<String>,
}

/// Settings for a generic webhook channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookSettings {
    /// The URL to POST to.
    pub url: String,
    /// Extra HTTP headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Kind-specific channel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChannelSettings {
    /// SMTP email.
    Email(EmailSettings),
    /// Discord webhook.
    Discord(DiscordSettings),
    /// Slack incoming webhook.
    Slack(SlackSettings),
    /// Generic JSON webhook.
    Webhook(WebhookSettings),
}

impl ChannelSettings {
    /// Returns the kind of these settings.
    #[must_use]
    pub const fn kind(&self) -> ChannelKind {
        match self {
            Self::Email(_) => ChannelKind::Email,
            Self::Discord(_) => ChannelKind::Discord,
            Self::Slack(_) => ChannelKind::Slack,
            Self::Webhook(_) => ChannelKind::Webhook,
        }
    }
}

/// One configured channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Unique channel name, used in logs and results.
    pub name: String,
    /// Disabled channels are skipped.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Delivery timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Kind-specific settings.
    #[serde(flatten)]
    pub settings: ChannelSettings,
}

const fn default_true() -> bool {
    true
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

const fn default_smtp_port() -> u16 {
    587
}

impl ChannelConfig {
    /// Creates an enabled channel with the default timeout.
    #[must_use]
    pub fn new(name: impl Into<String>, settings: ChannelSettings) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            settings,
        }
    }

    /// Creates a Discord channel.
    #[must_use]
    pub fn discord(name: impl Into<String>, webhook_url: impl Into<String>) -> Self {
        Self::new(
            name,
            ChannelSettings::Discord(DiscordSettings {
                webhook_url: webhook_url.into(),
                username: None,
            }),
        )
    }

    /// Creates a Slack channel.
    #[must_use]
    pub fn slack(name: impl Into<String>, webhook_url: impl Into<String>) -> Self {
        Self::new(
            name,
            ChannelSettings::Slack(SlackSettings {
                webhook_url: webhook_url.into(),
                channel: None,
            }),
        )
    }

    /// Creates a generic webhook channel.
    #[must_use]
    pub fn webhook(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(
            name,
            ChannelSettings::Webhook(WebhookSettings {
                url: url.into(),
                headers: BTreeMap::new(),
            }),
        )
    }

    /// Sets whether the channel is enabled.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the delivery timeout.
    #[must_use]
    pub const fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Returns the channel kind.
    #[must_use]
    pub const fn kind(&self) -> ChannelKind {
        self.settings.kind()
    }

    /// Returns the delivery timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validates the channel.
    ///
    /// Connection parameters are only checked for enabled channels.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidConfig` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AlertError::config("channel name cannot be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(AlertError::config(format!(
                "channel '{}': timeout_secs must be at least 1",
                self.name
            )));
        }
        if !self.enabled {
            return Ok(());
        }

        match &self.settings {
            ChannelSettings::Discord(DiscordSettings { webhook_url: url, .. })
            | ChannelSettings::Slack(SlackSettings { webhook_url: url, .. })
            | ChannelSettings::Webhook(WebhookSettings { url, .. }) => {
                validate_url(&self.name, url)
            }
            ChannelSettings::Email(email) => {
                if email.smtp_host.trim().is_empty() {
                    return Err(AlertError::config(format!(
                        "channel '{}': smtp_host cannot be empty",
                        self.name
                    )));
                }
                if email.from.trim().is_empty() {
                    return Err(AlertError::config(format!(
                        "channel '{}': from cannot be empty",
                        self.name
                    )));
                }
                if email.username.is_some() != email.password.is_some() {
                    return Err(AlertError::config(format!(
                        "channel '{}': username and password must be set together",
                        self.name
                    )));
                }
                if email.to.iter().all(|to| to.trim().is_empty()) {
                    return Err(AlertError::config(format!(
                        "channel '{}': at least one recipient is required",
                        self.name
                    )));
                }
                Ok(())
            }
        }
    }

    /// Builds the channel.
    ///
    /// HTTP channels share `client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the transport
    /// cannot be constructed.
    pub fn build(&self, client: &reqwest::Client) -> Result<Arc<dyn NotificationChannel>> {
        self.validate()?;
        let channel: Arc<dyn NotificationChannel> = match &self.settings {
            ChannelSettings::Discord(settings) => Arc::new(DiscordChannel::new(
                &self.name,
                settings.clone(),
                client.clone(),
                self.timeout(),
            )),
            ChannelSettings::Slack(settings) => Arc::new(SlackChannel::new(
                &self.name,
                settings.clone(),
                client.clone(),
                self.timeout(),
            )),
            ChannelSettings::Webhook(settings) => Arc::new(WebhookChannel::new(
                &self.name,
                settings.clone(),
                client.clone(),
                self.timeout(),
            )),
            ChannelSettings::Email(settings) => {
                Arc::new(EmailChannel::new(&self.name, settings, self.timeout())?)
            }
        };
        Ok(channel)
    }
}

fn validate_url(name: &str, url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(AlertError::config(format!("channel '{name}': URL cannot be empty")));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(AlertError::config(format!(
            "channel '{name}': URL must start with http:// or https://"
        )));
    }
    Ok(())
}

/// Result of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelResult {
    /// The channel that processed this notification.
    pub channel: String,
    /// Whether the notification was sent successfully.
    pub success: bool,
    /// Error description on failure.
    pub message: Option<String>,
}

impl ChannelResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            success: true,
            message: None,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failure(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            success: false,
            message: Some(message.into()),
        }
    }
}

/// A delivery mechanism for alerts.
///
/// `send` makes exactly one attempt. Timeouts are enforced by the caller.
pub trait NotificationChannel: Send + Sync + fmt::Debug {
    /// Returns the configured name of this channel.
    fn name(&self) -> &str;

    /// Returns the channel kind.
    fn kind(&self) -> ChannelKind;

    /// Returns the delivery timeout.
    fn timeout(&self) -> Duration {
        Duration::from_secs(DEFAULT_TIMEOUT_SECS)
    }

    /// Delivers one payload.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::ChannelDelivery` if delivery fails.
    fn send<'a>(
        &'a self,
        payload: &'a NotificationPayload,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Maps a non-success HTTP response to a delivery error.
pub(crate) async fn check_response(channel: &str, response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(AlertError::delivery(
        channel,
        format!("status {status}: {}", truncate(&body, 200)),
    ))
}

/// Truncates to at most `max` characters, marking the cut with `...`.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}
