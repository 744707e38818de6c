//! Fan-out of alerts to notification channels.
//!
//! Every enabled channel gets exactly one attempt, in its own task and under
//! its own timeout. A failing, hanging or panicking channel only affects its
//! own [`ChannelResult`].

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::channels::{ChannelConfig, ChannelResult, NotificationChannel, NotificationPayload};
use crate::error::AlertError;
use crate::types::{Alert, Severity};

/// Delivers alerts to channels.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    client: reqwest::Client,
}

impl Notifier {
    /// Creates a notifier with a fresh HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a notifier sharing an existing HTTP client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Dispatches an alert to every enabled channel in `channels`.
    ///
    /// Channels that fail to build count as failed deliveries. Disabled
    /// channels produce no result.
    pub async fn dispatch(&self, alert: &Alert, channels: &[ChannelConfig]) -> Vec<ChannelResult> {
        let mut results = Vec::new();
        let mut built: Vec<Arc<dyn NotificationChannel>> = Vec::new();

        for config in channels.iter().filter(|c| c.enabled) {
            match config.build(&self.client) {
                Ok(channel) => built.push(channel),
                Err(e) => {
                    warn!(channel = %config.name, error = %e, "channel could not be built");
                    results.push(ChannelResult::failure(&config.name, e.to_string()));
                }
            }
        }

        results.extend(self.dispatch_channels(alert, &built).await);
        results
    }

    /// Dispatches an alert to already-built channels.
    pub async fn dispatch_channels(
        &self,
        alert: &Alert,
        channels: &[Arc<dyn NotificationChannel>],
    ) -> Vec<ChannelResult> {
        let payload = Arc::new(NotificationPayload::from_alert(alert));

        let handles = channels.iter().map(|channel| {
            let channel = Arc::clone(channel);
            let payload = Arc::clone(&payload);
            let name = channel.name().to_string();
            let task = tokio::spawn(async move {
                let timeout = channel.timeout();
                match tokio::time::timeout(timeout, channel.send(&payload)).await {
                    Ok(result) => result,
                    Err(_) => Err(AlertError::ChannelTimeout {
                        channel: channel.name().to_string(),
                        timeout_secs: timeout.as_secs(),
                    }),
                }
            });
            async move { (name, task.await) }
        });

        let results: Vec<ChannelResult> = join_all(handles)
            .await
            .into_iter()
            .map(|(name, joined)| match joined {
                Ok(Ok(())) => {
                    debug!(channel = %name, alert_id = %alert.id, "notification delivered");
                    ChannelResult::success(name)
                }
                Ok(Err(e)) => {
                    warn!(channel = %name, alert_id = %alert.id, error = %e, "notification failed");
                    ChannelResult::failure(name, e.to_string())
                }
                Err(e) => {
                    warn!(channel = %name, alert_id = %alert.id, error = %e, "notification task failed");
                    ChannelResult::failure(name, format!("delivery task failed: {e}"))
                }
            })
            .collect();

        let delivered = results.iter().filter(|r| r.success).count();
        info!(
            alert_id = %alert.id,
            delivered,
            failed = results.len() - delivered,
            "alert dispatched"
        );
        results
    }

    /// Sends a synthetic alert through one channel.
    ///
    /// Uses the same path as production alerts. A disabled channel fails
    /// without any network call.
    pub async fn test_channel(&self, config: &ChannelConfig) -> ChannelResult {
        if !config.enabled {
            return ChannelResult::failure(&config.name, "channel is disabled");
        }
        let alert = test_alert(&config.name);
        self.dispatch(&alert, std::slice::from_ref(config))
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| ChannelResult::failure(&config.name, "channel produced no result"))
    }
}

/// The synthetic alert sent by [`Notifier::test_channel`].
#[must_use]
pub fn test_alert(channel: &str) -> Alert {
    Alert::new(
        "Sentarr Test Notification",
        format!("This is a test notification for the '{channel}' channel."),
        Severity::Info,
        Utc::now(),
    )
    .with_detail("Channel", channel)
}
