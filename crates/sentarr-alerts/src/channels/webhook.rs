//! Generic JSON webhook channel.
//!
//! The body is the [`NotificationPayload`] itself:
//! `{"title", "message", "severity", "timestamp", "details"}`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;

use super::{ChannelKind, NotificationChannel, NotificationPayload, WebhookSettings, check_response};
use crate::error::{AlertError, Result};

/// POSTs the payload as JSON to an arbitrary URL.
#[derive(Debug)]
pub struct WebhookChannel {
    name: String,
    settings: WebhookSettings,
    client: reqwest::Client,
    timeout: Duration,
}

impl WebhookChannel {
    /// Creates a webhook channel.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        settings: WebhookSettings,
        client: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            settings,
            client,
            timeout,
        }
    }
}

impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn send<'a>(
        &'a self,
        payload: &'a NotificationPayload,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            debug!(channel = %self.name, url = %self.settings.url, "sending webhook notification");

            let mut request = self.client.post(&self.settings.url).json(payload);
            for (key, value) in &self.settings.headers {
                request = request.header(key, value);
            }

            let response = request
                .send()
                .await
                .map_err(|e| AlertError::delivery(&self.name, e.to_string()))?;

            check_response(&self.name, response).await
        })
    }
}
