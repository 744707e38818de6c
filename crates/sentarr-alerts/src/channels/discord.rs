//! Discord webhook channel.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use super::{
    ChannelKind, DiscordSettings, NotificationChannel, NotificationPayload, check_response,
    truncate,
};
use crate::error::{AlertError, Result};
use crate::types::Severity;

/// Discord rejects field values longer than this.
const MAX_FIELD_VALUE: usize = 1024;

/// Posts an embed to a Discord webhook.
#[derive(Debug)]
pub struct DiscordChannel {
    name: String,
    settings: DiscordSettings,
    client: reqwest::Client,
    timeout: Duration,
}

impl DiscordChannel {
    /// Creates a Discord channel.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        settings: DiscordSettings,
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

    fn format_payload(&self, payload: &NotificationPayload) -> DiscordPayload {
        let fields = payload
            .detail_pairs()
            .into_iter()
            .map(|(name, value)| DiscordField {
                name,
                value: truncate(&value, MAX_FIELD_VALUE),
                inline: true,
            })
            .collect();

        DiscordPayload {
            username: self.settings.username.clone(),
            embeds: vec![DiscordEmbed {
                title: truncate(&payload.title, 256),
                description: truncate(&payload.message, 4096),
                color: embed_color(payload.severity),
                timestamp: payload.timestamp.clone(),
                fields,
                footer: DiscordFooter {
                    text: "Sentarr".to_string(),
                },
            }],
        }
    }
}

impl NotificationChannel for DiscordChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Discord
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn send<'a>(
        &'a self,
        payload: &'a NotificationPayload,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let body = self.format_payload(payload);
            debug!(channel = %self.name, title = %payload.title, "sending discord notification");

            let response = self
                .client
                .post(&self.settings.webhook_url)
                .json(&body)
                .send()
                .await
                .map_err(|e| AlertError::delivery(&self.name, e.to_string()))?;

            check_response(&self.name, response).await
        })
    }
}

/// Embed sidebar colour for a severity.
const fn embed_color(severity: Severity) -> u32 {
    match severity {
        Severity::Critical => 0xFF_0000,
        Severity::Error => 0xFF_6B6B,
        Severity::Warning => 0xFF_A500,
        Severity::Info => 0x34_98DB,
    }
}

#[derive(Debug, Serialize)]
struct DiscordPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

#[derive(Debug, Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    color: u32,
    timestamp: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<DiscordField>,
    footer: DiscordFooter,
}

#[derive(Debug, Serialize)]
struct DiscordField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Debug, Serialize)]
struct DiscordFooter {
    text: String,
}
