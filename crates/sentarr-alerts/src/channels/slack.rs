//! Slack incoming-webhook channel.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::DateTime;
use serde::Serialize;
use tracing::debug;

use super::{ChannelKind, NotificationChannel, NotificationPayload, SlackSettings, check_response};
use crate::error::{AlertError, Result};
use crate::types::Severity;

/// Posts an attachment to a Slack incoming webhook.
#[derive(Debug)]
pub struct SlackChannel {
    name: String,
    settings: SlackSettings,
    client: reqwest::Client,
    timeout: Duration,
}

impl SlackChannel {
    /// Creates a Slack channel.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        settings: SlackSettings,
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

    fn format_payload(&self, payload: &NotificationPayload) -> SlackPayload {
        let fields = payload
            .detail_pairs()
            .into_iter()
            .map(|(title, value)| SlackField {
                title,
                value,
                short: true,
            })
            .collect();

        let ts = DateTime::parse_from_rfc3339(&payload.timestamp)
            .ok()
            .map(|t| t.timestamp());

        SlackPayload {
            channel: self.settings.channel.clone(),
            attachments: vec![SlackAttachment {
                fallback: format!("{}: {}", payload.title, payload.message),
                color: attachment_color(payload.severity),
                title: payload.title.clone(),
                text: payload.message.clone(),
                fields,
                footer: "Sentarr",
                ts,
            }],
        }
    }
}

impl NotificationChannel for SlackChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Slack
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
            debug!(channel = %self.name, title = %payload.title, "sending slack notification");

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

const fn attachment_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical | Severity::Error => "danger",
        Severity::Warning => "warning",
        Severity::Info => "good",
    }
}

#[derive(Debug, Serialize)]
struct SlackPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    attachments: Vec<SlackAttachment>,
}

#[derive(Debug, Serialize)]
struct SlackAttachment {
    fallback: String,
    color: &'static str,
    title: String,
    text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<SlackField>,
    footer: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ts: Option<i64>,
}

#[derive(Debug, Serialize)]
struct SlackField {
    title: String,
    value: String,
    short: bool,
}
