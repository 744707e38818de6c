//! SMTP email channel.

use std::fmt;
use std::fmt::Write as _;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use super::{ChannelKind, EmailSettings, NotificationChannel, NotificationPayload};
use crate::error::{AlertError, Result};

/// Sends a plain-text email per alert.
pub struct EmailChannel {
    name: String,
    from: Mailbox,
    to: Vec<Mailbox>,
    transport: AsyncSmtpTransport<Tokio1Executor>,
    timeout: Duration,
}

impl fmt::Debug for EmailChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailChannel")
            .field("name", &self.name)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl EmailChannel {
    /// Creates an email channel.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidConfig` for unparseable addresses or an
    /// unusable relay host.
    pub fn new(name: impl Into<String>, settings: &EmailSettings, timeout: Duration) -> Result<Self> {
        let name = name.into();
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|e| AlertError::config(format!("channel '{name}': invalid from address: {e}")))?;

        let to = settings
            .to
            .iter()
            .filter(|addr| !addr.trim().is_empty())
            .map(|addr| {
                addr.parse::<Mailbox>().map_err(|e| {
                    AlertError::config(format!("channel '{name}': invalid recipient '{addr}': {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut builder = if settings.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host).map_err(|e| {
                AlertError::config(format!("channel '{name}': invalid SMTP relay: {e}"))
            })?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.smtp_host)
        };
        builder = builder.port(settings.smtp_port).timeout(Some(timeout));
        match (&settings.username, &settings.password) {
            (Some(user), Some(pass)) => {
                builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
            }
            (None, None) => {}
            _ => {
                return Err(AlertError::config(format!(
                    "channel '{name}': username and password must be set together"
                )));
            }
        }

        Ok(Self {
            name,
            from,
            to,
            transport: builder.build(),
            timeout,
        })
    }

    fn build_message(&self, payload: &NotificationPayload) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(subject(payload))
            .header(ContentType::TEXT_PLAIN);
        for to in &self.to {
            builder = builder.to(to.clone());
        }
        builder
            .body(body(payload))
            .map_err(|e| AlertError::delivery(&self.name, format!("failed to build message: {e}")))
    }
}

impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn send<'a>(
        &'a self,
        payload: &'a NotificationPayload,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let message = self.build_message(payload)?;
            debug!(channel = %self.name, recipients = self.to.len(), "sending email notification");
            self.transport
                .send(message)
                .await
                .map_err(|e| AlertError::delivery(&self.name, e.to_string()))?;
            Ok(())
        })
    }
}

fn subject(payload: &NotificationPayload) -> String {
    format!(
        "[Plex Alert - {}] {}",
        payload.severity.as_str().to_uppercase(),
        payload.title
    )
}

fn body(payload: &NotificationPayload) -> String {
    let mut text = format!("{}\n\n", payload.message);
    let details = payload.detail_pairs();
    if !details.is_empty() {
        text.push_str("Details:\n");
        for (key, value) in details {
            let _ = writeln!(text, "  {key}: {value}");
        }
    }
    let _ = write!(text, "\nTime: {}\n", payload.timestamp);
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;
    use std::collections::BTreeMap;

    fn settings() -> EmailSettings {
        EmailSettings {
            smtp_host: "127.0.0.1".to_string(),
            smtp_port: 9,
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            from: "Sentarr <sentarr@example.com>".to_string(),
            to: vec!["admin@example.com".to_string()],
            starttls: false,
        }
    }

    fn payload() -> NotificationPayload {
        let mut details = BTreeMap::new();
        details.insert("Count".to_string(), serde_json::json!(3));
        details.insert("Pattern".to_string(), serde_json::json!("stream_error"));
        NotificationPayload {
            title: "Multiple Stream Error Detected (3)".to_string(),
            message: "Detected 3 stream error events in the last 5 minutes".to_string(),
            severity: Severity::Error,
            timestamp: "2024-01-01T00:00:00+00:00".to_string(),
            details,
        }
    }

    #[test]
    fn subject_carries_severity() {
        assert_eq!(
            subject(&payload()),
            "[Plex Alert - ERROR] Multiple Stream Error Detected (3)"
        );
    }

    #[test]
    fn body_lists_details() {
        let text = body(&payload());
        assert!(text.starts_with("Detected 3 stream error events"));
        assert!(text.contains("Details:\n  Count: 3\n  Pattern: stream_error\n"));
        assert!(text.contains("Time: 2024-01-01T00:00:00+00:00"));
    }

    #[test]
    fn invalid_address_rejected() {
        let mut bad = settings();
        bad.from = "not an address".to_string();
        let err = EmailChannel::new("mail", &bad, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, AlertError::InvalidConfig { .. }));

        let mut bad = settings();
        bad.to = vec!["@@".to_string()];
        assert!(EmailChannel::new("mail", &bad, Duration::from_secs(5)).is_err());
    }

    #[test]
    fn half_credentials_rejected() {
        let mut half = settings();
        half.password = None;
        let err = EmailChannel::new("mail", &half, Duration::from_secs(5)).unwrap_err();
        assert!(err.to_string().contains("username and password"));
    }

    #[test]
    fn message_builds() {
        let channel = EmailChannel::new("mail", &settings(), Duration::from_secs(5)).unwrap();
        let message = channel.build_message(&payload()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: [Plex Alert - ERROR] Multiple Stream Error Detected (3)"));
        assert!(raw.contains("To: admin@example.com"));
    }

    #[tokio::test]
    async fn unreachable_relay_is_delivery_failure() {
        let channel = EmailChannel::new("mail", &settings(), Duration::from_secs(2)).unwrap();
        let err = channel.send(&payload()).await.unwrap_err();
        assert!(matches!(err, AlertError::ChannelDelivery { .. }));
    }
}
