//! Error types for the sentarr-alerts crate.

use thiserror::Error;

/// Errors that can occur in the alerting pipeline.
#[derive(Debug, Error)]
pub enum AlertError {
    /// Invalid threshold, window, cooldown or channel configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// The reason the configuration is invalid.
        reason: String,
    },

    /// A log line could not be classified.
    #[error("unclassifiable line: {reason}")]
    Classification {
        /// The reason the line was rejected.
        reason: String,
    },

    /// A notification channel failed to deliver.
    #[error("delivery via {channel} failed: {reason}")]
    ChannelDelivery {
        /// The channel that failed.
        channel: String,
        /// The reason the delivery failed.
        reason: String,
    },

    /// A notification channel did not answer in time.
    #[error("delivery via {channel} timed out after {timeout_secs}s")]
    ChannelTimeout {
        /// The channel that timed out.
        channel: String,
        /// The timeout that elapsed.
        timeout_secs: u64,
    },

    /// Alert with the given ID was not found.
    #[error("alert not found: {id}")]
    AlertNotFound {
        /// The alert ID that was not found.
        id: String,
    },

    /// The alert was already closed.
    #[error("alert already resolved: {id}")]
    AlreadyResolved {
        /// The alert ID.
        id: String,
    },
}

impl AlertError {
    /// Shorthand for an [`AlertError::InvalidConfig`].
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Shorthand for an [`AlertError::ChannelDelivery`].
    pub(crate) fn delivery(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ChannelDelivery {
            channel: channel.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for alert operations.
pub type Result<T> = std::result::Result<T, AlertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_invalid_config() {
        let err = AlertError::config("error_threshold must be at least 1");
        assert_eq!(
            err.to_string(),
            "invalid configuration: error_threshold must be at least 1"
        );
    }

    #[test]
    fn error_display_classification() {
        let err = AlertError::Classification {
            reason: "line exceeds 65536 bytes".to_string(),
        };
        assert_eq!(err.to_string(), "unclassifiable line: line exceeds 65536 bytes");
    }

    #[test]
    fn error_display_channel_delivery() {
        let err = AlertError::delivery("discord", "status 404");
        assert_eq!(err.to_string(), "delivery via discord failed: status 404");
    }

    #[test]
    fn error_display_channel_timeout() {
        let err = AlertError::ChannelTimeout {
            channel: "slack".to_string(),
            timeout_secs: 10,
        };
        assert_eq!(err.to_string(), "delivery via slack timed out after 10s");
    }

    #[test]
    fn error_display_alert_not_found() {
        let err = AlertError::AlertNotFound {
            id: "abc-123".to_string(),
        };
        assert_eq!(err.to_string(), "alert not found: abc-123");
    }

    #[test]
    fn error_display_already_resolved() {
        let err = AlertError::AlreadyResolved {
            id: "abc-123".to_string(),
        };
        assert_eq!(err.to_string(), "alert already resolved: abc-123");
    }
}
