//! Core types for the alerting pipeline.
//!
//! This module provides the fundamental types used throughout the sentarr-alerts crate:
//! - [`Severity`]: How urgent an alert is
//! - [`SeverityClass`]: The monitoring toggle a category belongs to
//! - [`Category`]: The closed set of Plex log error categories
//! - [`AlertStatus`]: Open or closed
//! - [`Alert`]: A fired alert record

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key/value details attached to an alert (pattern, count, window, sample line).
pub type AlertDetails = BTreeMap<String, serde_json::Value>;

/// The severity level of an alert.
///
/// Ordered from least to most severe, so `max` yields the worst.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational, no action required.
    Info,
    /// Should be investigated.
    #[default]
    Warning,
    /// Something failed.
    Error,
    /// Requires immediate attention.
    Critical,
}

impl Severity {
    /// Returns the severity as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// Returns true for error and critical alerts.
    #[must_use]
    pub const fn is_error_like(&self) -> bool {
        matches!(self, Self::Error | Self::Critical)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which monitoring toggle (`monitor_errors` / `monitor_warnings`) governs a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityClass {
    /// Error categories.
    Errors,
    /// Warning categories.
    Warnings,
}

/// The fixed set of log categories Sentarr recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Playback, streaming or transcode failures.
    StreamError,
    /// Database, sqlite or corruption failures.
    DatabaseError,
    /// Network, connection or timeout failures.
    NetworkError,
    /// Authentication, authorization or token failures.
    AuthError,
    /// Scanner, metadata or library failures.
    ScannerError,
    /// Disk and read failures.
    DiskError,
    /// Transcoder and codec warnings.
    TranscodingWarning,
    /// Slowness and performance warnings.
    PerformanceWarning,
    /// Permission and access warnings.
    PermissionWarning,
}

impl Category {
    /// Every category, in classification order.
    pub const ALL: [Self; 9] = [
        Self::StreamError,
        Self::DatabaseError,
        Self::NetworkError,
        Self::AuthError,
        Self::ScannerError,
        Self::DiskError,
        Self::TranscodingWarning,
        Self::PerformanceWarning,
        Self::PermissionWarning,
    ];

    /// Returns the snake_case identifier, e.g. `stream_error`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StreamError => "stream_error",
            Self::DatabaseError => "database_error",
            Self::NetworkError => "network_error",
            Self::AuthError => "auth_error",
            Self::ScannerError => "scanner_error",
            Self::DiskError => "disk_error",
            Self::TranscodingWarning => "transcoding_warning",
            Self::PerformanceWarning => "performance_warning",
            Self::PermissionWarning => "permission_warning",
        }
    }

    /// Returns the title-cased name, e.g. `Stream Error`.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::StreamError => "Stream Error",
            Self::DatabaseError => "Database Error",
            Self::NetworkError => "Network Error",
            Self::AuthError => "Auth Error",
            Self::ScannerError => "Scanner Error",
            Self::DiskError => "Disk Error",
            Self::TranscodingWarning => "Transcoding Warning",
            Self::PerformanceWarning => "Performance Warning",
            Self::PermissionWarning => "Permission Warning",
        }
    }

    /// Returns the monitoring class of this category.
    #[must_use]
    pub const fn class(&self) -> SeverityClass {
        match self {
            Self::StreamError
            | Self::DatabaseError
            | Self::NetworkError
            | Self::AuthError
            | Self::ScannerError
            | Self::DiskError => SeverityClass::Errors,
            Self::TranscodingWarning | Self::PerformanceWarning | Self::PermissionWarning => {
                SeverityClass::Warnings
            }
        }
    }

    /// Returns the severity assigned when the line carries no stricter level token.
    #[must_use]
    pub const fn default_severity(&self) -> Severity {
        match self.class() {
            SeverityClass::Errors => Severity::Error,
            SeverityClass::Warnings => Severity::Warning,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether an alert still needs attention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    /// Not yet resolved.
    #[default]
    Open,
    /// Resolved by an operator.
    Closed,
}

impl AlertStatus {
    /// Returns the status as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fired alert.
///
/// Created by the aggregator (or as a synthetic test/lifecycle alert), then
/// owned by the alert store. The only mutation is the single open→closed
/// transition through [`Alert::close`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// Short summary.
    pub title: String,
    /// Human-readable description.
    pub message: String,
    /// The severity of the alert.
    pub severity: Severity,
    /// Open until resolved.
    pub status: AlertStatus,
    /// The category that fired, absent for synthetic alerts.
    pub pattern: Option<Category>,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Pattern, count, window and sample line.
    pub details: AlertDetails,
    /// When the alert was resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Who resolved the alert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    /// Free-form note left on resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_note: Option<String>,
}

impl Alert {
    /// Creates a new open alert with a fresh ID.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            message: message.into(),
            severity,
            status: AlertStatus::Open,
            pattern: None,
            timestamp,
            details: AlertDetails::new(),
            resolved_at: None,
            resolved_by: None,
            resolution_note: None,
        }
    }

    /// Sets the category that produced this alert.
    #[must_use]
    pub const fn with_pattern(mut self, category: Category) -> Self {
        self.pattern = Some(category);
        self
    }

    /// Adds a detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Returns true if the alert has not been resolved.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == AlertStatus::Open
    }

    /// Closes the alert.
    ///
    /// Returns `false` (and changes nothing) if it was already closed.
    pub fn close(
        &mut self,
        resolved_by: impl Into<String>,
        note: impl Into<String>,
        at: DateTime<Utc>,
    ) -> bool {
        if !self.is_open() {
            return false;
        }
        self.status = AlertStatus::Closed;
        self.resolved_at = Some(at);
        self.resolved_by = Some(resolved_by.into());
        self.resolution_note = Some(note.into());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod severity_tests {
        use super::*;

        #[test]
        fn severity_ordering() {
            assert!(Severity::Info < Severity::Warning);
            assert!(Severity::Warning < Severity::Error);
            assert!(Severity::Error < Severity::Critical);
            assert_eq!(Severity::Warning.max(Severity::Critical), Severity::Critical);
        }

        #[test]
        fn severity_display_and_serde() {
            assert_eq!(Severity::Critical.to_string(), "critical");
            let json = serde_json::to_string(&Severity::Error).unwrap();
            assert_eq!(json, "\"error\"");
            let parsed: Severity = serde_json::from_str("\"warning\"").unwrap();
            assert_eq!(parsed, Severity::Warning);
        }

        #[test]
        fn error_like() {
            assert!(Severity::Error.is_error_like());
            assert!(Severity::Critical.is_error_like());
            assert!(!Severity::Warning.is_error_like());
            assert!(!Severity::Info.is_error_like());
        }
    }

    mod category_tests {
        use super::*;

        #[test]
        fn category_names() {
            assert_eq!(Category::StreamError.as_str(), "stream_error");
            assert_eq!(Category::PermissionWarning.display_name(), "Permission Warning");
            assert_eq!(Category::DiskError.to_string(), "disk_error");
        }

        #[test]
        fn category_serde_uses_snake_case() {
            let json = serde_json::to_string(&Category::TranscodingWarning).unwrap();
            assert_eq!(json, "\"transcoding_warning\"");
            for category in Category::ALL {
                let json = serde_json::to_string(&category).unwrap();
                assert_eq!(json, format!("\"{}\"", category.as_str()));
            }
        }

        #[test]
        fn category_classes_and_defaults() {
            let errors = Category::ALL
                .iter()
                .filter(|c| c.class() == SeverityClass::Errors)
                .count();
            assert_eq!(errors, 6);
            assert_eq!(Category::AuthError.default_severity(), Severity::Error);
            assert_eq!(
                Category::PerformanceWarning.default_severity(),
                Severity::Warning
            );
        }
    }

    mod alert_tests {
        use super::*;

        fn test_alert() -> Alert {
            Alert::new(
                "Multiple Stream Error Detected (3)",
                "Detected 3 stream error events in the last 5 minutes",
                Severity::Error,
                Utc::now(),
            )
            .with_pattern(Category::StreamError)
            .with_detail("Count", 3)
            .with_detail("Pattern", "stream_error")
        }

        #[test]
        fn new_alert_is_open() {
            let alert = test_alert();
            assert!(alert.is_open());
            assert_eq!(alert.pattern, Some(Category::StreamError));
            assert_eq!(alert.details["Count"], serde_json::json!(3));
            assert!(alert.resolved_at.is_none());
            assert!(Uuid::parse_str(&alert.id).is_ok());
        }

        #[test]
        fn alert_ids_are_unique() {
            assert_ne!(test_alert().id, test_alert().id);
        }

        #[test]
        fn close_happens_once() {
            let mut alert = test_alert();
            let at = Utc::now();

            assert!(alert.close("User", "restarted transcoder", at));
            assert_eq!(alert.status, AlertStatus::Closed);
            assert_eq!(alert.resolved_at, Some(at));
            assert_eq!(alert.resolved_by.as_deref(), Some("User"));

            assert!(!alert.close("Other", "again", Utc::now()));
            assert_eq!(alert.resolved_by.as_deref(), Some("User"));
            assert_eq!(alert.resolution_note.as_deref(), Some("restarted transcoder"));
        }

        #[test]
        fn alert_serializes_camel_case() {
            let mut alert = test_alert();
            let json = serde_json::to_value(&alert).unwrap();
            assert_eq!(json["status"], "open");
            assert_eq!(json["pattern"], "stream_error");
            assert!(json.get("resolvedAt").is_none());

            alert.close("User", "", Utc::now());
            let json = serde_json::to_value(&alert).unwrap();
            assert_eq!(json["status"], "closed");
            assert!(json.get("resolvedAt").is_some());

            let parsed: Alert = serde_json::from_value(json).unwrap();
            assert_eq!(parsed, alert);
        }
    }
}
