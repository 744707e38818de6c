//! In-memory alert history.
//!
//! The pipeline only appends. Resolution and deletion come from outside
//! (the dashboard) and go through the same lock.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AlertError, Result};
use crate::types::{Alert, Severity};

/// Summary counts for the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStats {
    /// All stored alerts.
    pub total: usize,
    /// Alerts still open.
    pub open: usize,
    /// Open alerts with error or critical severity.
    pub error_count: usize,
    /// Open alerts with warning severity.
    pub warning_count: usize,
}

/// Thread-safe, insertion-ordered alert list.
///
/// Cloning the store yields another handle to the same list.
#[derive(Debug, Clone, Default)]
pub struct AlertStore {
    alerts: Arc<RwLock<Vec<Alert>>>,
}

impl AlertStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an alert and returns its ID.
    pub fn append(&self, alert: Alert) -> String {
        let id = alert.id.clone();
        debug!(alert_id = %id, title = %alert.title, "stored alert");
        self.alerts.write().push(alert);
        id
    }

    /// Returns every alert, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<Alert> {
        self.alerts.read().clone()
    }

    /// Returns the most recent `limit` alerts, newest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<Alert> {
        self.alerts.read().iter().rev().take(limit).cloned().collect()
    }

    /// Looks up an alert by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Alert> {
        self.alerts.read().iter().find(|a| a.id == id).cloned()
    }

    /// Closes an open alert.
    ///
    /// # Errors
    ///
    /// Returns `AlertNotFound` for an unknown ID and `AlreadyResolved` if the
    /// alert is already closed.
    pub fn resolve(&self, id: &str, resolved_by: &str, note: &str) -> Result<Alert> {
        let mut alerts = self.alerts.write();
        let alert = alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AlertError::AlertNotFound { id: id.to_string() })?;

        if !alert.close(resolved_by, note, Utc::now()) {
            return Err(AlertError::AlreadyResolved { id: id.to_string() });
        }
        info!(alert_id = %id, resolved_by, "alert resolved");
        Ok(alert.clone())
    }

    /// Removes an alert.
    ///
    /// # Errors
    ///
    /// Returns `AlertNotFound` for an unknown ID.
    pub fn delete(&self, id: &str) -> Result<Alert> {
        let mut alerts = self.alerts.write();
        let idx = alerts
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| AlertError::AlertNotFound { id: id.to_string() })?;
        info!(alert_id = %id, "alert deleted");
        Ok(alerts.remove(idx))
    }

    /// Computes summary counts.
    #[must_use]
    pub fn stats(&self) -> AlertStats {
        let alerts = self.alerts.read();
        let mut stats = AlertStats {
            total: alerts.len(),
            ..AlertStats::default()
        };
        for alert in alerts.iter().filter(|a| a.is_open()) {
            stats.open += 1;
            if alert.severity.is_error_like() {
                stats.error_count += 1;
            } else if alert.severity == Severity::Warning {
                stats.warning_count += 1;
            }
        }
        stats
    }

    /// Number of stored alerts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.alerts.read().len()
    }

    /// Returns true if no alerts are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alerts.read().is_empty()
    }
}
