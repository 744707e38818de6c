//! Windowed threshold counting with per-category cooldowns.
//!
//! The [`Aggregator`] is the orchestrator of the pipeline. For every line it:
//!
//! 1. classifies the line (no match: nothing changes)
//! 2. drops it if monitoring is disabled for the category's class
//! 3. prunes every window, records the line in its category's window and
//!    counts that window
//! 4. fires an [`Alert`] when the count reaches the threshold and the
//!    category's cooldown has elapsed
//!
//! Firing records the cooldown before the alert is stored or delivered.
//! Delivery is the caller's job (see [`crate::Notifier`]).
//!
//! Categories are independent: a burst in one never delays another.

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use sentarr_logs::LogLine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classifier::{Classification, Classifier};
use crate::cooldown::CooldownGate;
use crate::error::{AlertError, Result};
use crate::store::AlertStore;
use crate::types::{Alert, Category, Severity, SeverityClass};
use crate::window::WindowCounter;

/// Sample lines in alert details are cut to this many characters.
const SAMPLE_LINE_CHARS: usize = 200;

/// Thresholds, window and cooldown for the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Whether error categories are monitored.
    pub monitor_errors: bool,
    /// Whether warning categories are monitored.
    pub monitor_warnings: bool,
    /// Matches within the window needed to fire an error-class alert.
    pub error_threshold: u32,
    /// Matches needed for a warning-class alert. Falls back to `error_threshold`.
    pub warning_threshold: Option<u32>,
    /// Window length in minutes.
    pub time_window_minutes: u32,
    /// Minimum minutes between two alerts of one category.
    pub alert_cooldown_minutes: u32,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            monitor_errors: true,
            monitor_warnings: true,
            error_threshold: 5,
            warning_threshold: None,
            time_window_minutes: 5,
            alert_cooldown_minutes: 15,
        }
    }
}

impl AggregatorConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidConfig` for a zero threshold or window.
    pub fn validate(&self) -> Result<()> {
        if self.error_threshold == 0 {
            return Err(AlertError::config("error_threshold must be at least 1"));
        }
        if self.warning_threshold == Some(0) {
            return Err(AlertError::config("warning_threshold must be at least 1"));
        }
        if self.time_window_minutes == 0 {
            return Err(AlertError::config("time_window_minutes must be at least 1"));
        }
        Ok(())
    }

    /// The window as a duration.
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::minutes(i64::from(self.time_window_minutes))
    }

    /// The cooldown as a duration.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::minutes(i64::from(self.alert_cooldown_minutes))
    }

    /// The threshold that applies to a class.
    #[must_use]
    pub fn threshold_for(&self, class: SeverityClass) -> u32 {
        match class {
            SeverityClass::Errors => self.error_threshold,
            SeverityClass::Warnings => self.warning_threshold.unwrap_or(self.error_threshold),
        }
    }

    /// Whether a class is monitored.
    #[must_use]
    pub const fn monitors(&self, class: SeverityClass) -> bool {
        match class {
            SeverityClass::Errors => self.monitor_errors,
            SeverityClass::Warnings => self.monitor_warnings,
        }
    }

    /// Human-readable window, e.g. `5 minutes`.
    #[must_use]
    pub fn window_description(&self) -> String {
        describe_minutes(self.time_window_minutes)
    }
}

/// What happened to one observed line.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// No rule matched. No state changed.
    NoMatch,
    /// The category's class is not monitored. No state changed.
    Disabled {
        /// The matched category.
        category: Category,
    },
    /// Recorded, but the window count is below the threshold.
    BelowThreshold {
        /// The matched category.
        category: Category,
        /// Matches in the window, including this one.
        count: usize,
        /// The threshold in force.
        threshold: u32,
    },
    /// Threshold met, but the category is cooling down.
    Suppressed {
        /// The matched category.
        category: Category,
        /// Matches in the window, including this one.
        count: usize,
    },
    /// A new alert fired and was stored.
    Fired(Alert),
}

impl Outcome {
    /// Returns the fired alert, if any.
    #[must_use]
    pub const fn alert(&self) -> Option<&Alert> {
        match self {
            Self::Fired(alert) => Some(alert),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct AggregatorState {
    windows: WindowCounter,
    cooldowns: CooldownGate,
}

/// Turns classified lines into alerts.
///
/// One aggregator per monitored log source.
#[derive(Debug)]
pub struct Aggregator {
    classifier: Classifier,
    config: RwLock<AggregatorConfig>,
    state: Mutex<AggregatorState>,
    store: AlertStore,
}

impl Aggregator {
    /// Creates an aggregator with the built-in Plex rules.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidConfig` if the configuration is invalid.
    pub fn new(config: AggregatorConfig, store: AlertStore) -> Result<Self> {
        Self::with_classifier(Classifier::plex_defaults(), config, store)
    }

    /// Creates an aggregator with a custom classifier.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidConfig` if the configuration is invalid.
    pub fn with_classifier(
        classifier: Classifier,
        config: AggregatorConfig,
        store: AlertStore,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            classifier,
            config: RwLock::new(config),
            state: Mutex::new(AggregatorState::default()),
            store,
        })
    }

    /// Returns a snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> AggregatorConfig {
        self.config.read().clone()
    }

    /// Replaces the configuration after validating it.
    ///
    /// An invalid update leaves the previous configuration in force.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidConfig` if `config` is invalid.
    pub fn update_config(&self, config: AggregatorConfig) -> Result<()> {
        config.validate()?;
        info!(
            error_threshold = config.error_threshold,
            window_minutes = config.time_window_minutes,
            cooldown_minutes = config.alert_cooldown_minutes,
            "aggregator configuration updated"
        );
        *self.config.write() = config;
        Ok(())
    }

    /// Returns the alert store.
    #[must_use]
    pub const fn store(&self) -> &AlertStore {
        &self.store
    }

    /// Returns the classifier.
    #[must_use]
    pub const fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Observes a tailed line at its arrival time.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Classification` for a line that cannot be
    /// classified. State is unchanged in that case.
    pub fn observe(&self, line: &LogLine) -> Result<Outcome> {
        self.observe_at(&line.text, line.received_at)
    }

    /// Observes a line at an explicit time.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Classification` for a line that cannot be
    /// classified. State is unchanged in that case.
    pub fn observe_at(&self, text: &str, now: DateTime<Utc>) -> Result<Outcome> {
        let Some(classification) = self.classifier.try_classify(text)? else {
            return Ok(Outcome::NoMatch);
        };
        Ok(self.record(&classification, text, now))
    }

    fn record(&self, classification: &Classification, text: &str, now: DateTime<Utc>) -> Outcome {
        let config = self.config.read().clone();
        let category = classification.category;
        let class = category.class();

        if !config.monitors(class) {
            return Outcome::Disabled { category };
        }

        let window = config.window();
        let threshold = config.threshold_for(class);

        let mut state = self.state.lock();
        // Categories that stopped matching still get emptied.
        state.windows.prune(now, window);
        state.windows.record(category, now, classification.severity);
        let count = state.windows.count_in_window(category, now, window);

        if count < threshold as usize {
            debug!(category = %category, count, threshold, "below threshold");
            return Outcome::BelowThreshold {
                category,
                count,
                threshold,
            };
        }

        if !state.cooldowns.can_fire(category, now, config.cooldown()) {
            debug!(category = %category, count, "alert suppressed by cooldown");
            return Outcome::Suppressed { category, count };
        }

        let severity = state
            .windows
            .worst_severity(category, now, window)
            .unwrap_or(classification.severity);
        state.cooldowns.record_fired(category, now);
        drop(state);

        let alert = build_alert(category, severity, count, text, &config, now);
        info!(
            alert_id = %alert.id,
            category = %category,
            severity = %severity,
            count,
            "alert fired"
        );
        self.store.append(alert.clone());
        Outcome::Fired(alert)
    }
}

fn build_alert(
    category: Category,
    severity: Severity,
    count: usize,
    sample: &str,
    config: &AggregatorConfig,
    now: DateTime<Utc>,
) -> Alert {
    let name = category.display_name();
    let title = match category.class() {
        SeverityClass::Errors => format!("Multiple {name} Detected ({count})"),
        SeverityClass::Warnings => format!("Plex Warning: {name} ({count})"),
    };
    let window = config.window_description();
    let message = format!(
        "Detected {count} {} events in the last {window}",
        name.to_lowercase()
    );
    let latest: String = sample.chars().take(SAMPLE_LINE_CHARS).collect();

    Alert::new(title, message, severity, now)
        .with_pattern(category)
        .with_detail("Pattern", category.as_str())
        .with_detail("Count", count)
        .with_detail("Time Window", window)
        .with_detail("Latest Error", latest)
        .with_detail("Severity", severity.as_str())
}

fn describe_minutes(minutes: u32) -> String {
    if minutes == 1 {
        "1 minute".to_string()
    } else {
        format!("{minutes} minutes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &str = "Jan 01, 2024 10:00:00.000 [0x7f] ERROR - Transcode session failed";
    const PERMISSION: &str = "WARN - Permission denied on /media/movies";

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn at_min(m: i64) -> DateTime<Utc> {
        t0() + Duration::minutes(m)
    }

    fn config(threshold: u32, window: u32, cooldown: u32) -> AggregatorConfig {
        AggregatorConfig {
            error_threshold: threshold,
            time_window_minutes: window,
            alert_cooldown_minutes: cooldown,
            ..AggregatorConfig::default()
        }
    }

    fn aggregator(config: AggregatorConfig) -> Aggregator {
        Aggregator::new(config, AlertStore::new()).unwrap()
    }

    fn fired(outcomes: &[Outcome]) -> usize {
        outcomes.iter().filter(|o| o.alert().is_some()).count()
    }

    mod config_tests {
        use super::*;

        #[test]
        fn default_config_is_valid() {
            assert!(AggregatorConfig::default().validate().is_ok());
        }

        #[test]
        fn zero_threshold_rejected() {
            assert!(config(0, 5, 15).validate().is_err());
            let cfg = AggregatorConfig {
                warning_threshold: Some(0),
                ..AggregatorConfig::default()
            };
            assert!(cfg.validate().is_err());
        }

        #[test]
        fn zero_window_rejected() {
            let err = config(3, 0, 15).validate().unwrap_err();
            assert!(err.to_string().contains("time_window_minutes"));
        }

        #[test]
        fn zero_cooldown_allowed() {
            assert!(config(3, 5, 0).validate().is_ok());
        }

        #[test]
        fn new_rejects_invalid_config() {
            assert!(Aggregator::new(config(0, 5, 15), AlertStore::new()).is_err());
        }

        #[test]
        fn warning_threshold_falls_back() {
            let mut cfg = config(4, 5, 15);
            assert_eq!(cfg.threshold_for(SeverityClass::Warnings), 4);
            cfg.warning_threshold = Some(2);
            assert_eq!(cfg.threshold_for(SeverityClass::Warnings), 2);
            assert_eq!(cfg.threshold_for(SeverityClass::Errors), 4);
        }

        #[test]
        fn window_description() {
            assert_eq!(config(1, 1, 0).window_description(), "1 minute");
            assert_eq!(config(1, 5, 0).window_description(), "5 minutes");
        }

        #[test]
        fn invalid_update_keeps_previous() {
            let agg = aggregator(config(3, 5, 15));
            assert!(agg.update_config(config(0, 5, 15)).is_err());
            assert_eq!(agg.config().error_threshold, 3);

            agg.update_config(config(7, 10, 30)).unwrap();
            assert_eq!(agg.config().error_threshold, 7);
        }
    }

    mod threshold_tests {
        use super::*;

        #[test]
        fn exactly_threshold_fires_once() {
            for n in 1..=6u32 {
                let agg = aggregator(config(n, 5, 0));
                let outcomes: Vec<Outcome> = (0..n)
                    .map(|i| agg.observe_at(STREAM, t0() + Duration::seconds(i64::from(i))).unwrap())
                    .collect();
                assert_eq!(fired(&outcomes), 1, "threshold {n}");
                assert!(outcomes.last().unwrap().alert().is_some());
            }
        }

        #[test]
        fn one_below_threshold_never_fires() {
            for n in 1..=6u32 {
                let agg = aggregator(config(n, 5, 0));
                let outcomes: Vec<Outcome> = (1..n)
                    .map(|i| agg.observe_at(STREAM, t0() + Duration::seconds(i64::from(i))).unwrap())
                    .collect();
                assert_eq!(fired(&outcomes), 0, "threshold {n}");
                assert!(agg.store().is_empty());
            }
        }

        #[test]
        fn below_threshold_reports_count() {
            let agg = aggregator(config(3, 5, 15));
            let outcome = agg.observe_at(STREAM, t0()).unwrap();
            assert_eq!(
                outcome,
                Outcome::BelowThreshold {
                    category: Category::StreamError,
                    count: 1,
                    threshold: 3
                }
            );
        }

        #[test]
        fn expired_matches_do_not_count() {
            let agg = aggregator(config(2, 5, 0));
            agg.observe_at(STREAM, at_min(0)).unwrap();
            let outcome = agg.observe_at(STREAM, at_min(5)).unwrap();
            assert!(matches!(outcome, Outcome::BelowThreshold { count: 1, .. }));
        }

        #[test]
        fn warning_threshold_applies_to_warnings() {
            let cfg = AggregatorConfig {
                warning_threshold: Some(2),
                ..config(5, 5, 15)
            };
            let agg = aggregator(cfg);
            agg.observe_at(PERMISSION, at_min(0)).unwrap();
            let outcome = agg.observe_at(PERMISSION, at_min(1)).unwrap();
            let alert = outcome.alert().unwrap();
            assert_eq!(alert.title, "Plex Warning: Permission Warning (2)");
            assert_eq!(alert.severity, Severity::Warning);
        }
    }

    mod cooldown_tests {
        use super::*;

        #[test]
        fn bursts_inside_cooldown_fire_once() {
            let agg = aggregator(config(1, 5, 10));
            let a = agg.observe_at(STREAM, at_min(0)).unwrap();
            let b = agg.observe_at(STREAM, at_min(9)).unwrap();
            assert!(a.alert().is_some());
            assert!(matches!(b, Outcome::Suppressed { count: 1, .. }));
            assert_eq!(agg.store().len(), 1);
        }

        #[test]
        fn bursts_outside_cooldown_fire_twice() {
            let agg = aggregator(config(1, 5, 10));
            agg.observe_at(STREAM, at_min(0)).unwrap();
            let b = agg.observe_at(STREAM, at_min(11)).unwrap();
            assert!(b.alert().is_some());
            assert_eq!(agg.store().len(), 2);
        }

        #[test]
        fn cooldown_is_per_category() {
            let agg = aggregator(config(1, 5, 15));
            let a = agg.observe_at(STREAM, at_min(0)).unwrap();
            let b = agg
                .observe_at("ERROR - database is locked", at_min(1))
                .unwrap();
            assert_eq!(a.alert().unwrap().pattern, Some(Category::StreamError));
            assert_eq!(b.alert().unwrap().pattern, Some(Category::DatabaseError));
        }

        #[test]
        fn suppressed_breach_is_not_deferred() {
            let agg = aggregator(config(1, 5, 10));
            agg.observe_at(STREAM, at_min(0)).unwrap();
            agg.observe_at(STREAM, at_min(5)).unwrap();
            // No new line arrives after the cooldown ends, so nothing fires.
            assert_eq!(agg.store().len(), 1);
        }
    }

    mod scenario_tests {
        use super::*;

        #[test]
        fn three_stream_errors_fire_at_two_minutes() {
            let agg = aggregator(config(3, 5, 15));
            let outcomes: Vec<Outcome> = [0, 1, 2]
                .iter()
                .map(|m| agg.observe_at(STREAM, at_min(*m)).unwrap())
                .collect();

            assert_eq!(fired(&outcomes), 1);
            let alert = outcomes[2].alert().unwrap();
            assert_eq!(alert.timestamp, at_min(2));
            assert_eq!(alert.details["Count"], serde_json::json!(3));
            assert_eq!(alert.details["Pattern"], serde_json::json!("stream_error"));
            assert_eq!(alert.details["Time Window"], serde_json::json!("5 minutes"));
            assert_eq!(alert.details["Latest Error"], serde_json::json!(STREAM));
            assert_eq!(alert.title, "Multiple Stream Error Detected (3)");
            assert_eq!(
                alert.message,
                "Detected 3 stream error events in the last 5 minutes"
            );
            assert_eq!(alert.severity, Severity::Error);
        }

        #[test]
        fn cooldown_then_fresh_burst() {
            let agg = aggregator(config(3, 5, 15));
            for m in [0, 1, 2] {
                agg.observe_at(STREAM, at_min(m)).unwrap();
            }
            let late = agg.observe_at(STREAM, at_min(10)).unwrap();
            assert!(late.alert().is_none());
            assert_eq!(agg.store().len(), 1);

            let burst: Vec<Outcome> = (0..4)
                .map(|s| agg.observe_at(STREAM, at_min(20) + Duration::seconds(s)).unwrap())
                .collect();
            assert_eq!(fired(&burst), 1);
            assert_eq!(agg.store().len(), 2);
        }

        #[test]
        fn unmatched_line_changes_nothing() {
            let agg = aggregator(config(1, 5, 15));
            let outcome = agg.observe_at("INFO - Library scan complete", t0()).unwrap();
            assert_eq!(outcome, Outcome::NoMatch);

            let state = agg.state.lock();
            for category in Category::ALL {
                assert_eq!(state.windows.retained(category), 0);
                assert!(state.cooldowns.last_fired(category).is_none());
            }
            drop(state);
            assert!(agg.store().is_empty());
        }
    }

    mod behavior_tests {
        use super::*;

        #[test]
        fn disabled_class_is_discarded() {
            let cfg = AggregatorConfig {
                monitor_warnings: false,
                ..config(1, 5, 0)
            };
            let agg = aggregator(cfg);
            let outcome = agg.observe_at(PERMISSION, t0()).unwrap();
            assert_eq!(
                outcome,
                Outcome::Disabled {
                    category: Category::PermissionWarning
                }
            );
            assert_eq!(agg.state.lock().windows.retained(Category::PermissionWarning), 0);

            assert!(agg.observe_at(STREAM, t0()).unwrap().alert().is_some());
        }

        #[test]
        fn escalated_warning_still_uses_warning_toggle() {
            let cfg = AggregatorConfig {
                monitor_warnings: false,
                ..config(1, 5, 0)
            };
            let agg = aggregator(cfg);
            let outcome = agg
                .observe_at("WARN - codec failure CRITICAL", t0())
                .unwrap();
            assert!(matches!(outcome, Outcome::Disabled { .. }));
        }

        #[test]
        fn alert_severity_is_worst_in_window() {
            let agg = aggregator(config(3, 5, 15));
            agg.observe_at("CRITICAL ERROR - stream died", at_min(0)).unwrap();
            agg.observe_at(STREAM, at_min(1)).unwrap();
            let alert = agg.observe_at(STREAM, at_min(2)).unwrap();
            let alert = alert.alert().unwrap();
            assert_eq!(alert.severity, Severity::Critical);
            assert_eq!(alert.details["Severity"], serde_json::json!("critical"));
        }

        #[test]
        fn oversized_line_is_an_error_without_state_change() {
            let agg = aggregator(config(1, 5, 0));
            let line = format!("ERROR - stream {}", "x".repeat(70_000));
            let err = agg.observe_at(&line, t0()).unwrap_err();
            assert!(matches!(err, AlertError::Classification { .. }));
            assert_eq!(agg.state.lock().windows.retained(Category::StreamError), 0);

            assert!(agg.observe_at(STREAM, t0()).unwrap().alert().is_some());
        }

        #[test]
        fn idle_categories_are_pruned() {
            let agg = aggregator(config(5, 5, 15));
            agg.observe_at(PERMISSION, at_min(0)).unwrap();
            agg.observe_at(PERMISSION, at_min(1)).unwrap();
            assert_eq!(agg.state.lock().windows.retained(Category::PermissionWarning), 2);

            agg.observe_at(STREAM, at_min(10)).unwrap();
            let state = agg.state.lock();
            assert_eq!(state.windows.retained(Category::PermissionWarning), 0);
            assert_eq!(state.windows.retained(Category::StreamError), 1);
        }

        #[test]
        fn cooldown_recorded_on_fire() {
            let agg = aggregator(config(1, 5, 15));
            agg.observe_at(STREAM, at_min(3)).unwrap();
            assert_eq!(
                agg.state.lock().cooldowns.last_fired(Category::StreamError),
                Some(at_min(3))
            );
        }

        #[test]
        fn sample_line_is_truncated() {
            let agg = aggregator(config(1, 5, 0));
            let line = format!("ERROR - stream {}", "y".repeat(500));
            let outcome = agg.observe_at(&line, t0()).unwrap();
            let latest = outcome.alert().unwrap().details["Latest Error"]
                .as_str()
                .unwrap()
                .to_string();
            assert_eq!(latest.chars().count(), SAMPLE_LINE_CHARS);
        }

        #[test]
        fn observe_uses_arrival_time() {
            let agg = aggregator(config(1, 5, 0));
            let line = LogLine::at(STREAM, at_min(7), 0);
            let outcome = agg.observe(&line).unwrap();
            assert_eq!(outcome.alert().unwrap().timestamp, at_min(7));
        }

        #[test]
        fn config_change_applies_to_next_line() {
            let agg = aggregator(config(3, 5, 15));
            agg.observe_at(STREAM, at_min(0)).unwrap();
            agg.update_config(config(2, 5, 15)).unwrap();
            let outcome = agg.observe_at(STREAM, at_min(1)).unwrap();
            assert!(outcome.alert().is_some());
        }
    }
}
