//! Pattern classification, windowed alerting and notification delivery for
//! the Sentarr Plex monitor.
//!
//! `sentarr-alerts` turns Plex log lines into throttled alerts and delivers
//! them to email, Discord, Slack and generic webhooks.
//!
//! # Features
//!
//! - **Classifier**: Ordered, first-match-wins regex table mapping a line to a category
//! - **Sliding windows**: Per-category match counts over the last N minutes
//! - **Cooldowns**: Per-category minimum time between two alerts
//! - **Aggregator**: Threshold and cooldown state machine producing [`Alert`]s
//! - **Notifier**: Concurrent per-channel delivery with independent timeouts
//! - **Alert store**: In-memory history with resolve, delete and stats
//!
//! # Example
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use sentarr_alerts::{Aggregator, AggregatorConfig, AlertStore};
//!
//! let config = AggregatorConfig {
//!     error_threshold: 2,
//!     ..AggregatorConfig::default()
//! };
//! let aggregator = Aggregator::new(config, AlertStore::new()).unwrap();
//!
//! let now = Utc::now();
//! let line = "ERROR - Transcode session failed";
//! assert!(aggregator.observe_at(line, now).unwrap().alert().is_none());
//!
//! let outcome = aggregator.observe_at(line, now + Duration::seconds(30)).unwrap();
//! let alert = outcome.alert().unwrap();
//! assert_eq!(alert.title, "Multiple Stream Error Detected (2)");
//! assert_eq!(aggregator.store().len(), 1);
//! ```
//!
//! # Delivering alerts
//!
//! ```rust,no_run
//! use sentarr_alerts::{Alert, ChannelConfig, Notifier, Severity};
//! use chrono::Utc;
//!
//! # async fn run() {
//! let notifier = Notifier::new();
//! let channels = vec![ChannelConfig::discord("discord", "https://discord.com/api/webhooks/1/abc")];
//! let alert = Alert::new("Disk trouble", "Read errors on /data", Severity::Error, Utc::now());
//!
//! for result in notifier.dispatch(&alert, &channels).await {
//!     println!("{}: {}", result.channel, result.success);
//! }
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod aggregator;
pub mod channels;
pub mod classifier;
pub mod cooldown;
pub mod error;
pub mod notifier;
pub mod store;
pub mod types;
pub mod window;

// Re-export main types at crate root
pub use aggregator::{Aggregator, AggregatorConfig, Outcome};
pub use channels::{
    ChannelConfig, ChannelKind, ChannelResult, ChannelSettings, DiscordChannel, DiscordSettings,
    EmailChannel, EmailSettings, NotificationChannel, NotificationPayload, SlackChannel,
    SlackSettings, WebhookChannel, WebhookSettings,
};
pub use classifier::{
    Classification, Classifier, MAX_LINE_BYTES, PatternRule, level_token, resolve_severity,
};
pub use cooldown::CooldownGate;
pub use error::{AlertError, Result};
pub use notifier::{Notifier, test_alert};
pub use store::{AlertStats, AlertStore};
pub use types::{Alert, AlertDetails, AlertStatus, Category, Severity, SeverityClass};
pub use window::{SlidingWindow, WindowCounter};
