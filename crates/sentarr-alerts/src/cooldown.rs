//! Per-category cooldown between alert firings.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::types::Category;

/// Tracks when each category last fired.
#[derive(Debug, Default)]
pub struct CooldownGate {
    last_fired: HashMap<Category, DateTime<Utc>>,
}

impl CooldownGate {
    /// Creates a gate with nothing fired yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `category` never fired or its cooldown has elapsed.
    #[must_use]
    pub fn can_fire(&self, category: Category, now: DateTime<Utc>, cooldown: Duration) -> bool {
        self.last_fired
            .get(&category)
            .is_none_or(|last| now - *last >= cooldown)
    }

    /// Records a firing, overwriting any previous one.
    pub fn record_fired(&mut self, category: Category, now: DateTime<Utc>) {
        self.last_fired.insert(category, now);
    }

    /// When `category` last fired.
    #[must_use]
    pub fn last_fired(&self, category: Category) -> Option<DateTime<Utc>> {
        self.last_fired.get(&category).copied()
    }
}
