//! Per-category sliding window counting.
//!
//! An entry recorded at `t` is inside the window at `now` iff
//! `now - window < t <= now`. An entry exactly at `now - window` is out.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

use crate::types::{Category, Severity};

/// Recent matches of a single category, oldest first.
#[derive(Debug, Clone, Default)]
pub struct SlidingWindow {
    entries: VecDeque<(DateTime<Utc>, Severity)>,
}

impl SlidingWindow {
    /// Creates an empty window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a match.
    pub fn record(&mut self, at: DateTime<Utc>, severity: Severity) {
        match self.entries.back() {
            Some((last, _)) if at < *last => {
                let idx = self.entries.partition_point(|(t, _)| *t <= at);
                self.entries.insert(idx, (at, severity));
            }
            _ => self.entries.push_back((at, severity)),
        }
    }

    /// Drops every entry at or before `now - window`.
    pub fn prune(&mut self, now: DateTime<Utc>, window: Duration) {
        let cutoff = now - window;
        while self.entries.front().is_some_and(|(t, _)| *t <= cutoff) {
            self.entries.pop_front();
        }
    }

    /// Prunes, then counts entries inside the window.
    pub fn count_in_window(&mut self, now: DateTime<Utc>, window: Duration) -> usize {
        self.prune(now, window);
        let ahead = self.entries.iter().rev().take_while(|(t, _)| *t > now).count();
        self.entries.len() - ahead
    }

    /// Prunes, then returns the worst severity inside the window.
    pub fn worst_severity(&mut self, now: DateTime<Utc>, window: Duration) -> Option<Severity> {
        self.prune(now, window);
        self.entries
            .iter()
            .filter(|(t, _)| *t <= now)
            .map(|(_, s)| *s)
            .max()
    }

    /// Number of retained entries (pruned or not).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One [`SlidingWindow`] per category.
#[derive(Debug, Default)]
pub struct WindowCounter {
    windows: HashMap<Category, SlidingWindow>,
}

impl WindowCounter {
    /// Creates an empty counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a match of `category` at `at`.
    pub fn record(&mut self, category: Category, at: DateTime<Utc>, severity: Severity) {
        self.windows.entry(category).or_default().record(at, severity);
    }

    /// Counts matches of `category` inside the window ending at `now`.
    pub fn count_in_window(&mut self, category: Category, now: DateTime<Utc>, window: Duration) -> usize {
        self.windows
            .get_mut(&category)
            .map_or(0, |w| w.count_in_window(now, window))
    }

    /// Worst severity of `category` inside the window ending at `now`.
    pub fn worst_severity(
        &mut self,
        category: Category,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Option<Severity> {
        self.windows
            .get_mut(&category)
            .and_then(|w| w.worst_severity(now, window))
    }

    /// Prunes every category.
    pub fn prune(&mut self, now: DateTime<Utc>, window: Duration) {
        for w in self.windows.values_mut() {
            w.prune(now, window);
        }
    }

    /// Number of retained entries for `category`.
    #[must_use]
    pub fn retained(&self, category: Category) -> usize {
        self.windows.get(&category).map_or(0, SlidingWindow::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn mins(n: i64) -> Duration {
        Duration::minutes(n)
    }

    mod sliding_window_tests {
        use super::*;

        #[test]
        fn counts_recent_entries() {
            let mut w = SlidingWindow::new();
            w.record(t0(), Severity::Error);
            w.record(t0() + mins(1), Severity::Error);
            w.record(t0() + mins(2), Severity::Error);
            assert_eq!(w.count_in_window(t0() + mins(2), mins(5)), 3);
        }

        #[test]
        fn entry_at_lower_boundary_is_excluded() {
            let mut w = SlidingWindow::new();
            w.record(t0(), Severity::Error);
            assert_eq!(w.count_in_window(t0() + mins(5) - Duration::seconds(1), mins(5)), 1);
            assert_eq!(w.count_in_window(t0() + mins(5), mins(5)), 0);
            assert!(w.is_empty());
        }

        #[test]
        fn entry_at_now_is_included() {
            let mut w = SlidingWindow::new();
            w.record(t0(), Severity::Warning);
            assert_eq!(w.count_in_window(t0(), mins(5)), 1);
        }

        #[test]
        fn prune_drops_from_front_only() {
            let mut w = SlidingWindow::new();
            for i in 0..10 {
                w.record(t0() + mins(i), Severity::Error);
            }
            w.prune(t0() + mins(12), mins(5));
            // Entries at 8 and 9 minutes survive.
            assert_eq!(w.len(), 2);
        }

        #[test]
        fn out_of_order_record_stays_sorted() {
            let mut w = SlidingWindow::new();
            w.record(t0() + mins(3), Severity::Error);
            w.record(t0(), Severity::Error);
            w.prune(t0() + mins(6), mins(5));
            assert_eq!(w.len(), 1);
        }

        #[test]
        fn worst_severity_only_considers_window() {
            let mut w = SlidingWindow::new();
            w.record(t0(), Severity::Critical);
            w.record(t0() + mins(4), Severity::Error);
            w.record(t0() + mins(6), Severity::Warning);
            assert_eq!(w.worst_severity(t0() + mins(4), mins(5)), Some(Severity::Critical));
            assert_eq!(w.worst_severity(t0() + mins(6), mins(5)), Some(Severity::Error));
            assert_eq!(w.worst_severity(t0() + mins(30), mins(5)), None);
        }
    }

    mod window_counter_tests {
        use super::*;

        #[test]
        fn categories_are_independent() {
            let mut counter = WindowCounter::new();
            counter.record(Category::StreamError, t0(), Severity::Error);
            counter.record(Category::StreamError, t0(), Severity::Error);
            counter.record(Category::DatabaseError, t0(), Severity::Error);

            assert_eq!(counter.count_in_window(Category::StreamError, t0(), mins(5)), 2);
            assert_eq!(counter.count_in_window(Category::DatabaseError, t0(), mins(5)), 1);
            assert_eq!(counter.count_in_window(Category::DiskError, t0(), mins(5)), 0);
        }

        #[test]
        fn prune_all_bounds_memory() {
            let mut counter = WindowCounter::new();
            for category in Category::ALL {
                counter.record(category, t0(), Severity::Warning);
            }
            counter.prune(t0() + mins(10), mins(5));
            for category in Category::ALL {
                assert_eq!(counter.retained(category), 0);
            }
        }
    }

    mod property_tests {
        use super::*;

        proptest! {
            #[test]
            fn count_matches_brute_force(
                mut offsets in prop::collection::vec(0i64..3_600, 0..60),
                prune_points in prop::collection::vec(0i64..3_600, 0..10),
                window_secs in 1i64..1_200,
                extra in 0i64..600,
            ) {
                offsets.sort_unstable();
                let window = Duration::seconds(window_secs);
                let now = t0() + Duration::seconds(offsets.last().copied().unwrap_or(0) + extra);

                let mut w = SlidingWindow::new();
                for off in &offsets {
                    w.record(t0() + Duration::seconds(*off), Severity::Error);
                }
                for p in &prune_points {
                    let at = (t0() + Duration::seconds(*p)).min(now);
                    w.prune(at, window);
                }

                let expected = offsets
                    .iter()
                    .map(|off| t0() + Duration::seconds(*off))
                    .filter(|t| now - window < *t && *t <= now)
                    .count();
                prop_assert_eq!(w.count_in_window(now, window), expected);
            }

            #[test]
            fn repeated_queries_are_stable(
                offsets in prop::collection::vec(0i64..600, 1..30),
                window_secs in 1i64..600,
            ) {
                let mut sorted = offsets;
                sorted.sort_unstable();
                let window = Duration::seconds(window_secs);
                let now = t0() + Duration::seconds(600);
                let mut w = SlidingWindow::new();
                for off in &sorted {
                    w.record(t0() + Duration::seconds(*off), Severity::Error);
                }
                let first = w.count_in_window(now, window);
                let second = w.count_in_window(now, window);
                prop_assert_eq!(first, second);
            }
        }
    }
}
