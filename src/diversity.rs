// Session-scoped diversity guard. Remembers the date windows and metrics
// already served so consecutive puzzles stop clustering on the same era
// or the same series.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use crate::seeds::Seed;

/// Snapshot of served history, usable without the tracker's lock.
/// Feeds both the generation prompt and the fallback pool pick.
#[derive(Debug, Clone, Default)]
pub struct AvoidHints {
    pub intervals: Vec<(NaiveDate, NaiveDate)>,
    /// Sorted, so prompts built from the same history are identical.
    pub metric_keys: Vec<String>,
}

impl AvoidHints {
    /// True when the seed clashes with nothing served so far. Date
    /// intervals are inclusive on both ends, so a shared boundary day
    /// counts as overlap.
    pub fn allows(&self, seed: &Seed) -> bool {
        if self.metric_keys.contains(&seed.metric_key()) {
            return false;
        }
        !self
            .intervals
            .iter()
            .any(|&(start, end)| seed.start_date <= end && start <= seed.end_date)
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty() && self.metric_keys.is_empty()
    }
}

#[derive(Default)]
struct DiversityState {
    intervals: Vec<(NaiveDate, NaiveDate)>,
    metric_keys: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct DiversityTracker {
    state: Arc<Mutex<DiversityState>>,
}

impl DiversityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepts(&self, seed: &Seed) -> bool {
        self.avoid_hints().allows(seed)
    }

    /// Record a seed that actually became a served puzzle. Candidates
    /// rejected later in the build pipeline must not be recorded, or
    /// they would block the eras they never used.
    pub fn record(&self, seed: &Seed) {
        let mut state = self.state.lock().unwrap();
        state.intervals.push((seed.start_date, seed.end_date));
        state.metric_keys.insert(seed.metric_key());
    }

    pub fn avoid_hints(&self) -> AvoidHints {
        let state = self.state.lock().unwrap();
        let mut metric_keys: Vec<String> = state.metric_keys.iter().cloned().collect();
        metric_keys.sort();
        AvoidHints {
            intervals: state.intervals.clone(),
            metric_keys,
        }
    }

    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.intervals.clear();
        state.metric_keys.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzles::DataSource;
    use crate::seeds::SeedOrigin;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn seed(source: DataSource, key: &str, start: &str, end: &str) -> Seed {
        Seed {
            source,
            series_key: key.to_string(),
            geo: None,
            start_date: date(start),
            end_date: date(end),
            correct_event: "test event".into(),
            acceptable_answers: vec!["test".into()],
            explanation: "because".into(),
            hints: std::array::from_fn(|i| format!("hint {}", i + 1)),
            origin: SeedOrigin::Fallback,
        }
    }

    #[test]
    fn test_fresh_tracker_accepts_anything() {
        let tracker = DiversityTracker::new();
        assert!(tracker.accepts(&seed(DataSource::Fred, "UNRATE", "2020-01-01", "2020-12-31")));
        assert!(tracker.avoid_hints().is_empty());
    }

    #[test]
    fn test_repeated_metric_is_rejected_across_eras() {
        let tracker = DiversityTracker::new();
        tracker.record(&seed(DataSource::Fred, "UNRATE", "2008-01-01", "2009-12-31"));
        assert!(!tracker.accepts(&seed(DataSource::Fred, "UNRATE", "2020-01-01", "2020-12-31")));
        // Same series id on a different source is a different metric.
        assert!(tracker.accepts(&seed(DataSource::Nber, "UNRATE", "2020-01-01", "2020-12-31")));
    }

    #[test]
    fn test_metric_key_is_case_insensitive() {
        let tracker = DiversityTracker::new();
        tracker.record(&seed(DataSource::Fred, "UNRATE", "2008-01-01", "2009-12-31"));
        assert!(!tracker.accepts(&seed(DataSource::Fred, "unrate", "2020-01-01", "2020-12-31")));
    }

    #[test]
    fn test_overlapping_interval_is_rejected() {
        let tracker = DiversityTracker::new();
        tracker.record(&seed(DataSource::Fred, "UNRATE", "2020-01-01", "2020-12-31"));

        // Shared boundary day overlaps.
        assert!(!tracker.accepts(&seed(
            DataSource::Fred,
            "HOUST",
            "2020-12-31",
            "2021-06-30"
        )));
        // Fully inside overlaps.
        assert!(!tracker.accepts(&seed(
            DataSource::Fred,
            "HOUST",
            "2020-03-01",
            "2020-06-30"
        )));
        // Adjacent but disjoint is fine.
        assert!(tracker.accepts(&seed(
            DataSource::Fred,
            "HOUST",
            "2021-01-01",
            "2021-06-30"
        )));
    }

    #[test]
    fn test_avoid_hints_snapshot_is_sorted() {
        let tracker = DiversityTracker::new();
        tracker.record(&seed(DataSource::Fred, "UNRATE", "2020-01-01", "2020-12-31"));
        tracker.record(&seed(DataSource::Fred, "HOUST", "2006-01-01", "2008-12-31"));
        tracker.record(&seed(DataSource::GoogleTrends, "bitcoin", "2017-01-01", "2017-12-31"));

        let hints = tracker.avoid_hints();
        assert_eq!(
            hints.metric_keys,
            vec!["fred:houst", "fred:unrate", "google_trends:bitcoin"]
        );
        assert_eq!(hints.intervals.len(), 3);
    }

    #[test]
    fn test_reset_clears_history() {
        let tracker = DiversityTracker::new();
        tracker.record(&seed(DataSource::Fred, "UNRATE", "2020-01-01", "2020-12-31"));
        tracker.reset();
        assert!(tracker.accepts(&seed(DataSource::Fred, "UNRATE", "2020-06-01", "2020-09-30")));
        assert!(tracker.avoid_hints().is_empty());
    }
}
