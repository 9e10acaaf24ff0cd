// In-process observation cache keyed by (source, series, window).
// Upstream series data is immutable for a fixed date range, so entries
// never expire; restarting the process clears the cache.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use crate::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};
use crate::sources::RawObservation;

type CacheKey = (String, String, NaiveDate, NaiveDate);

#[derive(Clone, Default)]
pub struct ObservationCache {
    entries: Arc<Mutex<HashMap<CacheKey, Vec<RawObservation>>>>,
}

impl ObservationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached series for this key, or run `fetch` and cache
    /// its result. Empty results are cached too: a series with no data
    /// in the window will not grow data on retry.
    ///
    /// The lock is not held across the fetch, so concurrent misses on
    /// the same key may fetch twice; the later insert wins.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        source: &str,
        series_key: &str,
        start: NaiveDate,
        end: NaiveDate,
        fetch: F,
    ) -> Result<Vec<RawObservation>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<RawObservation>, E>>,
    {
        let key = (source.to_string(), series_key.to_string(), start, end);
        if let Some(cached) = self.entries.lock().unwrap().get(&key) {
            CACHE_HITS_TOTAL.inc();
            return Ok(cached.clone());
        }
        CACHE_MISSES_TOTAL.inc();

        let observations = fetch().await?;
        self.entries
            .lock()
            .unwrap()
            .insert(key, observations.clone());
        Ok(observations)
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn sample() -> Vec<RawObservation> {
        vec![
            RawObservation::new("2020-01-01", "3.5"),
            RawObservation::new("2020-02-01", "3.6"),
        ]
    }

    #[tokio::test]
    async fn test_second_lookup_skips_fetch() {
        let cache = ObservationCache::new();
        let fetches = AtomicUsize::new(0);
        let (start, end) = (date("2020-01-01"), date("2020-12-31"));

        for _ in 0..3 {
            let got: Result<_, std::convert::Infallible> = cache
                .get_or_fetch("fred", "UNRATE", start, end, || async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(sample())
                })
                .await;
            assert_eq!(got.unwrap().len(), 2);
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_windows_are_distinct_entries() {
        let cache = ObservationCache::new();
        let _: Result<_, std::convert::Infallible> = cache
            .get_or_fetch("fred", "UNRATE", date("2020-01-01"), date("2020-06-30"), || async {
                Ok(sample())
            })
            .await;
        let _: Result<_, std::convert::Infallible> = cache
            .get_or_fetch("fred", "UNRATE", date("2020-01-01"), date("2020-12-31"), || async {
                Ok(sample())
            })
            .await;
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_result_is_cached() {
        let cache = ObservationCache::new();
        let fetches = AtomicUsize::new(0);
        let (start, end) = (date("1800-01-01"), date("1800-12-31"));

        for _ in 0..2 {
            let got: Result<_, std::convert::Infallible> = cache
                .get_or_fetch("nber", "m01005", start, end, || async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(Vec::new())
                })
                .await;
            assert!(got.unwrap().is_empty());
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_is_not_cached() {
        let cache = ObservationCache::new();
        let (start, end) = (date("2020-01-01"), date("2020-12-31"));

        let err: Result<Vec<RawObservation>, &str> = cache
            .get_or_fetch("fred", "UNRATE", start, end, || async { Err("down") })
            .await;
        assert!(err.is_err());
        assert!(cache.is_empty());

        let ok: Result<_, &str> = cache
            .get_or_fetch("fred", "UNRATE", start, end, || async { Ok(sample()) })
            .await;
        assert_eq!(ok.unwrap().len(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_forces_refetch() {
        let cache = ObservationCache::new();
        let fetches = AtomicUsize::new(0);
        let (start, end) = (date("2020-01-01"), date("2020-12-31"));

        for _ in 0..2 {
            let _: Result<_, std::convert::Infallible> = cache
                .get_or_fetch("fred", "UNRATE", start, end, || async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(sample())
                })
                .await;
        }
        cache.clear();
        let _: Result<_, std::convert::Infallible> = cache
            .get_or_fetch("fred", "UNRATE", start, end, || async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok(sample())
            })
            .await;
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }
}
