// FRED (Federal Reserve Economic Data) API client. Rotates across a key
// pool and falls back to bearer-header auth when the query-parameter key
// is rejected.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

use super::{FetchError, RawObservation};
use crate::metrics;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Series metadata as returned by the series, search and release endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct FredSeriesInfo {
    pub id: String,
    pub title: String,
    pub observation_start: NaiveDate,
    pub observation_end: NaiveDate,
    #[serde(default)]
    pub popularity: i64,
}

/// One FRED data release (a publication grouping series).
#[derive(Debug, Clone, Deserialize)]
pub struct FredRelease {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct SeriesResponse {
    seriess: Vec<FredSeriesInfo>,
}

#[derive(Debug, Deserialize)]
struct ReleasesResponse {
    releases: Vec<FredRelease>,
}

pub struct FredClient {
    http: reqwest::Client,
    base_url: String,
    api_keys: Vec<String>,
    next_key: AtomicUsize,
    releases_cache: Mutex<Option<Vec<FredRelease>>>,
}

impl FredClient {
    pub fn new(base_url: impl Into<String>, api_keys: Vec<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_keys,
            next_key: AtomicUsize::new(0),
            releases_cache: Mutex::new(None),
        }
    }

    /// Fetch observations for one series over an inclusive date range.
    /// Missing values come back as `"."`.
    pub async fn observations(
        &self,
        series_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawObservation>, FetchError> {
        let resp: ObservationsResponse = self
            .get_json(
                "/fred/series/observations",
                &[
                    ("series_id", series_id.to_string()),
                    ("observation_start", start.to_string()),
                    ("observation_end", end.to_string()),
                ],
            )
            .await?;
        Ok(resp.observations)
    }

    /// Fetch metadata (title, observation window, popularity) for one series.
    pub async fn series_info(&self, series_id: &str) -> Result<FredSeriesInfo, FetchError> {
        let resp: SeriesResponse = self
            .get_json("/fred/series", &[("series_id", series_id.to_string())])
            .await?;
        resp.seriess.into_iter().next().ok_or(FetchError::NoData)
    }

    /// Full-text search over series.
    pub async fn search_series(
        &self,
        search_text: &str,
        limit: usize,
    ) -> Result<Vec<FredSeriesInfo>, FetchError> {
        let resp: SeriesResponse = self
            .get_json(
                "/fred/series/search",
                &[
                    ("search_text", search_text.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(resp.seriess)
    }

    /// List data releases, fetched once per process and served from an
    /// in-client cache afterwards.
    pub async fn releases(&self, limit: usize) -> Result<Vec<FredRelease>, FetchError> {
        if let Some(cached) = self.releases_cache.lock().unwrap().as_ref() {
            return Ok(cached.iter().take(limit).cloned().collect());
        }
        let resp: ReleasesResponse = self.get_json("/fred/releases", &[]).await?;
        let mut guard = self.releases_cache.lock().unwrap();
        let releases = guard.get_or_insert(resp.releases);
        Ok(releases.iter().take(limit).cloned().collect())
    }

    /// List the series belonging to one release.
    pub async fn release_series(
        &self,
        release_id: i64,
        limit: usize,
    ) -> Result<Vec<FredSeriesInfo>, FetchError> {
        let resp: SeriesResponse = self
            .get_json(
                "/fred/release/series",
                &[
                    ("release_id", release_id.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(resp.seriess)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let result = self.request_json(path, params).await;
        let label = if result.is_ok() { "ok" } else { "error" };
        metrics::UPSTREAM_REQUESTS_TOTAL
            .with_label_values(&["fred", label])
            .inc();
        result
    }

    /// GET with every key in rotation order: query-parameter key first,
    /// then a bearer-header retry on 403, then the next key. The first
    /// 200 wins; the last failure is what gets reported.
    async fn request_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, FetchError> {
        if self.api_keys.is_empty() {
            return Err(FetchError::MissingApiKey("fred"));
        }
        let url = format!("{}{}", self.base_url, path);
        let keys = self.keys_in_rotation();
        let mut last: Option<(reqwest::StatusCode, String)> = None;
        for (key_idx, key) in keys.iter().enumerate() {
            let mut query: Vec<(&str, String)> = params.to_vec();
            query.push(("file_type", "json".to_string()));
            let mut keyed = query.clone();
            keyed.push(("api_key", key.clone()));

            let mut resp = self
                .http
                .get(&url)
                .query(&keyed)
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await?;
            if resp.status() == reqwest::StatusCode::FORBIDDEN {
                warn!(
                    path,
                    key_index = key_idx + 1,
                    total_keys = keys.len(),
                    "fred rejected query-parameter key, retrying with bearer header"
                );
                resp = self
                    .http
                    .get(&url)
                    .query(&query)
                    .bearer_auth(key)
                    .timeout(REQUEST_TIMEOUT)
                    .send()
                    .await?;
            }
            let status = resp.status();
            if status.is_success() {
                return resp
                    .json::<T>()
                    .await
                    .map_err(|e| FetchError::Parse(e.to_string()));
            }
            let body = resp.text().await.unwrap_or_default();
            last = Some((status, body));
        }
        let (status, body) = match last {
            Some(l) => l,
            None => return Err(FetchError::MissingApiKey("fred")),
        };
        warn!(path, status = status.as_u16(), "fred request failed for all keys");
        Err(FetchError::from_status(status, body))
    }

    /// Keys starting from the round-robin cursor, followed by the rest.
    fn keys_in_rotation(&self) -> Vec<String> {
        let idx = self.next_key.fetch_add(1, Ordering::Relaxed) % self.api_keys.len();
        let mut keys = vec![self.api_keys[idx].clone()];
        keys.extend(
            self.api_keys
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != idx)
                .map(|(_, k)| k.clone()),
        );
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_keys_rotate_round_robin() {
        let client = FredClient::new(
            "http://example.invalid",
            vec!["a".into(), "b".into(), "c".into()],
        );
        assert_eq!(client.keys_in_rotation()[0], "a");
        assert_eq!(client.keys_in_rotation()[0], "b");
        assert_eq!(client.keys_in_rotation()[0], "c");
        assert_eq!(client.keys_in_rotation()[0], "a");
        // All keys are always in the attempt list.
        let keys = client.keys_in_rotation();
        assert_eq!(keys.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_key_errors_without_request() {
        let client = FredClient::new("http://example.invalid", Vec::new());
        let err = client
            .observations("UNRATE", date("2020-01-01"), date("2020-12-31"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::MissingApiKey("fred")));
    }

    #[tokio::test]
    async fn test_observations_parse() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "observations": [
                {"date": "2020-01-01", "value": "3.5"},
                {"date": "2020-02-01", "value": "."},
            ]
        })
        .to_string();
        let mock = server
            .mock("GET", "/fred/series/observations")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let client = FredClient::new(server.url(), vec!["test-key".into()]);
        let obs = client
            .observations("UNRATE", date("2020-01-01"), date("2020-02-01"))
            .await
            .unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0], RawObservation::new("2020-01-01", "3.5"));
        assert_eq!(obs[1].value, ".");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_forbidden_triggers_bearer_retry() {
        let mut server = mockito::Server::new_async().await;
        // Both the query-key attempt and the bearer retry land here.
        let mock = server
            .mock("GET", "/fred/series/observations")
            .match_query(mockito::Matcher::Any)
            .with_status(403)
            .with_body("forbidden")
            .expect(2)
            .create_async()
            .await;

        let client = FredClient::new(server.url(), vec!["bad-key".into()]);
        let err = client
            .observations("UNRATE", date("2020-01-01"), date("2020-12-31"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Auth(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_series_parse() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "seriess": [
                {
                    "id": "UNRATE",
                    "title": "Unemployment Rate",
                    "observation_start": "1948-01-01",
                    "observation_end": "2024-06-01",
                    "popularity": 94
                }
            ]
        })
        .to_string();
        server
            .mock("GET", "/fred/series/search")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let client = FredClient::new(server.url(), vec!["k".into()]);
        let found = client.search_series("unemployment", 50).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "UNRATE");
        assert_eq!(found[0].popularity, 94);
        assert_eq!(found[0].observation_start, date("1948-01-01"));
    }

    #[tokio::test]
    async fn test_releases_cached_after_first_fetch() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "releases": [
                {"id": 10, "name": "Consumer Price Index"},
                {"id": 50, "name": "Employment Situation"},
            ]
        })
        .to_string();
        let mock = server
            .mock("GET", "/fred/releases")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(body)
            .expect(1)
            .create_async()
            .await;

        let client = FredClient::new(server.url(), vec!["k".into()]);
        let first = client.releases(10).await.unwrap();
        let second = client.releases(1).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].name, "Consumer Price Index");
        mock.assert_async().await;
    }
}
