// Search-interest client. Speaks the unofficial trends widget API: an
// explore call issues a token for the TIMESERIES widget, a second call
// downloads its timeline. No API key.

use std::time::Duration;

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

use super::{FetchError, RawObservation};
use crate::metrics;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ExploreResponse {
    widgets: Vec<Widget>,
}

#[derive(Debug, Deserialize)]
struct Widget {
    id: String,
    #[serde(default)]
    token: String,
    #[serde(default)]
    request: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct MultilineResponse {
    default: Timeline,
}

#[derive(Debug, Deserialize)]
struct Timeline {
    #[serde(rename = "timelineData")]
    timeline_data: Vec<TimelinePoint>,
}

#[derive(Debug, Deserialize)]
struct TimelinePoint {
    time: String,
    #[serde(default)]
    value: Vec<f64>,
    #[serde(default, rename = "hasData")]
    has_data: Vec<bool>,
}

pub struct TrendsClient {
    http: reqwest::Client,
    base_url: String,
}

impl TrendsClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Fetch relative search interest (0-100) for one keyword over an
    /// inclusive date range. Points the upstream marks as having no data
    /// are dropped, matching how the interest table reports them.
    pub async fn interest_over_time(
        &self,
        keyword: &str,
        start: NaiveDate,
        end: NaiveDate,
        geo: Option<&str>,
    ) -> Result<Vec<RawObservation>, FetchError> {
        let result = self.fetch_timeline(keyword, start, end, geo).await;
        let label = if result.is_ok() { "ok" } else { "error" };
        metrics::UPSTREAM_REQUESTS_TOTAL
            .with_label_values(&["google_trends", label])
            .inc();
        result
    }

    async fn fetch_timeline(
        &self,
        keyword: &str,
        start: NaiveDate,
        end: NaiveDate,
        geo: Option<&str>,
    ) -> Result<Vec<RawObservation>, FetchError> {
        let explore_req = serde_json::json!({
            "comparisonItem": [{
                "keyword": keyword,
                "geo": geo.unwrap_or(""),
                "time": format!("{} {}", start, end),
            }],
            "category": 0,
            "property": "",
        });
        let text = self
            .get_text(
                "/trends/api/explore",
                &[
                    ("hl", "en-US".to_string()),
                    ("tz", "360".to_string()),
                    ("req", explore_req.to_string()),
                ],
            )
            .await?;
        let explore: ExploreResponse = parse_guarded_json(&text)?;
        let widget = explore
            .widgets
            .into_iter()
            .find(|w| w.id == "TIMESERIES")
            .ok_or_else(|| FetchError::Parse("explore response has no TIMESERIES widget".into()))?;

        let text = self
            .get_text(
                "/trends/api/widgetdata/multiline",
                &[
                    ("hl", "en-US".to_string()),
                    ("tz", "360".to_string()),
                    ("req", widget.request.to_string()),
                    ("token", widget.token),
                ],
            )
            .await?;
        let multiline: MultilineResponse = parse_guarded_json(&text)?;
        Ok(multiline
            .default
            .timeline_data
            .iter()
            .filter_map(observation_from_point)
            .collect())
    }

    async fn get_text(&self, path: &str, params: &[(&str, String)]) -> Result<String, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .query(params)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status, body));
        }
        Ok(resp.text().await?)
    }
}

/// Responses carry an XSSI guard prefix (`)]}'` and friends) before the
/// JSON document; drop everything up to the first brace.
fn strip_xssi_prefix(text: &str) -> &str {
    match text.find('{') {
        Some(idx) => &text[idx..],
        None => text,
    }
}

fn parse_guarded_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, FetchError> {
    serde_json::from_str(strip_xssi_prefix(text)).map_err(|e| FetchError::Parse(e.to_string()))
}

fn observation_from_point(point: &TimelinePoint) -> Option<RawObservation> {
    if point.has_data.first() == Some(&false) {
        return None;
    }
    let secs: i64 = point.time.parse().ok()?;
    let date = DateTime::from_timestamp(secs, 0)?.date_naive();
    let value = *point.value.first()?;
    Some(RawObservation::new(
        date.to_string(),
        format!("{}", value as i64),
    ))
}
