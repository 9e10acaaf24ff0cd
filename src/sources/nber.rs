// NBER Macrohistory archive client. Series live as .db text files named by
// chapter path (e.g. "01/a01005a"); no API key. Covers the 1800s-1940s.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::info;

use super::{FetchError, RawObservation};
use crate::metrics;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct NberClient {
    http: reqwest::Client,
    base_url: String,
    // Raw file text per series path; one file serves both the title and
    // every observation request for that series.
    files: Mutex<HashMap<String, String>>,
}

impl NberClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            files: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch a series and return its observations within the inclusive
    /// date range. Missing values are reported as `"NA"`.
    pub async fn observations(
        &self,
        series_path: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawObservation>, FetchError> {
        let text = self.fetch_file(series_path).await?;
        let all = parse_db(&text);
        let start_s = start.to_string();
        let end_s = end.to_string();
        let out: Vec<RawObservation> = all
            .into_iter()
            .filter(|o| o.date >= start_s && o.date <= end_s)
            .collect();
        info!(
            series_path,
            start = %start,
            end = %end,
            n_obs = out.len(),
            "nber observations"
        );
        Ok(out)
    }

    /// The series description from the file's first comment line.
    pub async fn series_title(&self, series_path: &str) -> Result<Option<String>, FetchError> {
        let text = self.fetch_file(series_path).await?;
        Ok(parse_title(&text))
    }

    async fn fetch_file(&self, series_path: &str) -> Result<String, FetchError> {
        if let Some(text) = self.files.lock().unwrap().get(series_path).cloned() {
            return Ok(text);
        }
        let result = self.download_file(series_path).await;
        let label = if result.is_ok() { "ok" } else { "error" };
        metrics::UPSTREAM_REQUESTS_TOTAL
            .with_label_values(&["nber", label])
            .inc();
        let text = result?;
        self.files
            .lock()
            .unwrap()
            .insert(series_path.to_string(), text.clone());
        Ok(text)
    }

    async fn download_file(&self, series_path: &str) -> Result<String, FetchError> {
        let url = format!(
            "{}/databases/macrohistory/data/{}.db",
            self.base_url, series_path
        );
        let resp = self
            .http
            .get(&url)
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

/// Parse the .db layout: comment lines starting with `"`, a frequency
/// marker (-1 annual, -4 quarterly, -12 monthly), start and end year
/// lines (e.g. `1862.`, possibly with a subperiod fraction like
/// `1930.25`), then one value per line with `NA` or blank for missing.
/// Returns an empty vec when the structure is not recognizable.
pub(crate) fn parse_db(content: &str) -> Vec<RawObservation> {
    let lines: Vec<&str> = content
        .trim()
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut freq: Option<i32> = None;
    let mut start_line: Option<usize> = None;
    for (i, ln) in lines.iter().enumerate() {
        if matches!(*ln, "-1" | "-4" | "-12") {
            freq = ln.parse().ok();
            if i + 2 < lines.len() {
                start_line = Some(i + 1);
            }
            break;
        }
        if ln.starts_with('"') {
            continue;
        }
        if ln.parse::<i64>().is_ok() {
            // A bare integer before any frequency marker means this is
            // not the layout we know.
            break;
        }
    }
    let (Some(freq), Some(start_line)) = (freq, start_line) else {
        return Vec::new();
    };

    let start_raw = lines[start_line];
    let end_raw = lines[start_line + 1];
    let (Ok(start_f), Ok(end_f)) = (
        start_raw.trim_end_matches('.').parse::<f64>(),
        end_raw.trim_end_matches('.').parse::<f64>(),
    ) else {
        return Vec::new();
    };
    let start_y = start_f as i32;
    let end_y = end_f as i32;
    let periods = freq.abs();

    // Subperiod only for quarterly/monthly (e.g. 1930.25 encodes a quarter).
    let mut start_sub: i32 = 1;
    let mut end_sub: i32 = match periods {
        4 => 4,
        12 => 12,
        _ => 1,
    };
    if start_raw.contains('.') {
        let s = (start_f.fract() * periods as f64).round() as i32;
        start_sub = if s == 0 { 1 } else { s }.clamp(1, periods);
    }
    if end_raw.contains('.') && (periods == 4 || periods == 12) {
        let e = (end_f.fract() * periods as f64).round() as i32;
        end_sub = if e == 0 { periods } else { e }.clamp(1, periods);
    }

    let mut obs = Vec::new();
    let mut y = start_y;
    let mut sub = start_sub;
    for raw in &lines[start_line + 2..] {
        let trimmed = raw.trim();
        let is_na = trimmed.is_empty() || trimmed.eq_ignore_ascii_case("NA");
        let value = if is_na {
            "NA".to_string()
        } else {
            trimmed.to_string()
        };
        match freq {
            -1 => {
                obs.push(RawObservation::new(format!("{y:04}-01-01"), value));
                y += 1;
            }
            -4 => {
                let month = (sub - 1) * 3 + 1;
                obs.push(RawObservation::new(format!("{y:04}-{month:02}-01"), value));
                sub += 1;
                if sub > 4 {
                    sub = 1;
                    y += 1;
                }
            }
            _ => {
                obs.push(RawObservation::new(format!("{y:04}-{sub:02}-01"), value));
                sub += 1;
                if sub > 12 {
                    sub = 1;
                    y += 1;
                }
            }
        }
        if y > end_y || (y == end_y && (freq == -4 || freq == -12) && sub > end_sub) {
            break;
        }
    }
    obs
}

/// The first comment line, stripped of quotes, is the series description.
pub(crate) fn parse_title(content: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with('"'))
        .map(|l| l.trim_matches(|c| c == '"' || c == ' ').to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annual_crop_file() -> String {
        // 1862-1930 is 69 years; 63 numeric values then 6 NA at the end.
        let values: Vec<String> = (0..63).map(|i| format!("{:.1}", 82.2 + i as f64 * 0.5)).collect();
        format!(
            "\" Index of crop production\n-1\n1862.\n1930.\n{}\nNA\nNA\nNA\nNA\nNA\nNA",
            values.join("\n")
        )
    }

    #[test]
    fn test_parse_annual_with_na_tail() {
        let obs = parse_db(&annual_crop_file());
        assert_eq!(obs.len(), 69);
        assert_eq!(obs[0].date, "1862-01-01");
        assert_eq!(obs[0].value, "82.2");
        assert_eq!(obs[68].date, "1930-01-01");
        assert_eq!(obs[68].value, "NA");
        // The six trailing NAs are all kept as missing markers.
        assert!(obs[63..].iter().all(|o| o.value == "NA"));
    }

    #[test]
    fn test_parse_quarterly_subperiod_months() {
        let content = "\" Quarterly series\n-4\n1920.\n1921.\n1.0\n2.0\n3.0\n4.0\n5.0\n6.0\n7.0\n8.0";
        let obs = parse_db(content);
        assert_eq!(obs.len(), 8);
        let dates: Vec<&str> = obs.iter().map(|o| o.date.as_str()).collect();
        assert_eq!(
            dates,
            vec![
                "1920-01-01",
                "1920-04-01",
                "1920-07-01",
                "1920-10-01",
                "1921-01-01",
                "1921-04-01",
                "1921-07-01",
                "1921-10-01",
            ]
        );
    }

    #[test]
    fn test_parse_monthly_wraps_year() {
        let mut lines = vec![
            "\" Monthly series".to_string(),
            "-12".to_string(),
            "1913.".to_string(),
            "1914.".to_string(),
        ];
        for i in 0..24 {
            lines.push(format!("{}", 10 + i));
        }
        let obs = parse_db(&lines.join("\n"));
        assert_eq!(obs.len(), 24);
        assert_eq!(obs[0].date, "1913-01-01");
        assert_eq!(obs[11].date, "1913-12-01");
        assert_eq!(obs[12].date, "1914-01-01");
        assert_eq!(obs[23].date, "1914-12-01");
    }

    #[test]
    fn test_parse_stops_past_end_year() {
        // More value lines than the year span can hold.
        let content = "\" Short series\n-1\n1900.\n1901.\n1.0\n2.0\n3.0\n4.0\n5.0";
        let obs = parse_db(content);
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[1].date, "1901-01-01");
    }

    #[test]
    fn test_parse_unrecognized_structure() {
        assert!(parse_db("").is_empty());
        assert!(parse_db("\" Only a comment line").is_empty());
        assert!(parse_db("42\n-1\n1900.\n1901.\n1.0").is_empty());
    }

    #[test]
    fn test_parse_title() {
        assert_eq!(
            parse_title(&annual_crop_file()),
            Some("Index of crop production".to_string())
        );
        assert_eq!(parse_title("-1\n1900.\n1901.\n1.0"), None);
    }

    #[tokio::test]
    async fn test_observations_filters_range_and_caches_file() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/databases/macrohistory/data/01/a01005a.db")
            .with_status(200)
            .with_body(annual_crop_file())
            .expect(1)
            .create_async()
            .await;

        let client = NberClient::new(server.url());
        let start: NaiveDate = "1929-01-01".parse().unwrap();
        let end: NaiveDate = "1930-12-31".parse().unwrap();
        let obs = client
            .observations("01/a01005a", start, end)
            .await
            .unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].date, "1929-01-01");
        assert_eq!(obs[1].date, "1930-01-01");

        // Title comes out of the cached file, no second download.
        let title = client.series_title("01/a01005a").await.unwrap();
        assert_eq!(title, Some("Index of crop production".to_string()));
        mock.assert_async().await;
    }
}
