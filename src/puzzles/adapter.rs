// Core puzzle types and the per-source adapter trait.

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::PuzzleError;
use crate::puzzles::viz::VizHints;
use crate::sources::RawObservation;

/// The data sources puzzles can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSource {
    Fred,
    GoogleTrends,
    Nber,
}

impl DataSource {
    pub const ALL: [DataSource; 3] = [
        DataSource::Fred,
        DataSource::GoogleTrends,
        DataSource::Nber,
    ];

    /// The wire/registry identifier for this source.
    pub fn id(self) -> &'static str {
        match self {
            DataSource::Fred => "fred",
            DataSource::GoogleTrends => "google_trends",
            DataSource::Nber => "nber",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "fred" => Some(DataSource::Fred),
            "google_trends" => Some(DataSource::GoogleTrends),
            "nber" => Some(DataSource::Nber),
            _ => None,
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// One normalized point. Missing values are NaN so the full date range
/// survives into the chart as a visible gap.
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

impl Observation {
    pub fn is_missing(&self) -> bool {
        self.value.is_nan()
    }
}

/// How the chart is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartType {
    Line,
    Area,
    Bar,
}

/// Source-specific fetch parameters.
#[derive(Debug, Clone)]
pub struct SeriesQuery {
    pub series_id: Option<String>,
    pub search_term: Option<String>,
    pub geo: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// A puzzle build request: identity and answer key plus the fetch payload
/// and optional display overrides.
#[derive(Debug, Clone)]
pub struct PuzzleMeta {
    pub id: String,
    pub source: DataSource,
    pub title: String,
    pub correct_event: String,
    pub acceptable_answers: Vec<String>,
    pub explanation: String,
    pub data: Option<SeriesQuery>,
    pub chart_type: Option<ChartType>,
    pub y_label: Option<String>,
    pub y_limits: Option<(f64, f64)>,
}

/// A fully built, playable puzzle.
#[derive(Debug, Clone)]
pub struct Puzzle {
    pub id: String,
    pub source: DataSource,
    pub title: String,
    pub correct_event: String,
    pub acceptable_answers: Vec<String>,
    pub explanation: String,
    pub series: Vec<Observation>,
    pub chart_type: ChartType,
    pub y_label: String,
    pub y_limits: Option<(f64, f64)>,
}

/// Adapter for one data source: fetch raw observations and assemble the
/// canonical puzzle.
#[async_trait]
pub trait PuzzleAdapter: Send + Sync {
    fn source_id(&self) -> &'static str;

    /// Fetch observations for this source. Fails with a `MissingParam`
    /// error when the source's required parameter is absent.
    async fn fetch_observations(
        &self,
        query: &SeriesQuery,
    ) -> Result<Vec<RawObservation>, PuzzleError>;

    fn build_puzzle(&self, meta: &PuzzleMeta, observations: Vec<RawObservation>) -> Puzzle;
}

/// Deterministic puzzle id from the source, series key and date range.
pub fn puzzle_id(
    source: DataSource,
    series_key: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> String {
    let key: String = series_key
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("{}-{}-{}-{}", source.id(), key, start, end)
}

/// Parse raw observations into plot-ready points: `.`/`NA`/empty and
/// unparseable values become NaN, dates that do not parse are dropped.
pub fn normalize_series(observations: &[RawObservation]) -> Vec<Observation> {
    observations
        .iter()
        .filter_map(|ob| {
            let date: NaiveDate = ob.date.parse().ok()?;
            let trimmed = ob.value.trim();
            let value = if trimmed == "." || trimmed.is_empty() || trimmed.eq_ignore_ascii_case("NA")
            {
                f64::NAN
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            };
            Some(Observation { date, value })
        })
        .collect()
}

/// Shared tail of every adapter's `build_puzzle`.
pub(crate) fn assemble(meta: &PuzzleMeta, observations: Vec<RawObservation>, viz: VizHints) -> Puzzle {
    Puzzle {
        id: meta.id.clone(),
        source: meta.source,
        title: meta.title.clone(),
        correct_event: meta.correct_event.clone(),
        acceptable_answers: meta.acceptable_answers.clone(),
        explanation: meta.explanation.clone(),
        series: normalize_series(&observations),
        chart_type: viz.chart_type,
        y_label: viz.y_label,
        y_limits: viz.y_limits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_series_missing_markers() {
        let raw = vec![
            RawObservation::new("2020-01-01", "3.5"),
            RawObservation::new("2020-02-01", "."),
            RawObservation::new("2020-03-01", "NA"),
            RawObservation::new("2020-04-01", " na "),
            RawObservation::new("2020-05-01", ""),
            RawObservation::new("2020-06-01", "garbage"),
            RawObservation::new("2020-07-01", "-1.25"),
        ];
        let series = normalize_series(&raw);
        assert_eq!(series.len(), 7);
        assert_eq!(series[0].value, 3.5);
        assert!(series[1].is_missing());
        assert!(series[2].is_missing());
        assert!(series[3].is_missing());
        assert!(series[4].is_missing());
        assert!(series[5].is_missing());
        assert_eq!(series[6].value, -1.25);
        // The full date range survives, gaps included.
        assert_eq!(series[1].date, "2020-02-01".parse().unwrap());
    }

    #[test]
    fn test_normalize_series_drops_bad_dates() {
        let raw = vec![
            RawObservation::new("not-a-date", "1.0"),
            RawObservation::new("2020-01-01", "2.0"),
        ];
        let series = normalize_series(&raw);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].value, 2.0);
    }

    #[test]
    fn test_puzzle_id_deterministic_slug() {
        let start: NaiveDate = "2020-01-01".parse().unwrap();
        let end: NaiveDate = "2020-12-31".parse().unwrap();
        assert_eq!(
            puzzle_id(DataSource::Fred, "UNRATE", start, end),
            "fred-unrate-2020-01-01-2020-12-31"
        );
        assert_eq!(
            puzzle_id(DataSource::Nber, "01/a01005a", start, end),
            "nber-01-a01005a-2020-01-01-2020-12-31"
        );
        assert_eq!(
            puzzle_id(DataSource::GoogleTrends, "toilet paper", start, end),
            "google_trends-toilet-paper-2020-01-01-2020-12-31"
        );
        // Same inputs, same id.
        assert_eq!(
            puzzle_id(DataSource::Fred, "UNRATE", start, end),
            puzzle_id(DataSource::Fred, "UNRATE", start, end)
        );
    }

    #[test]
    fn test_data_source_ids_round_trip() {
        for source in DataSource::ALL {
            assert_eq!(DataSource::from_id(source.id()), Some(source));
        }
        assert_eq!(DataSource::from_id("unknown"), None);
    }
}
