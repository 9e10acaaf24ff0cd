// Seed validation and repair. Raw model output (or a pool entry) comes
// in; a well-formed Seed comes out, with indirect FRED references
// resolved to a concrete series id.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;

use crate::error::SeedError;
use crate::puzzles::DataSource;
use crate::seeds::{RawSeed, Seed, SeedOrigin};
use crate::sources::{FredClient, FredSeriesInfo};

const SEARCH_LIMIT: usize = 50;
const RELEASE_SERIES_LIMIT: usize = 1000;

pub struct SeedValidator {
    fred: Arc<FredClient>,
}

impl SeedValidator {
    pub fn new(fred: Arc<FredClient>) -> Self {
        Self { fred }
    }

    /// Validate and repair one candidate. Missing required fields and
    /// malformed dates are errors; fixable shape problems (scalar
    /// answers, short hints) are repaired in place.
    pub async fn validate(&self, raw: RawSeed, origin: SeedOrigin) -> Result<Seed, SeedError> {
        let source = seed_source(&raw);

        let series_key = match source {
            DataSource::GoogleTrends => {
                required_field(raw.search_term.as_deref(), "searchTerm")?.to_string()
            }
            DataSource::Nber => required_field(raw.series_id.as_deref(), "seriesId")?.to_string(),
            // Resolved below, after the common fields: discovery needs
            // the validated date range.
            DataSource::Fred => String::new(),
        };

        let start_date = parse_date(required_field(raw.start_date.as_deref(), "startDate")?)?;
        let end_date = parse_date(required_field(raw.end_date.as_deref(), "endDate")?)?;
        if start_date > end_date {
            return Err(SeedError::Invalid(format!(
                "startDate {start_date} is after endDate {end_date}"
            )));
        }

        let correct_event = required_field(raw.correct_event.as_deref(), "correctEvent")?.to_string();
        let answers = raw
            .acceptable_answers
            .as_ref()
            .ok_or(SeedError::MissingField("acceptableAnswers"))?;
        let explanation = raw
            .explanation
            .clone()
            .ok_or(SeedError::MissingField("explanation"))?;

        let acceptable_answers = normalize_answers(answers, &correct_event);
        let hints = repair_hints(raw.hints.as_ref(), &explanation, &correct_event);

        let series_key = match source {
            DataSource::Fred => self.resolve_fred_series(&raw, start_date, end_date).await?,
            _ => series_key,
        };

        Ok(Seed {
            source,
            series_key,
            geo: raw.geo,
            start_date,
            end_date,
            correct_event,
            acceptable_answers,
            explanation,
            hints,
            origin,
        })
    }

    /// Turn a FRED seed's reference into a concrete series id: either a
    /// direct id, or a search/release discovery descriptor resolved
    /// against the live catalog.
    async fn resolve_fred_series(
        &self,
        raw: &RawSeed,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<String, SeedError> {
        let discovery = raw
            .fred_discovery
            .as_deref()
            .map(|s| s.trim().to_ascii_lowercase())
            .unwrap_or_default();
        if discovery.is_empty() {
            return Ok(required_field(raw.series_id.as_deref(), "seriesId")?.to_string());
        }
        match discovery.as_str() {
            "search" => {
                let text = required_field(raw.search_text.as_deref(), "searchText")?;
                let candidates = self.fred.search_series(text, SEARCH_LIMIT).await?;
                pick_covering_series(candidates, start, end)
                    .ok_or_else(|| SeedError::NoMatchingSeries(text.to_string()))
            }
            "release" => {
                let release_id = release_id_of(raw).ok_or(SeedError::MissingField("releaseId"))?;
                let candidates = self
                    .fred
                    .release_series(release_id, RELEASE_SERIES_LIMIT)
                    .await?;
                pick_covering_series(candidates, start, end)
                    .ok_or_else(|| SeedError::NoMatchingSeries(format!("release {release_id}")))
            }
            other => Err(SeedError::Invalid(format!("unknown fredDiscovery: {other}"))),
        }
    }
}

/// Declared source of a raw seed; absent or unrecognized means FRED.
pub(crate) fn seed_source(raw: &RawSeed) -> DataSource {
    let source = raw.source.as_deref().map(|s| s.trim().to_ascii_lowercase());
    match source.as_deref() {
        Some("google_trends") => DataSource::GoogleTrends,
        Some("nber") => DataSource::Nber,
        _ => DataSource::Fred,
    }
}

fn required_field<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, SeedError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(SeedError::MissingField(name)),
    }
}

fn parse_date(text: &str) -> Result<NaiveDate, SeedError> {
    text.parse()
        .map_err(|_| SeedError::Invalid(format!("unparseable date: {text}")))
}

/// Scalar answers wrap into a one-element list; numbers stringify (years
/// are common answers). An empty result repairs to the correct event so
/// the answer set is never empty.
fn normalize_answers(value: &Value, correct_event: &str) -> Vec<String> {
    let mut answers: Vec<String> = match value {
        Value::String(s) => vec![s.clone()],
        Value::Number(n) => vec![n.to_string()],
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    answers.retain(|a| !a.trim().is_empty());
    if answers.is_empty() {
        answers.push(correct_event.to_string());
    }
    answers
}

/// Exactly four hints. A well-formed list of four or more is truncated;
/// anything else is replaced by a synthesized ladder ending in the
/// correct event.
fn repair_hints(hints: Option<&Value>, explanation: &str, correct_event: &str) -> [String; 4] {
    if let Some(items) = hints.and_then(Value::as_array) {
        let strings: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
        if strings.len() >= 4 {
            return [
                strings[0].to_string(),
                strings[1].to_string(),
                strings[2].to_string(),
                strings[3].to_string(),
            ];
        }
    }
    let explanation = explanation.trim();
    let second = if explanation.is_empty() {
        "The trend is linked to a well-known historical event."
    } else {
        explanation
    };
    [
        "Think about major economic or global events in this date range.".to_string(),
        second.to_string(),
        "The answer is often abbreviated or has a common short name.".to_string(),
        correct_event.to_string(),
    ]
}

/// Keep series whose declared coverage overlaps the requested window,
/// then take the most popular. Ties break on id so the pick is stable.
fn pick_covering_series(
    mut candidates: Vec<FredSeriesInfo>,
    start: NaiveDate,
    end: NaiveDate,
) -> Option<String> {
    candidates.retain(|info| info.observation_start <= end && start <= info.observation_end);
    candidates.sort_by(|a, b| {
        b.popularity
            .cmp(&a.popularity)
            .then_with(|| a.id.cmp(&b.id))
    });
    candidates.into_iter().next().map(|info| info.id)
}

fn release_id_of(raw: &RawSeed) -> Option<i64> {
    match raw.release_id.as_ref()? {
        Value::Number(n) => {
            let id = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            (id > 0).then_some(id)
        }
        Value::String(s) => {
            let id = s.trim().parse::<i64>().ok()?;
            (id > 0).then_some(id)
        }
        _ => None,
    }
}
