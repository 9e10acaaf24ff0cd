// Puzzle seed acquisition: model-generated candidates, validation and
// repair, and the static fallback pool.

pub mod generator;
pub mod prompts;
pub mod validator;

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

pub use generator::SeedGenerator;
pub use validator::SeedValidator;

use crate::diversity::AvoidHints;
use crate::error::SeedError;
use crate::puzzles::{DataSource, SeriesQuery};

/// Where a seed came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOrigin {
    Generated,
    Fallback,
}

impl SeedOrigin {
    pub fn label(self) -> &'static str {
        match self {
            SeedOrigin::Generated => "generated",
            SeedOrigin::Fallback => "fallback",
        }
    }
}

/// A validated candidate puzzle, ready to fetch data for.
#[derive(Debug, Clone)]
pub struct Seed {
    pub source: DataSource,
    /// Series id for fred/nber, search term for google_trends.
    pub series_key: String,
    pub geo: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub correct_event: String,
    pub acceptable_answers: Vec<String>,
    pub explanation: String,
    /// Exactly four, increasingly revealing; the last names the event.
    pub hints: [String; 4],
    pub origin: SeedOrigin,
}

impl Seed {
    /// Identity of the measured quantity, independent of date range.
    pub fn metric_key(&self) -> String {
        format!("{}:{}", self.source.id(), self.series_key.to_lowercase())
    }

    pub fn to_query(&self) -> SeriesQuery {
        match self.source {
            DataSource::GoogleTrends => SeriesQuery {
                series_id: None,
                search_term: Some(self.series_key.clone()),
                geo: self.geo.clone(),
                start_date: self.start_date,
                end_date: self.end_date,
            },
            DataSource::Fred | DataSource::Nber => SeriesQuery {
                series_id: Some(self.series_key.clone()),
                search_term: None,
                geo: None,
                start_date: self.start_date,
                end_date: self.end_date,
            },
        }
    }
}

/// A seed candidate as parsed from model output or the pool file, before
/// validation. Every field is optional; the validator decides what is
/// required for which source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSeed {
    pub source: Option<String>,
    pub series_id: Option<String>,
    pub search_term: Option<String>,
    pub geo: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub correct_event: Option<String>,
    /// A list, or a bare scalar the validator wraps.
    pub acceptable_answers: Option<Value>,
    pub explanation: Option<String>,
    /// A list of strings when well-formed; anything else is repaired.
    pub hints: Option<Value>,
    pub fred_discovery: Option<String>,
    pub search_text: Option<String>,
    #[serde(alias = "release_id")]
    pub release_id: Option<Value>,
}

/// Static pool of pre-validated seeds, loaded once at startup. Keeps the
/// game playable when generation is unavailable.
#[derive(Debug, Clone, Default)]
pub struct SeedPool {
    seeds: Vec<RawSeed>,
}

impl SeedPool {
    /// Load the pool from a JSON file. A missing or malformed file
    /// yields an empty pool; the error surfaces later as `EmptyPool`
    /// if a fallback is ever needed.
    pub fn load(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not read seed pool");
                return Self::default();
            }
        };
        match Self::from_json_str(&text) {
            Ok(pool) => {
                info!(path = %path.display(), seeds = pool.len(), "seed pool loaded");
                pool
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not parse seed pool");
                Self::default()
            }
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        let seeds: Vec<RawSeed> = serde_json::from_str(text)?;
        Ok(Self { seeds })
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    /// Draw a random entry, preferring ones that do not clash with what
    /// this session has already shown. When every entry clashes, any
    /// entry is fair game: a repeated puzzle beats no puzzle.
    pub fn pick(&self, avoid: &AvoidHints) -> Result<RawSeed, SeedError> {
        if self.seeds.is_empty() {
            return Err(SeedError::EmptyPool);
        }
        let mut rng = rand::thread_rng();
        let preferred: Vec<&RawSeed> = self
            .seeds
            .iter()
            .filter(|raw| raw_seed_allowed(raw, avoid))
            .collect();
        let chosen = match preferred.choose(&mut rng) {
            Some(raw) => (*raw).clone(),
            None => match self.seeds.choose(&mut rng) {
                Some(raw) => raw.clone(),
                None => return Err(SeedError::EmptyPool),
            },
        };
        Ok(chosen)
    }
}

/// Best-effort diversity pre-check on an unvalidated entry. Entries that
/// cannot be judged (bad dates, no key) pass here and get settled by the
/// validator instead.
fn raw_seed_allowed(raw: &RawSeed, avoid: &AvoidHints) -> bool {
    let source = validator::seed_source(raw);
    let key = match source {
        DataSource::GoogleTrends => raw.search_term.as_deref(),
        DataSource::Fred | DataSource::Nber => raw.series_id.as_deref(),
    };
    if let Some(key) = key {
        let metric = format!("{}:{}", source.id(), key.trim().to_lowercase());
        if avoid.metric_keys.contains(&metric) {
            return false;
        }
    }
    let parsed = (
        raw.start_date.as_deref().and_then(|s| s.parse::<NaiveDate>().ok()),
        raw.end_date.as_deref().and_then(|s| s.parse::<NaiveDate>().ok()),
    );
    if let (Some(start), Some(end)) = parsed {
        if avoid
            .intervals
            .iter()
            .any(|&(a, b)| start <= b && a <= end)
        {
            return false;
        }
    }
    true
}
