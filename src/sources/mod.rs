// Upstream data source clients: FRED, search interest, NBER macrohistory.

pub mod fred;
pub mod nber;
pub mod trends;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use fred::{FredClient, FredRelease, FredSeriesInfo};
pub use nber::NberClient;
pub use trends::TrendsClient;

/// One observation as upstream APIs report it, before numeric
/// normalization. Missing values arrive as `"."`, `"NA"` or empty strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub date: String,
    pub value: String,
}

impl RawObservation {
    pub fn new(date: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            value: value.into(),
        }
    }
}

/// Errors from talking to an upstream data API.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no API key configured for {0}")]
    MissingApiKey(&'static str),

    #[error("authentication rejected by upstream: {0}")]
    Auth(String),

    #[error("upstream rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("could not parse upstream response: {0}")]
    Parse(String),

    #[error("upstream returned no data")]
    NoData,
}

impl FetchError {
    /// Classify an HTTP error status from an upstream API.
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => FetchError::Auth(body),
            429 => FetchError::RateLimited(body),
            code => FetchError::Status { status: code, body },
        }
    }
}
