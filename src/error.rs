// Domain error types. HTTP status mapping lives in the API layer.

use thiserror::Error;

use crate::llm::CompletionError;
use crate::sources::FetchError;

/// Errors from building a puzzle out of metadata and upstream observations.
#[derive(Debug, Error)]
pub enum PuzzleError {
    /// The metadata names a source no adapter is registered for.
    #[error("no adapter registered for source: {0}")]
    UnknownSource(String),

    /// The metadata carries no data payload to fetch with.
    #[error("puzzle metadata has no data payload")]
    MissingData,

    /// A source-specific required parameter is absent.
    #[error("missing required parameter: {0}")]
    MissingParam(&'static str),

    #[error("upstream fetch failed: {0}")]
    Fetch(#[from] FetchError),
}

/// Errors from acquiring and validating a puzzle seed.
#[derive(Debug, Error)]
pub enum SeedError {
    /// Surfaced only for authentication failures; every other completion
    /// failure degrades to the fallback pool instead.
    #[error("completion backend error: {0}")]
    Completion(#[from] CompletionError),

    #[error("seed is missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid seed: {0}")]
    Invalid(String),

    /// Discovery resolution found no series covering the requested range.
    #[error("no series matched \"{0}\" within the requested date range")]
    NoMatchingSeries(String),

    #[error("series discovery failed: {0}")]
    Discovery(#[from] FetchError),

    #[error("fallback seed pool is empty")]
    EmptyPool,
}

impl SeedError {
    /// Errors that abort the build loop instead of burning a retry:
    /// retrying cannot fix a bad credential or an empty pool.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SeedError::Completion(_) | SeedError::EmptyPool)
    }
}

/// Errors from serializing a puzzle chart.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("puzzle has no observations to plot")]
    EmptySeries,

    #[error("puzzle has no plottable values")]
    NoPlottableValues,
}

/// Top-level game orchestration errors.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("no active game")]
    NoActiveGame,

    /// The build loop exhausted its retry budget. Carries the last
    /// underlying failure so the client sees why.
    #[error("could not build a puzzle after {attempts} tries: {last}")]
    Unavailable { attempts: usize, last: String },

    #[error(transparent)]
    Seed(#[from] SeedError),

    #[error(transparent)]
    Puzzle(#[from] PuzzleError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_error_fatality() {
        assert!(SeedError::EmptyPool.is_fatal());
        assert!(
            SeedError::Completion(CompletionError::AuthenticationFailed("bad key".into()))
                .is_fatal()
        );
        assert!(!SeedError::MissingField("correctEvent").is_fatal());
        assert!(!SeedError::NoMatchingSeries("unemployment".into()).is_fatal());
        assert!(!SeedError::Invalid("startDate after endDate".into()).is_fatal());
    }

    #[test]
    fn test_unavailable_message_carries_last_error() {
        let err = GameError::Unavailable {
            attempts: 5,
            last: "upstream returned no data".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("5 tries"));
        assert!(msg.contains("upstream returned no data"));
    }
}
