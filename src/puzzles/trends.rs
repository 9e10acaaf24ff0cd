// Search-interest puzzle adapter.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::ObservationCache;
use crate::error::PuzzleError;
use crate::puzzles::adapter::{assemble, DataSource, Puzzle, PuzzleAdapter, PuzzleMeta, SeriesQuery};
use crate::puzzles::viz::viz_hints;
use crate::sources::{RawObservation, TrendsClient};

pub struct TrendsAdapter {
    client: Arc<TrendsClient>,
    cache: ObservationCache,
}

impl TrendsAdapter {
    pub fn new(client: Arc<TrendsClient>, cache: ObservationCache) -> Self {
        Self { client, cache }
    }
}

#[async_trait]
impl PuzzleAdapter for TrendsAdapter {
    fn source_id(&self) -> &'static str {
        DataSource::GoogleTrends.id()
    }

    async fn fetch_observations(
        &self,
        query: &SeriesQuery,
    ) -> Result<Vec<RawObservation>, PuzzleError> {
        let keyword = query
            .search_term
            .as_deref()
            .ok_or(PuzzleError::MissingParam("searchTerm"))?;
        let client = Arc::clone(&self.client);
        let kw = keyword.to_string();
        let geo = query.geo.clone();
        let (start, end) = (query.start_date, query.end_date);
        let observations = self
            .cache
            .get_or_fetch("google_trends", keyword, start, end, move || async move {
                client
                    .interest_over_time(&kw, start, end, geo.as_deref())
                    .await
            })
            .await?;
        Ok(observations)
    }

    fn build_puzzle(&self, meta: &PuzzleMeta, observations: Vec<RawObservation>) -> Puzzle {
        assemble(meta, observations, viz_hints(DataSource::GoogleTrends, meta))
    }
}
