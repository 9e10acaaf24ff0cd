// FRED puzzle adapter.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::ObservationCache;
use crate::error::PuzzleError;
use crate::puzzles::adapter::{assemble, DataSource, Puzzle, PuzzleAdapter, PuzzleMeta, SeriesQuery};
use crate::puzzles::viz::viz_hints;
use crate::sources::{FredClient, RawObservation};

pub struct FredAdapter {
    client: Arc<FredClient>,
    cache: ObservationCache,
}

impl FredAdapter {
    pub fn new(client: Arc<FredClient>, cache: ObservationCache) -> Self {
        Self { client, cache }
    }
}

#[async_trait]
impl PuzzleAdapter for FredAdapter {
    fn source_id(&self) -> &'static str {
        DataSource::Fred.id()
    }

    async fn fetch_observations(
        &self,
        query: &SeriesQuery,
    ) -> Result<Vec<RawObservation>, PuzzleError> {
        let series_id = query
            .series_id
            .as_deref()
            .ok_or(PuzzleError::MissingParam("seriesId"))?;
        let client = Arc::clone(&self.client);
        let sid = series_id.to_string();
        let (start, end) = (query.start_date, query.end_date);
        let observations = self
            .cache
            .get_or_fetch("fred", series_id, start, end, move || async move {
                client.observations(&sid, start, end).await
            })
            .await?;
        Ok(observations)
    }

    fn build_puzzle(&self, meta: &PuzzleMeta, observations: Vec<RawObservation>) -> Puzzle {
        assemble(meta, observations, viz_hints(DataSource::Fred, meta))
    }
}
