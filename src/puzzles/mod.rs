// Puzzle factory: per-source adapters behind a registry keyed by source id.

pub mod adapter;
pub mod fred;
pub mod nber;
pub mod trends;
pub mod viz;

use std::collections::HashMap;
use std::sync::Arc;

pub use adapter::{
    normalize_series, puzzle_id, ChartType, DataSource, Observation, Puzzle, PuzzleAdapter,
    PuzzleMeta, SeriesQuery,
};
pub use fred::FredAdapter;
pub use nber::NberAdapter;
pub use trends::TrendsAdapter;
pub use viz::{viz_hints, VizHints};

use crate::cache::ObservationCache;
use crate::error::PuzzleError;
use crate::sources::{FredClient, NberClient, TrendsClient};

/// Maps source ids to their adapters. Built once at startup;
/// re-registering a source id overwrites the previous adapter, which is
/// how tests install doubles.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn PuzzleAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the three production adapters sharing one
    /// observation cache.
    pub fn with_default_adapters(
        fred: Arc<FredClient>,
        trends: Arc<TrendsClient>,
        nber: Arc<NberClient>,
        cache: ObservationCache,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(FredAdapter::new(fred, cache.clone())));
        registry.register(Arc::new(TrendsAdapter::new(trends, cache.clone())));
        registry.register(Arc::new(NberAdapter::new(nber, cache)));
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn PuzzleAdapter>) {
        self.adapters
            .insert(adapter.source_id().to_string(), adapter);
    }

    pub fn registered_sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self.adapters.keys().cloned().collect();
        sources.sort();
        sources
    }

    /// Build a full puzzle from metadata: dispatch to the source's
    /// adapter, fetch observations (through the cache), assemble.
    pub async fn build_puzzle(&self, meta: &PuzzleMeta) -> Result<Puzzle, PuzzleError> {
        let adapter = self
            .adapters
            .get(meta.source.id())
            .ok_or_else(|| PuzzleError::UnknownSource(meta.source.id().to_string()))?;
        let data = meta.data.as_ref().ok_or(PuzzleError::MissingData)?;
        let observations = adapter.fetch_observations(data).await?;
        Ok(adapter.build_puzzle(meta, observations))
    }
}
