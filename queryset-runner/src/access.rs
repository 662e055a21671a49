//! Queryset name → dataset, through the result cache when possible.
//!
//! Fallback policy:
//! 1. Unknown queryset → fail
//! 2. No date range and a valid cache entry → use it
//! 3. Otherwise retrieve, and cache Ready results of unranged requests

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use queryset_core::data::DateRange;
use queryset_core::retrieval::RetrievalOutcome;

use crate::cache::{CacheError, ParquetCache};
use crate::fetch::{FetchControl, FetchError};
use crate::retriever::{DataRetriever, PrimeStatus};
use crate::store::QuerysetStore;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("queryset '{0}' does not exist")]
    UnknownQueryset(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Name-based entry point over the catalog, the retriever and the cache.
pub struct DataAccessLayer {
    store: Arc<dyn QuerysetStore>,
    retriever: DataRetriever,
    cache: Option<ParquetCache>,
}

impl DataAccessLayer {
    /// Access layer without a cache; every fetch goes to the remote.
    pub fn new(store: Arc<dyn QuerysetStore>, retriever: DataRetriever) -> Self {
        Self {
            store,
            retriever,
            cache: None,
        }
    }

    /// Serve and populate unranged requests through `cache`.
    pub fn with_cache(mut self, cache: ParquetCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The catalog querysets are looked up in.
    pub fn store(&self) -> &dyn QuerysetStore {
        self.store.as_ref()
    }

    /// The result cache, if one is configured.
    pub fn cache(&self) -> Option<&ParquetCache> {
        self.cache.as_ref()
    }

    /// Dataset for the named queryset, restricted to `range`.
    pub fn fetch(
        &self,
        name: &str,
        range: &DateRange,
        control: &FetchControl,
    ) -> Result<RetrievalOutcome, AccessError> {
        let queryset = self
            .store
            .get(name)
            .ok_or_else(|| AccessError::UnknownQueryset(name.to_string()))?;

        let cache = self.cache.as_ref().filter(|_| range.is_unbounded());

        if let Some(cache) = cache {
            match cache.load(name) {
                Ok(Some(frame)) => {
                    info!(queryset = name, rows = frame.height(), "served from cache");
                    return Ok(RetrievalOutcome::Ready(frame));
                }
                Ok(None) => {}
                Err(e) => warn!(queryset = name, error = %e, "cache lookup failed"),
            }
        }

        let outcome = self.retriever.retrieve(&queryset, range, control)?;

        if let (Some(cache), RetrievalOutcome::Ready(frame)) = (cache, &outcome) {
            if let Err(e) = cache.write(name, frame) {
                warn!(queryset = name, error = %e, "failed to cache dataset");
            }
        }
        Ok(outcome)
    }

    /// Ask the remote to materialize the named queryset's columns.
    pub fn prime(&self, name: &str, control: &FetchControl) -> Result<PrimeStatus, AccessError> {
        let queryset = self
            .store
            .get(name)
            .ok_or_else(|| AccessError::UnknownQueryset(name.to_string()))?;
        Ok(self.retriever.prime(&queryset, control)?)
    }
}
