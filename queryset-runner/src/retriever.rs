//! Queryset → retrieval outcome.
//!
//! Resolve every chain to a path, fetch the batch, classify each response,
//! subset ready datasets to the requested dates, then aggregate.

use std::sync::Arc;
use tracing::info;

use queryset_core::data::{subset, with_legacy_index_names, DateRange, MergeError};
use queryset_core::domain::Queryset;
use queryset_core::retrieval::{
    aggregate, classify, ErrorReport, RetrievalError, RetrievalOutcome, SourceOutcome,
    PENDING_STATUS,
};

use crate::config::RetrievalConfig;
use crate::fetch::{FetchControl, FetchError, FetchMode, FetchOrchestrator};
use crate::transport::{HttpTransport, TransportError};

/// Result of asking the remote to materialize a queryset's columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimeStatus {
    Ready,
    Pending { paths: Vec<String> },
    Failed(ErrorReport),
}

/// Turns a queryset into one merged dataset or an aggregate failure.
pub struct DataRetriever {
    fetcher: FetchOrchestrator,
    legacy_index_names: bool,
}

impl DataRetriever {
    /// Retriever over `fetcher`, keeping the index names the sources send.
    pub fn new(fetcher: FetchOrchestrator) -> Self {
        Self {
            fetcher,
            legacy_index_names: false,
        }
    }

    /// HTTP retriever with the pool size and index naming from `config`.
    pub fn from_config(config: &RetrievalConfig) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(&config.user_agent)?;
        let fetcher = FetchOrchestrator::new(Arc::new(transport), config.source_url.clone())
            .with_max_in_flight(config.max_in_flight);
        Ok(Self::new(fetcher).with_legacy_index_names(config.legacy_index_names))
    }

    /// Rename the merged index to the loa's legacy names when `enabled`.
    pub fn with_legacy_index_names(mut self, enabled: bool) -> Self {
        self.legacy_index_names = enabled;
        self
    }

    /// The orchestrator this retriever fetches through.
    pub fn fetcher(&self) -> &FetchOrchestrator {
        &self.fetcher
    }

    /// Fetch every chain of `queryset` and merge the ready columns.
    ///
    /// Pending and failed sources are reported inside `Ok`; only a
    /// cancelled or expired batch is an `Err`.
    pub fn retrieve(
        &self,
        queryset: &Queryset,
        range: &DateRange,
        control: &FetchControl,
    ) -> Result<RetrievalOutcome, FetchError> {
        let paths = queryset.paths();
        info!(
            queryset = %queryset.name,
            loa = queryset.loa.as_str(),
            sources = paths.len(),
            "retrieving queryset"
        );

        let responses = self.fetcher.fetch_all(&paths, FetchMode::Data, control)?;
        let unit = queryset.loa.temporal_unit();

        let outcomes = paths
            .iter()
            .zip(responses)
            .map(|(path, raw)| match classify(path, raw) {
                SourceOutcome::Ready { path, frame } => match subset(frame, range, unit) {
                    Ok(frame) => SourceOutcome::Ready { path, frame },
                    Err(e) => SourceOutcome::Failed(RetrievalError::Subset {
                        path,
                        reason: e.to_string(),
                    }),
                },
                other => other,
            })
            .collect();

        let outcome = match aggregate(outcomes) {
            RetrievalOutcome::Ready(frame) if self.legacy_index_names => {
                match with_legacy_index_names(frame, &queryset.loa) {
                    Ok(frame) => RetrievalOutcome::Ready(frame),
                    Err(e) => RetrievalOutcome::Failed(ErrorReport::new(vec![
                        RetrievalError::Merge(MergeError::Incompatible(e.to_string())),
                    ])),
                }
            }
            other => other,
        };

        info!(
            queryset = %queryset.name,
            status = outcome.status(),
            "retrieval finished"
        );
        Ok(outcome)
    }

    /// Touch every path so the remote starts materializing it.
    pub fn prime(
        &self,
        queryset: &Queryset,
        control: &FetchControl,
    ) -> Result<PrimeStatus, FetchError> {
        let paths = queryset.paths();
        info!(queryset = %queryset.name, sources = paths.len(), "priming queryset");

        let responses = self.fetcher.fetch_all(&paths, FetchMode::Touch, control)?;

        let mut pending = Vec::new();
        let mut errors = Vec::new();
        for (path, raw) in paths.into_iter().zip(responses) {
            match raw.status {
                200 => {}
                PENDING_STATUS => pending.push(path),
                status => errors.push(RetrievalError::transport(path, status, &raw.body)),
            }
        }

        Ok(if !errors.is_empty() {
            PrimeStatus::Failed(ErrorReport::new(errors))
        } else if !pending.is_empty() {
            PrimeStatus::Pending { paths: pending }
        } else {
            PrimeStatus::Ready
        })
    }
}
