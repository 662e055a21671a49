//! Queryset Runner — concurrent retrieval, catalog, result cache.
//!
//! This crate builds on `queryset-core` to provide:
//! - A transport seam with a blocking HTTP implementation
//! - Concurrent fan-out of one request per path (FetchOrchestrator)
//! - Queryset retrieval and priming (DataRetriever)
//! - An in-memory queryset catalog loaded from TOML
//! - A parquet result cache with a metadata sidecar
//! - Name-based access through cache and retriever (DataAccessLayer)
//! - TOML + environment configuration

pub mod access;
pub mod cache;
pub mod config;
pub mod fetch;
pub mod retriever;
pub mod store;
pub mod transport;

pub use access::{AccessError, DataAccessLayer};
pub use cache::{CacheError, CacheMeta, CacheStatus, ParquetCache};
pub use config::{ConfigError, RetrievalConfig};
pub use fetch::{FetchControl, FetchError, FetchMode, FetchOrchestrator};
pub use retriever::{DataRetriever, PrimeStatus};
pub use store::{CatalogError, MemoryStore, QuerysetStore};
pub use transport::{HttpTransport, Transport, TransportError};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn fetch_types_are_send_sync() {
        assert_send::<FetchOrchestrator>();
        assert_sync::<FetchOrchestrator>();
        assert_send::<FetchControl>();
        assert_sync::<FetchControl>();
        assert_send::<HttpTransport>();
        assert_sync::<HttpTransport>();
    }

    #[test]
    fn retrieval_types_are_send_sync() {
        assert_send::<DataRetriever>();
        assert_sync::<DataRetriever>();
        assert_send::<DataAccessLayer>();
        assert_sync::<DataAccessLayer>();
        assert_send::<PrimeStatus>();
        assert_sync::<PrimeStatus>();
    }

    #[test]
    fn catalog_and_cache_are_send_sync() {
        assert_send::<MemoryStore>();
        assert_sync::<MemoryStore>();
        assert_send::<ParquetCache>();
        assert_sync::<ParquetCache>();
        assert_send::<RetrievalConfig>();
        assert_sync::<RetrievalConfig>();
    }

    #[test]
    fn error_types_are_send_sync() {
        assert_send::<FetchError>();
        assert_sync::<FetchError>();
        assert_send::<AccessError>();
        assert_sync::<AccessError>();
        assert_send::<CatalogError>();
        assert_sync::<CatalogError>();
    }
}
