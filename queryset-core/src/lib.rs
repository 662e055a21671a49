//! Queryset Core — operation chains, path resolution, response classification, merging.
//!
//! This crate contains the pure parts of queryset retrieval:
//! - Domain types (operations, chains, querysets, levels of analysis)
//! - Path resolution from chains to remote paths
//! - Two-level indexed datasets and their parquet wire form
//! - Dataset merging (index reconciliation, column disambiguation, inner join)
//! - Response classification and outcome aggregation
//!
//! Nothing here performs network I/O; see `queryset-runner` for that.

pub mod data;
pub mod domain;
pub mod retrieval;

pub use data::{DateRange, IndexedFrame, MergeError};
pub use domain::{
    Argument, ChainError, LevelOfAnalysis, Namespace, Operation, OperationChain, Queryset,
};
pub use retrieval::{
    aggregate, classify, ErrorReport, RawResponse, RetrievalError, RetrievalOutcome,
    SourceOutcome,
};
