//! Queryset domain: operations, chains, querysets and path resolution.

pub mod chain;
pub mod operation;
pub mod path;
pub mod queryset;

pub use chain::{ChainError, OperationChain};
pub use operation::{Argument, Namespace, Operation};
pub use path::{chain_path, resolve};
pub use queryset::{LevelOfAnalysis, Queryset, QuerysetError, TemporalUnit};
