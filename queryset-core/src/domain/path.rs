//! Chain → remote path resolution.
//!
//! `{loa}/{ns}/{name}/{args}/{ns}/{name}/{args}/...`, walked root to tail.
//! Arguments are joined with `_`; an operation without arguments emits `_`.

use super::chain::OperationChain;
use super::queryset::LevelOfAnalysis;

/// The chain part of a path, without the level-of-analysis prefix.
pub fn chain_path(chain: &OperationChain) -> String {
    chain
        .operations()
        .iter()
        .map(|op| op.path_segment())
        .collect::<Vec<_>>()
        .join("/")
}

/// Full remote path for a chain under a level of analysis.
pub fn resolve(chain: &OperationChain, loa: &LevelOfAnalysis) -> String {
    format!("{}/{}", loa.as_str(), chain_path(chain))
}
