//! Merge several indexed datasets into one.
//!
//! Three steps, in order:
//! 1. Index reconciliation: every input gets the same index names.
//! 2. Column disambiguation: colliding column names get `_` prepended.
//! 3. Inner join on (time, unit).

use polars::prelude::*;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

use super::frame::{FrameError, IndexedFrame, FALLBACK_INDEX_NAMES};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("nothing to merge")]
    NoInputs,

    #[error("dataset {position} has duplicate (time, unit) index values")]
    DuplicateIndex { position: usize },

    #[error("datasets cannot be joined: {0}")]
    Incompatible(String),
}

impl From<FrameError> for MergeError {
    fn from(e: FrameError) -> Self {
        MergeError::Incompatible(e.to_string())
    }
}

/// Merge datasets: reconcile index names, disambiguate columns, inner join.
pub fn merge(mut frames: Vec<IndexedFrame>) -> Result<IndexedFrame, MergeError> {
    if frames.is_empty() {
        return Err(MergeError::NoInputs);
    }
    reconcile_index_names(&mut frames)?;
    disambiguate_columns(&mut frames)?;
    inner_join(frames)
}

/// Force every frame onto the first non-default index names seen.
///
/// Falls back to `("TIME", "UNIT")` when no frame has named index levels.
pub fn reconcile_index_names(frames: &mut [IndexedFrame]) -> Result<(String, String), MergeError> {
    let chosen = frames
        .iter()
        .find(|f| !f.has_default_index_names())
        .map(|f| {
            let (t, u) = f.index_names();
            (t.to_string(), u.to_string())
        });

    let (time, unit) = match chosen {
        Some(names) => names,
        None => {
            warn!("no index names found in datasets, using fallback");
            let (t, u) = FALLBACK_INDEX_NAMES;
            (t.to_string(), u.to_string())
        }
    };

    for frame in frames.iter_mut() {
        if frame.index_names() != (time.as_str(), unit.as_str()) {
            frame.rename_index(&time, &unit)?;
        }
    }
    Ok((time, unit))
}

/// Make a list of names unique, keeping first occurrences unchanged.
///
/// Later duplicates get `_` prepended until they no longer collide.
pub fn distinct_names(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let unique = distinguish(&seen, name);
        seen.insert(unique.clone());
        out.push(unique);
    }
    out
}

fn distinguish(seen: &HashSet<String>, name: &str) -> String {
    let mut candidate = name.to_string();
    while seen.contains(&candidate) {
        candidate.insert(0, '_');
    }
    candidate
}

/// Rename data columns so that no name repeats across all frames.
pub fn disambiguate_columns(frames: &mut [IndexedFrame]) -> Result<(), MergeError> {
    let mut seen: HashSet<String> = HashSet::new();
    for frame in frames.iter_mut() {
        let original = frame.data_columns();
        let renamed: Vec<String> = original
            .iter()
            .map(|name| {
                let unique = distinguish(&seen, name);
                seen.insert(unique.clone());
                unique
            })
            .collect();
        if renamed != original {
            debug!(?original, ?renamed, "renamed colliding columns");
            frame.rename_data_columns(&renamed)?;
        }
    }
    Ok(())
}

/// Inner join on the shared (time, unit) index.
///
/// Expects reconciled index names and disambiguated columns. Output columns
/// follow input order; rows are sorted by (time, unit).
pub fn inner_join(frames: Vec<IndexedFrame>) -> Result<IndexedFrame, MergeError> {
    let first = frames.first().ok_or(MergeError::NoInputs)?;
    let (time, unit) = {
        let (t, u) = first.index_names();
        (t.to_string(), u.to_string())
    };

    for (position, frame) in frames.iter().enumerate() {
        if frame.index_names() != (time.as_str(), unit.as_str()) {
            return Err(MergeError::Incompatible(format!(
                "dataset {position} has index {:?}, expected ({time}, {unit})",
                frame.index_names()
            )));
        }
        if frame.has_duplicate_index()? {
            return Err(MergeError::DuplicateIndex { position });
        }
    }

    let mut order: Vec<Expr> = frames
        .iter()
        .flat_map(|f| f.data_columns())
        .map(|name| col(name.as_str()))
        .collect();
    order.push(col(time.as_str()));
    order.push(col(unit.as_str()));

    let keys = [col(time.as_str()), col(unit.as_str())];
    let mut frames = frames.into_iter();
    let mut joined = match frames.next() {
        Some(f) => f.into_frame().lazy(),
        None => return Err(MergeError::NoInputs),
    };
    for frame in frames {
        joined = joined.join(
            frame.into_frame().lazy(),
            keys.clone(),
            keys.clone(),
            JoinArgs::new(JoinType::Inner),
        );
    }

    let df = joined
        .select(order)
        .sort_by_exprs(keys, SortMultipleOptions::default())
        .collect()
        .map_err(|e| MergeError::Incompatible(e.to_string()))?;

    Ok(IndexedFrame::new(df, time, unit)?)
}
