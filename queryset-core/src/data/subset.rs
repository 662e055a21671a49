//! Temporal subsetting of indexed datasets.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::frame::{FrameError, IndexedFrame};
use crate::domain::TemporalUnit;

/// Inclusive date range; a missing bound is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Keep only rows whose time index falls inside `range`.
pub fn subset(
    frame: IndexedFrame,
    range: &DateRange,
    unit: TemporalUnit,
) -> Result<IndexedFrame, FrameError> {
    if range.is_unbounded() {
        return Ok(frame);
    }

    let (time, unit_col) = {
        let (t, u) = frame.index_names();
        (t.to_string(), u.to_string())
    };

    let lower = range
        .start
        .map(|d| col(time.as_str()).gt_eq(lit(unit.index_of(d))));
    let upper = range
        .end
        .map(|d| col(time.as_str()).lt_eq(lit(unit.index_of(d))));
    let predicate = match (lower, upper) {
        (Some(l), Some(u)) => l.and(u),
        (Some(l), None) => l,
        (None, Some(u)) => u,
        (None, None) => return Ok(frame),
    };

    let df = frame
        .into_frame()
        .lazy()
        .filter(predicate)
        .collect()
        .map_err(|e| FrameError::Polars(e.to_string()))?;

    IndexedFrame::new(df, time, unit_col)
}
