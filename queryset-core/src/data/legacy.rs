//! Index naming expected by older consumers. Opt-in only.

use super::frame::{FrameError, IndexedFrame};
use crate::domain::LevelOfAnalysis;

/// Rename the index levels to the names legacy readers expect for `loa`.
pub fn with_legacy_index_names(
    mut frame: IndexedFrame,
    loa: &LevelOfAnalysis,
) -> Result<IndexedFrame, FrameError> {
    let (time, unit) = loa.legacy_index_names();
    if frame.index_names() != (time, unit) {
        frame.rename_index(time, unit)?;
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn country_year_names() {
        let df = DataFrame::new(vec![
            Column::new("x".into(), vec![1.0]),
            Column::new("TIME".into(), vec![2000i64]),
            Column::new("UNIT".into(), vec![1i64]),
        ])
        .unwrap();
        let frame = IndexedFrame::new(df, "TIME", "UNIT").unwrap();
        let loa = LevelOfAnalysis::new("country_year").unwrap();
        let renamed = with_legacy_index_names(frame, &loa).unwrap();
        assert_eq!(renamed.index_names(), ("year_id", "country_id"));
    }
}
