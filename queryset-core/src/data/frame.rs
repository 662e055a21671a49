//! Two-level indexed datasets and their parquet wire form.
//!
//! A dataset is a polars `DataFrame` where two columns play the role of a
//! (time, unit) index. On the wire the index is stored as ordinary columns:
//! unnamed levels use the reserved `__index_level_N__` names, named levels
//! are the two trailing columns.

use polars::prelude::*;
use std::io::Cursor;
use thiserror::Error;

/// Names a writer gives to unnamed index levels.
pub const DEFAULT_INDEX_NAMES: (&str, &str) = ("__index_level_0__", "__index_level_1__");

/// Names used when no input carries index names at all.
pub const FALLBACK_INDEX_NAMES: (&str, &str) = ("TIME", "UNIT");

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("parquet decode failed: {0}")]
    Decode(String),

    #[error("parquet encode failed: {0}")]
    Encode(String),

    #[error("index column '{0}' not found")]
    MissingIndex(String),

    #[error("a dataset needs two index columns, found {0} columns")]
    TooFewColumns(usize),

    #[error("time and unit index must be different columns, both are '{0}'")]
    SameIndexColumn(String),

    #[error("frame operation failed: {0}")]
    Polars(String),
}

fn polars_err(e: PolarsError) -> FrameError {
    FrameError::Polars(e.to_string())
}

/// A `DataFrame` with a (time, unit) index.
#[derive(Debug, Clone)]
pub struct IndexedFrame {
    df: DataFrame,
    time: String,
    unit: String,
}

impl IndexedFrame {
    pub fn new(
        df: DataFrame,
        time: impl Into<String>,
        unit: impl Into<String>,
    ) -> Result<Self, FrameError> {
        let time = time.into();
        let unit = unit.into();
        if time == unit {
            return Err(FrameError::SameIndexColumn(time));
        }
        for name in [&time, &unit] {
            if df.column(name).is_err() {
                return Err(FrameError::MissingIndex(name.clone()));
            }
        }
        Ok(Self { df, time, unit })
    }

    /// Decode a parquet payload, locating its index columns.
    pub fn from_parquet_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        let df = ParquetReader::new(Cursor::new(bytes.to_vec()))
            .finish()
            .map_err(|e| FrameError::Decode(e.to_string()))?;

        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let (default_time, default_unit) = DEFAULT_INDEX_NAMES;
        if names.iter().any(|n| n == default_time) && names.iter().any(|n| n == default_unit) {
            return Self::new(df, default_time, default_unit);
        }

        match names.as_slice() {
            [.., time, unit] => {
                let (time, unit) = (time.clone(), unit.clone());
                Self::new(df, time, unit)
            }
            _ => Err(FrameError::TooFewColumns(names.len())),
        }
    }

    /// Encode as gzip-compressed parquet: data columns first, then the index.
    pub fn to_parquet_bytes(&self) -> Result<Vec<u8>, FrameError> {
        let mut ordered = self
            .df
            .select(self.wire_column_order())
            .map_err(|e| FrameError::Encode(e.to_string()))?;
        let mut buf = Vec::new();
        ParquetWriter::new(&mut buf)
            .with_compression(ParquetCompression::Gzip(None))
            .finish(&mut ordered)
            .map_err(|e| FrameError::Encode(e.to_string()))?;
        Ok(buf)
    }

    fn wire_column_order(&self) -> Vec<String> {
        let mut order = self.data_columns();
        order.push(self.time.clone());
        order.push(self.unit.clone());
        order
    }

    pub fn index_names(&self) -> (&str, &str) {
        (&self.time, &self.unit)
    }

    /// True when the index levels were written without names.
    pub fn has_default_index_names(&self) -> bool {
        (self.time.as_str(), self.unit.as_str()) == DEFAULT_INDEX_NAMES
    }

    /// Non-index columns in frame order.
    pub fn data_columns(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .filter(|n| *n != self.time && *n != self.unit)
            .collect()
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn into_frame(self) -> DataFrame {
        self.df
    }

    /// Rename the index levels, keeping the data columns untouched.
    pub fn rename_index(&mut self, time: &str, unit: &str) -> Result<(), FrameError> {
        if time == unit {
            return Err(FrameError::SameIndexColumn(time.to_string()));
        }
        let renamed: Vec<String> = self
            .df
            .get_column_names()
            .iter()
            .map(|n| {
                if n.as_str() == self.time {
                    time.to_string()
                } else if n.as_str() == self.unit {
                    unit.to_string()
                } else {
                    n.to_string()
                }
            })
            .collect();
        self.df.set_column_names(renamed).map_err(polars_err)?;
        self.time = time.to_string();
        self.unit = unit.to_string();
        Ok(())
    }

    /// Replace the data column names, in `data_columns()` order.
    pub fn rename_data_columns(&mut self, names: &[String]) -> Result<(), FrameError> {
        let current = self.data_columns();
        if current.len() != names.len() {
            return Err(FrameError::Polars(format!(
                "expected {} column names, got {}",
                current.len(),
                names.len()
            )));
        }
        let mut replacements = names.iter();
        let renamed: Vec<String> = self
            .df
            .get_column_names()
            .iter()
            .map(|n| {
                if n.as_str() == self.time || n.as_str() == self.unit {
                    n.to_string()
                } else {
                    replacements
                        .next()
                        .cloned()
                        .unwrap_or_else(|| n.to_string())
                }
            })
            .collect();
        self.df.set_column_names(renamed).map_err(polars_err)
    }

    /// True when some (time, unit) pair occurs more than once.
    pub fn has_duplicate_index(&self) -> Result<bool, FrameError> {
        let index = self
            .df
            .select([self.time.as_str(), self.unit.as_str()])
            .map_err(polars_err)?;
        Ok(index.is_duplicated().map_err(polars_err)?.any())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(time: &str, unit: &str) -> DataFrame {
        DataFrame::new(vec![
            Column::new("value".into(), vec![1.0, 2.0, 3.0, 4.0]),
            Column::new(time.into(), vec![1i64, 1, 2, 2]),
            Column::new(unit.into(), vec![10i64, 20, 10, 20]),
        ])
        .unwrap()
    }

    #[test]
    fn roundtrip_keeps_named_index() {
        let frame = IndexedFrame::new(grid("month_id", "pg_id"), "month_id", "pg_id").unwrap();
        let bytes = frame.to_parquet_bytes().unwrap();
        let decoded = IndexedFrame::from_parquet_bytes(&bytes).unwrap();
        assert_eq!(decoded.index_names(), ("month_id", "pg_id"));
        assert_eq!(decoded.data_columns(), vec!["value".to_string()]);
        assert_eq!(decoded.height(), 4);
    }

    #[test]
    fn detects_unnamed_index_anywhere() {
        let df = DataFrame::new(vec![
            Column::new("__index_level_0__".into(), vec![1i64, 2]),
            Column::new("__index_level_1__".into(), vec![5i64, 5]),
            Column::new("a".into(), vec![0.0, 0.0]),
        ])
        .unwrap();
        let frame = IndexedFrame::new(df, "__index_level_0__", "__index_level_1__").unwrap();
        let decoded = IndexedFrame::from_parquet_bytes(&frame.to_parquet_bytes().unwrap()).unwrap();
        assert!(decoded.has_default_index_names());
        assert_eq!(decoded.data_columns(), vec!["a".to_string()]);
    }

    #[test]
    fn garbage_fails_to_decode() {
        let result = IndexedFrame::from_parquet_bytes(b"fgsfds");
        assert!(matches!(result, Err(FrameError::Decode(_))));
    }

    #[test]
    fn missing_index_rejected() {
        let result = IndexedFrame::new(grid("t", "u"), "t", "nope");
        assert!(matches!(result, Err(FrameError::MissingIndex(_))));
    }

    #[test]
    fn rename_index_keeps_data() {
        let mut frame = IndexedFrame::new(grid("t", "u"), "t", "u").unwrap();
        frame.rename_index("TIME", "UNIT").unwrap();
        assert_eq!(frame.index_names(), ("TIME", "UNIT"));
        assert_eq!(frame.data_columns(), vec!["value".to_string()]);
        assert!(frame.frame().column("TIME").is_ok());
    }

    #[test]
    fn duplicate_index_detected() {
        let df = DataFrame::new(vec![
            Column::new("t".into(), vec![1i64, 1]),
            Column::new("u".into(), vec![1i64, 1]),
            Column::new("x".into(), vec![0.0, 1.0]),
        ])
        .unwrap();
        let frame = IndexedFrame::new(df, "t", "u").unwrap();
        assert!(frame.has_duplicate_index().unwrap());

        let unique = IndexedFrame::new(grid("t", "u"), "t", "u").unwrap();
        assert!(!unique.has_duplicate_index().unwrap());
    }
}
