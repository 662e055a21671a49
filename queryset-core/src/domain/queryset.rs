use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::chain::OperationChain;
use super::path;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuerysetError {
    #[error("queryset name must not be empty")]
    EmptyName,

    #[error("level of analysis must not be empty")]
    EmptyLevelOfAnalysis,

    #[error("queryset '{0}' has no operation chains")]
    NoChains(String),
}

/// Granularity of the time index for a level of analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalUnit {
    Month,
    Year,
}

/// First month of the month-id calendar (month id 1).
const MONTH_ID_ORIGIN_YEAR: i32 = 1980;

impl TemporalUnit {
    /// Time index value for a calendar date.
    ///
    /// Month ids count from 1980-01 = 1; year ids are the calendar year.
    pub fn index_of(&self, date: NaiveDate) -> i64 {
        match self {
            TemporalUnit::Month => {
                (date.year() - MONTH_ID_ORIGIN_YEAR) as i64 * 12 + date.month() as i64
            }
            TemporalUnit::Year => date.year() as i64,
        }
    }
}

/// Spatial/temporal granularity tag prefixing every resolved path,
/// e.g. `priogrid_month` or `country_year`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LevelOfAnalysis(String);

impl LevelOfAnalysis {
    pub fn new(tag: impl Into<String>) -> Result<Self, QuerysetError> {
        let tag = tag.into();
        if tag.trim().is_empty() {
            return Err(QuerysetError::EmptyLevelOfAnalysis);
        }
        Ok(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn temporal_unit(&self) -> TemporalUnit {
        if self.0.to_lowercase().ends_with("_year") {
            TemporalUnit::Year
        } else {
            TemporalUnit::Month
        }
    }

    /// Index names that older consumers expect for this level of analysis.
    pub fn legacy_index_names(&self) -> (&'static str, &'static str) {
        match self.0.to_lowercase().as_str() {
            "priogrid_month" => ("month_id", "pg_id"),
            "country_month" => ("month_id", "country_id"),
            "country_year" => ("year_id", "country_id"),
            _ => ("time", "unit"),
        }
    }
}

impl TryFrom<String> for LevelOfAnalysis {
    type Error = QuerysetError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<LevelOfAnalysis> for String {
    fn from(loa: LevelOfAnalysis) -> Self {
        loa.0
    }
}

impl fmt::Display for LevelOfAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named, ordered collection of operation chains.
///
/// Chain order is significant: it is the column order of the merged dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQueryset")]
pub struct Queryset {
    pub name: String,
    pub loa: LevelOfAnalysis,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub themes: Vec<String>,
    pub operations: Vec<OperationChain>,
}

/// Serde input for `Queryset`, checked by `validate` before use.
#[derive(Deserialize)]
struct RawQueryset {
    name: String,
    loa: LevelOfAnalysis,
    #[serde(default)]
    description: String,
    #[serde(default)]
    themes: Vec<String>,
    operations: Vec<OperationChain>,
}

impl TryFrom<RawQueryset> for Queryset {
    type Error = QuerysetError;

    fn try_from(raw: RawQueryset) -> Result<Self, Self::Error> {
        Ok(Self::new(raw.name, raw.loa, raw.operations)?
            .with_description(raw.description)
            .with_themes(raw.themes))
    }
}

impl Queryset {
    pub fn new(
        name: impl Into<String>,
        loa: LevelOfAnalysis,
        operations: Vec<OperationChain>,
    ) -> Result<Self, QuerysetError> {
        let qs = Self {
            name: name.into(),
            loa,
            description: String::new(),
            themes: Vec::new(),
            operations,
        };
        qs.validate()?;
        Ok(qs)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_themes(mut self, themes: Vec<String>) -> Self {
        self.themes = themes;
        self
    }

    /// Chains validate themselves on construction; this checks the rest.
    pub fn validate(&self) -> Result<(), QuerysetError> {
        if self.name.trim().is_empty() {
            return Err(QuerysetError::EmptyName);
        }
        if self.operations.is_empty() {
            return Err(QuerysetError::NoChains(self.name.clone()));
        }
        Ok(())
    }

    /// One resolved remote path per chain, in chain order.
    pub fn paths(&self) -> Vec<String> {
        self.operations
            .iter()
            .map(|chain| path::resolve(chain, &self.loa))
            .collect()
    }

    pub fn has_theme(&self, theme: &str) -> bool {
        self.themes.iter().any(|t| t == theme)
    }
}
