//! Queryset catalog: a store trait, an in-memory store, and TOML loading.
//!
//! Catalog file format:
//!
//! ```toml
//! [[queryset]]
//! name = "fatalities"
//! loa = "country_month"
//! themes = ["conflict"]
//! pipelines = ["base country_month.ged_best_sb | trf ops.ln"]
//!
//! [[queryset]]
//! name = "population"
//! loa = "country_year"
//! operations = [
//!   [{ namespace = "base", name = "country_year.wdi_sp_pop_totl" }],
//! ]
//! ```
//!
//! `operations` lists chains root first; `pipelines` uses the data-flow
//! notation. An entry uses one or the other.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use tracing::info;

use queryset_core::domain::{LevelOfAnalysis, OperationChain, Queryset};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse catalog: {0}")]
    Parse(String),

    #[error("invalid queryset '{name}': {reason}")]
    Invalid { name: String, reason: String },

    #[error("queryset '{0}' is defined more than once")]
    Duplicate(String),
}

/// Where querysets live. Everything stored has already been validated.
pub trait QuerysetStore: Send + Sync {
    fn get(&self, name: &str) -> Option<Queryset>;

    /// Names of all stored querysets, sorted.
    fn list(&self) -> Vec<String>;

    /// Insert or replace; returns the replaced queryset.
    fn put(&self, queryset: Queryset) -> Result<Option<Queryset>, CatalogError>;

    fn remove(&self, name: &str) -> Option<Queryset>;

    fn by_theme(&self, theme: &str) -> Vec<Queryset>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    querysets: RwLock<BTreeMap<String, Queryset>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let store = Self::from_toml(&content)?;
        info!(path = %path.display(), querysets = store.len(), "loaded catalog");
        Ok(store)
    }

    pub fn from_toml(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            toml::from_str(content).map_err(|e| CatalogError::Parse(e.to_string()))?;

        let mut querysets = BTreeMap::new();
        for entry in file.queryset {
            let queryset = entry.into_queryset()?;
            if querysets.contains_key(&queryset.name) {
                return Err(CatalogError::Duplicate(queryset.name));
            }
            querysets.insert(queryset.name.clone(), queryset);
        }
        Ok(Self {
            querysets: RwLock::new(querysets),
        })
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Queryset>> {
        self.querysets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Queryset>> {
        self.querysets.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl QuerysetStore for MemoryStore {
    fn get(&self, name: &str) -> Option<Queryset> {
        self.read().get(name).cloned()
    }

    fn list(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    fn put(&self, queryset: Queryset) -> Result<Option<Queryset>, CatalogError> {
        queryset.validate().map_err(|e| CatalogError::Invalid {
            name: queryset.name.clone(),
            reason: e.to_string(),
        })?;
        Ok(self.write().insert(queryset.name.clone(), queryset))
    }

    fn remove(&self, name: &str) -> Option<Queryset> {
        self.write().remove(name)
    }

    fn by_theme(&self, theme: &str) -> Vec<Queryset> {
        self.read()
            .values()
            .filter(|qs| qs.has_theme(theme))
            .cloned()
            .collect()
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    queryset: Vec<CatalogEntry>,
}

#[derive(Deserialize)]
struct CatalogEntry {
    name: String,
    loa: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    themes: Vec<String>,
    #[serde(default)]
    operations: Vec<OperationChain>,
    #[serde(default)]
    pipelines: Vec<String>,
}

impl CatalogEntry {
    fn into_queryset(self) -> Result<Queryset, CatalogError> {
        let invalid = |reason: String| CatalogError::Invalid {
            name: self.name.clone(),
            reason,
        };

        if !self.operations.is_empty() && !self.pipelines.is_empty() {
            return Err(invalid("use either operations or pipelines, not both".into()));
        }

        let loa = LevelOfAnalysis::new(self.loa.as_str()).map_err(|e| invalid(e.to_string()))?;
        let chains = if self.pipelines.is_empty() {
            self.operations.clone()
        } else {
            self.pipelines
                .iter()
                .map(|p| OperationChain::from_pipeline(p))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| invalid(e.to_string()))?
        };

        Ok(Queryset::new(self.name.clone(), loa, chains)
            .map_err(|e| invalid(e.to_string()))?
            .with_description(self.description.clone())
            .with_themes(self.themes.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
        [[queryset]]
        name = "fatalities"
        loa = "country_month"
        themes = ["conflict"]
        pipelines = ["base country_month.ged_best_sb | trf temporal.tlag 1"]

        [[queryset]]
        name = "population"
        loa = "country_year"
        themes = ["demography"]
        operations = [
          [{ namespace = "base", name = "country_year.wdi_sp_pop_totl" }],
        ]
    "#;

    #[test]
    fn loads_both_chain_notations() {
        let store = MemoryStore::from_toml(CATALOG).unwrap();
        assert_eq!(store.list(), vec!["fatalities", "population"]);

        let fatalities = store.get("fatalities").unwrap();
        assert_eq!(
            fatalities.paths(),
            vec!["country_month/trf/temporal.tlag/1/base/country_month.ged_best_sb/_"]
        );
        let population = store.get("population").unwrap();
        assert_eq!(
            population.paths(),
            vec!["country_year/base/country_year.wdi_sp_pop_totl/_"]
        );
    }

    #[test]
    fn invalid_chain_is_never_stored() {
        let bad = r#"
            [[queryset]]
            name = "broken"
            loa = "country_month"
            pipelines = ["trf temporal.tlag 1 | base country_month.ged_best_sb"]
        "#;
        assert!(matches!(
            MemoryStore::from_toml(bad),
            Err(CatalogError::Invalid { name, .. }) if name == "broken"
        ));
    }

    #[test]
    fn duplicates_are_rejected() {
        let dup = r#"
            [[queryset]]
            name = "a"
            loa = "country_month"
            pipelines = ["base x"]

            [[queryset]]
            name = "a"
            loa = "country_month"
            pipelines = ["base y"]
        "#;
        assert!(matches!(MemoryStore::from_toml(dup), Err(CatalogError::Duplicate(n)) if n == "a"));
    }

    #[test]
    fn put_remove_and_themes() {
        let store = MemoryStore::from_toml(CATALOG).unwrap();
        assert_eq!(store.by_theme("conflict").len(), 1);
        assert!(store.by_theme("weather").is_empty());

        let replaced = store.remove("population").unwrap();
        assert_eq!(replaced.name, "population");
        assert!(store.get("population").is_none());

        assert!(store.put(replaced).unwrap().is_none());
        let again = store.get("population").unwrap();
        assert!(store.put(again).unwrap().is_some());
        assert_eq!(store.len(), 2);
    }
}
