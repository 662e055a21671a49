//! Parquet result cache with Hive-style partitioning.
//!
//! Layout: `{cache_dir}/queryset={NAME}/data.parquet`
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Integrity validation on load (BLAKE3 hash from the sidecar, decode check)
//! - Quarantine for corrupt files (`data.parquet.quarantined`)
//! - Metadata sidecar per queryset (`meta.json`)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use queryset_core::data::{FrameError, IndexedFrame};

const PARTITION_PREFIX: &str = "queryset=";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O failed: {0}")]
    Io(String),

    #[error("queryset name '{0}' cannot be used as a cache key")]
    InvalidName(String),

    #[error("cached frame could not be encoded: {0}")]
    Frame(#[from] FrameError),

    #[error("cache metadata: {0}")]
    Meta(String),
}

/// Metadata sidecar for a cached queryset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheMeta {
    pub queryset: String,
    pub rows: usize,
    pub columns: usize,
    pub data_hash: String,
    pub cached_at: chrono::NaiveDateTime,
}

/// Cache state of a single queryset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub queryset: String,
    pub cached: bool,
    pub rows: Option<usize>,
    pub columns: Option<usize>,
    pub cached_at: Option<chrono::NaiveDateTime>,
}

/// On-disk cache of merged querysets, one partition per name.
pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    /// Create a cache rooted at `cache_dir`. Nothing is touched until a write.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Root directory holding the `queryset=` partitions.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn queryset_dir(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{PARTITION_PREFIX}{name}"))
    }

    fn data_path(&self, name: &str) -> PathBuf {
        self.queryset_dir(name).join("data.parquet")
    }

    fn meta_path(&self, name: &str) -> PathBuf {
        self.queryset_dir(name).join("meta.json")
    }

    /// Store a merged frame. Replaces whatever was cached under `name`.
    pub fn write(&self, name: &str, frame: &IndexedFrame) -> Result<CacheMeta, CacheError> {
        check_name(name)?;
        let dir = self.queryset_dir(name);
        fs::create_dir_all(&dir)
            .map_err(|e| CacheError::Io(format!("failed to create {}: {e}", dir.display())))?;

        let bytes = frame.to_parquet_bytes()?;
        let meta = CacheMeta {
            queryset: name.to_string(),
            rows: frame.height(),
            columns: frame.data_columns().len(),
            data_hash: blake3::hash(&bytes).to_hex().to_string(),
            cached_at: chrono::Local::now().naive_local(),
        };

        let path = self.data_path(name);
        atomic_write(&path, &bytes)?;

        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| CacheError::Meta(format!("serialization: {e}")))?;
        atomic_write(&self.meta_path(name), meta_json.as_bytes())?;

        debug!(queryset = name, rows = meta.rows, "cached dataset");
        Ok(meta)
    }

    /// Load a cached frame; `None` when nothing usable is cached.
    ///
    /// A file that fails its hash check or does not decode is quarantined.
    pub fn load(&self, name: &str) -> Result<Option<IndexedFrame>, CacheError> {
        check_name(name)?;
        let path = self.data_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let bytes =
            fs::read(&path).map_err(|e| CacheError::Io(format!("read {}: {e}", path.display())))?;

        let verdict = match self.get_meta(name) {
            None => Err("missing metadata sidecar".to_string()),
            Some(meta) if meta.data_hash != blake3::hash(&bytes).to_hex().as_str() => {
                Err("hash mismatch".to_string())
            }
            Some(_) => IndexedFrame::from_parquet_bytes(&bytes).map_err(|e| e.to_string()),
        };

        match verdict {
            Ok(frame) => Ok(Some(frame)),
            Err(reason) => {
                self.quarantine(&path, &reason);
                Ok(None)
            }
        }
    }

    /// Move a corrupt data file aside so the next load treats it as a miss.
    fn quarantine(&self, path: &Path, reason: &str) {
        let target = path.with_extension("parquet.quarantined");
        match fs::rename(path, &target) {
            Ok(()) => warn!(
                path = %path.display(),
                reason,
                "quarantined corrupt cache file"
            ),
            Err(e) => warn!(
                path = %path.display(),
                target = %target.display(),
                reason,
                error = %e,
                "corrupt cache file could not be quarantined"
            ),
        }
    }

    /// Read the metadata sidecar; `None` if absent or unreadable.
    pub fn get_meta(&self, name: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(name)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Cache state for each of `names`, in the order given.
    pub fn status(&self, names: &[String]) -> Vec<CacheStatus> {
        names
            .iter()
            .map(|name| {
                let meta = self.get_meta(name);
                CacheStatus {
                    queryset: name.clone(),
                    cached: meta.is_some() && self.data_path(name).exists(),
                    rows: meta.as_ref().map(|m| m.rows),
                    columns: meta.as_ref().map(|m| m.columns),
                    cached_at: meta.as_ref().map(|m| m.cached_at),
                }
            })
            .collect()
    }

    /// Names of all querysets with a cache partition, sorted.
    pub fn list(&self) -> Result<Vec<String>, CacheError> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.cache_dir)
            .map_err(|e| CacheError::Io(format!("read dir: {e}")))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::Io(format!("dir entry: {e}")))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(name) = entry
                .file_name()
                .to_str()
                .and_then(|n| n.strip_prefix(PARTITION_PREFIX))
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Drop one queryset's partition. Returns whether anything was there.
    pub fn remove(&self, name: &str) -> Result<bool, CacheError> {
        check_name(name)?;
        let dir = self.queryset_dir(name);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)
            .map_err(|e| CacheError::Io(format!("remove {}: {e}", dir.display())))?;
        Ok(true)
    }

    /// Drop every partition. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let names = self.list()?;
        for name in &names {
            self.remove(name)?;
        }
        Ok(names.len())
    }
}

fn check_name(name: &str) -> Result<(), CacheError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if bad {
        return Err(CacheError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes)
        .map_err(|e| CacheError::Io(format!("write {}: {e}", tmp.display())))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        CacheError::Io(format!("atomic rename failed: {e}"))
    })
}
