//! JSON-backed key-value caches
//!
//! Both caches are flat JSON objects on disk. A missing file loads as an
//! empty cache. Saving goes through a temporary sibling file and a rename so
//! an interrupted write never truncates the previous cache.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Cache persistence errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// I/O error
    #[error("Cache I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file exists but is not the expected JSON object
    #[error("Cache file {} is not valid JSON: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Read a JSON document, or `None` when the file does not exist
pub fn read_json<T: DeserializeOwned>(path: &Path) -> CacheResult<Option<T>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CacheError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&text)
        .map(Some)
        .map_err(|source| CacheError::Json {
            path: path.to_path_buf(),
            source,
        })
}

/// Write a JSON document via temp file + rename
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> CacheResult<()> {
    let io_err = |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let json = serde_json::to_vec(value).map_err(|source| CacheError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, json).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

/// Identifier → raw document, or `None` for a permanent miss
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionCache {
    entries: HashMap<String, Option<String>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from disk; a missing file is an empty cache
    pub fn load(path: &Path) -> CacheResult<Self> {
        let entries: HashMap<String, Option<String>> = read_json(path)?.unwrap_or_default();
        info!("Loaded resolution cache from {:?} ({} entries)", path, entries.len());
        Ok(Self { entries })
    }

    /// Persist to disk with keys in sorted order
    pub fn save(&self, path: &Path) -> CacheResult<()> {
        let sorted: BTreeMap<&String, &Option<String>> = self.entries.iter().collect();
        write_json(path, &sorted)?;
        info!("Saved resolution cache to {:?} ({} entries)", path, self.entries.len());
        Ok(())
    }

    /// `None` if never attempted, `Some(None)` for a recorded miss
    pub fn get(&self, identifier: &str) -> Option<Option<&str>> {
        self.entries.get(identifier).map(|doc| doc.as_deref())
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    pub fn insert(&mut self, identifier: impl Into<String>, document: Option<String>) {
        let identifier = identifier.into();
        debug!("Caching {} ({})", identifier, if document.is_some() { "hit" } else { "miss" });
        self.entries.insert(identifier, document);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of identifiers recorded as absent
    pub fn absent_count(&self) -> usize {
        self.entries.values().filter(|doc| doc.is_none()).count()
    }
}

/// Opaque JSON object carried from load to save unchanged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuxiliaryCache {
    entries: Map<String, Value>,
}

impl AuxiliaryCache {
    pub fn load(path: &Path) -> CacheResult<Self> {
        let entries: Map<String, Value> = read_json(path)?.unwrap_or_default();
        debug!("Loaded auxiliary cache from {:?} ({} entries)", path, entries.len());
        Ok(Self { entries })
    }

    pub fn save(&self, path: &Path) -> CacheResult<()> {
        write_json(path, &self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
