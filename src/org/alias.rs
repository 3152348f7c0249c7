//! Operator-supplied organization alias table
//!
//! Maps a raw organization name as written in the records to the canonical
//! name used in the graph. Chains are flattened on load so that looking up
//! a canonical name always returns it unchanged.

use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::source::cache::{read_json, CacheError};

/// Alias table errors
#[derive(Error, Debug)]
pub enum AliasError {
    /// The alias file could not be read
    #[error(transparent)]
    Load(#[from] CacheError),

    /// Following aliases from this name never reaches a canonical name
    #[error("Alias cycle involving {0:?}")]
    Cycle(String),
}

pub type AliasResult<T> = Result<T, AliasError>;

/// Read-only raw name → canonical name mapping
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    canonical: HashMap<String, String>,
}

impl AliasTable {
    /// Build from a raw mapping, resolving chains like `A → B → C` to `A → C`
    pub fn new(mapping: HashMap<String, String>) -> AliasResult<Self> {
        let mut canonical = HashMap::with_capacity(mapping.len());

        for raw in mapping.keys() {
            let mut current = raw;
            let mut hops = 0;
            while let Some(next) = mapping.get(current) {
                if next == current {
                    break;
                }
                hops += 1;
                if hops > mapping.len() {
                    return Err(AliasError::Cycle(raw.clone()));
                }
                current = next;
            }
            if current != raw {
                canonical.insert(raw.clone(), current.clone());
            }
        }

        Ok(Self { canonical })
    }

    /// Load a JSON object `{"raw name": "canonical name"}`; missing file = empty table
    pub fn load(path: &Path) -> AliasResult<Self> {
        let mapping: HashMap<String, String> = read_json(path)?.unwrap_or_default();
        let table = Self::new(mapping)?;
        info!("Loaded {} organization aliases from {:?}", table.len(), path);
        Ok(table)
    }

    /// Canonical name for `name`, or `name` itself when it has no alias
    pub fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.canonical.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }
}
