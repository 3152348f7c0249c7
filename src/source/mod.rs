//! Record retrieval
//!
//! Resolves an ORCID identifier to the raw XML of its summary. Records are
//! looked up in a pre-extracted directory tree first, then extracted from the
//! bulk archive. Every outcome, including "not found", is cached so an
//! identifier is resolved at most once per cache lifetime.

pub mod archive;
pub mod cache;

pub use archive::{ArchiveExtractor, UnzipExtractor};
pub use cache::{AuxiliaryCache, CacheError, CacheResult, ResolutionCache};

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Record source errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// A record file exists but could not be read
    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A record file is not UTF-8
    #[error("Record {} is not valid UTF-8", .0.display())]
    Encoding(PathBuf),

    /// The extraction tool exited unsuccessfully
    #[error("Extraction of {entry} failed (exit status {status:?}): {diagnostic}")]
    Extraction {
        entry: String,
        status: Option<i32>,
        diagnostic: String,
    },

    /// The extraction tool did not finish in time
    #[error("Extraction of {entry} timed out after {timeout:?}")]
    Timeout {
        entry: String,
        timeout: Duration,
    },

    /// The extraction tool could not be started
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Cache persistence error
    #[error(transparent)]
    Cache(#[from] CacheError),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Last `len` characters of the identifier (the whole identifier if shorter)
pub fn shard_key(identifier: &str, len: usize) -> &str {
    let count = identifier.chars().count();
    if count <= len {
        return identifier;
    }
    let start = identifier
        .char_indices()
        .nth(count - len)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &identifier[start..]
}

/// Where records live: `<shard>/<identifier>.xml`
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    /// Pre-extracted summaries directory
    pub records_dir: Option<PathBuf>,
    /// Directory prefix of the entries inside the archive
    pub archive_prefix: String,
    /// Length of the shard key
    pub shard_len: usize,
}

impl Default for ArchiveLayout {
    fn default() -> Self {
        Self {
            records_dir: None,
            archive_prefix: "summaries".to_string(),
            shard_len: 3,
        }
    }
}

impl ArchiveLayout {
    pub fn relative_path(&self, identifier: &str) -> String {
        format!("{}/{}.xml", shard_key(identifier, self.shard_len), identifier)
    }

    /// Path in the loose directory tree, if one is configured
    pub fn loose_path(&self, identifier: &str) -> Option<PathBuf> {
        self.records_dir
            .as_ref()
            .map(|dir| dir.join(self.relative_path(identifier)))
    }

    /// Entry name inside the archive
    pub fn archive_entry(&self, identifier: &str) -> String {
        let prefix = self.archive_prefix.trim_matches('/');
        if prefix.is_empty() {
            self.relative_path(identifier)
        } else {
            format!("{}/{}", prefix, self.relative_path(identifier))
        }
    }
}

/// Resolves identifiers to raw XML, caching every outcome
pub struct RecordSource {
    layout: ArchiveLayout,
    extractor: Option<Box<dyn ArchiveExtractor>>,
    cache: ResolutionCache,
}

impl RecordSource {
    pub fn new(layout: ArchiveLayout, cache: ResolutionCache) -> Self {
        Self {
            layout,
            extractor: None,
            cache,
        }
    }

    /// Fall back to this extractor when the loose tree has no record
    pub fn with_extractor(mut self, extractor: impl ArchiveExtractor + 'static) -> Self {
        self.extractor = Some(Box::new(extractor));
        self
    }

    pub fn layout(&self) -> &ArchiveLayout {
        &self.layout
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    /// Resolve an identifier to its XML document.
    ///
    /// Returns `Ok(None)` for a missing record. Misses are cached and never
    /// retried while the cache lives, including after a save and reload.
    pub async fn resolve(&mut self, identifier: &str) -> SourceResult<Option<&str>> {
        if self.cache.contains(identifier) {
            debug!("Resolution cache hit for {}", identifier);
        } else {
            let document = self.fetch(identifier).await?;
            self.cache.insert(identifier, document);
        }

        Ok(self.cache.get(identifier).flatten())
    }

    async fn fetch(&self, identifier: &str) -> SourceResult<Option<String>> {
        if let Some(path) = self.layout.loose_path(identifier) {
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    debug!("Read {} from {:?}", identifier, path);
                    return String::from_utf8(bytes)
                        .map(Some)
                        .map_err(|_| SourceError::Encoding(path));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(SourceError::Io { path, source }),
            }
        }

        let Some(extractor) = self.extractor.as_ref() else {
            debug!("No record for {} and no archive configured", identifier);
            return Ok(None);
        };

        let entry = self.layout.archive_entry(identifier);
        match extractor.extract(&entry).await {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(document) => {
                    debug!("Extracted {} from archive", entry);
                    Ok(Some(document))
                }
                Err(_) => {
                    warn!("Archive entry {} is not valid UTF-8, treating as missing", entry);
                    Ok(None)
                }
            },
            Err(e) => {
                warn!("No record for {}: {}", identifier, e);
                Ok(None)
            }
        }
    }
}
