//! Pipeline configuration
//!
//! Loaded from YAML. Every field has a default, so a file only needs to name
//! what differs from the stock ORCID layout.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::source::ArchiveLayout;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Cannot read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid YAML for this schema
    #[error("Invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Values are individually fine but do not make a usable pipeline
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// What to do when the graph store rejects a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the export pass and report the error
    #[default]
    Abort,
    /// Log the failure and carry on with the next record
    Continue,
}

/// Graph store connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Base URL of the store
    pub url: String,
    /// Path of the transactional commit endpoint
    pub commit_path: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:7474".to_string(),
            commit_path: affiliation_graph_client::DEFAULT_COMMIT_PATH.to_string(),
            timeout_secs: 30,
        }
    }
}

impl GraphConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// ORCID identifiers to process, one per line (commas also separate)
    pub identifier_list: PathBuf,
    /// Pre-extracted summaries directory
    pub records_dir: Option<PathBuf>,
    /// Bulk summaries archive
    pub archive: Option<PathBuf>,
    /// Directory prefix of the entries inside the archive
    pub archive_prefix: String,
    /// Length of the identifier suffix used as shard directory
    pub shard_len: usize,
    /// Executable used to extract archive entries
    pub unzip_program: String,
    pub extraction_timeout_secs: u64,
    /// JSON object mapping raw organization names to canonical names
    pub alias_table: Option<PathBuf>,
    pub resolution_cache: PathBuf,
    pub auxiliary_cache: Option<PathBuf>,
    pub on_graph_error: FailurePolicy,
    pub graph: GraphConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            identifier_list: PathBuf::from("ORCIDs.csv"),
            records_dir: None,
            archive: None,
            archive_prefix: "summaries".to_string(),
            shard_len: 3,
            unzip_program: "unzip".to_string(),
            extraction_timeout_secs: 60,
            alias_table: None,
            resolution_cache: PathBuf::from("orcid_cache.json"),
            auxiliary_cache: None,
            on_graph_error: FailurePolicy::Abort,
            graph: GraphConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a YAML config file
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.shard_len == 0 {
            return Err(ConfigError::Invalid("shard_len must be at least 1".to_string()));
        }
        if self.records_dir.is_none() && self.archive.is_none() {
            return Err(ConfigError::Invalid(
                "one of records_dir or archive must be set".to_string(),
            ));
        }
        if self.graph.url.trim().is_empty() {
            return Err(ConfigError::Invalid("graph.url must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn layout(&self) -> ArchiveLayout {
        ArchiveLayout {
            records_dir: self.records_dir.clone(),
            archive_prefix: self.archive_prefix.clone(),
            shard_len: self.shard_len,
        }
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = PipelineConfig::from_yaml_str("archive: /data/ORCID_2019_summaries.zip\n").unwrap();
        assert_eq!(config.archive_prefix, "summaries");
        assert_eq!(config.shard_len, 3);
        assert_eq!(config.on_graph_error, FailurePolicy::Abort);
        assert_eq!(config.graph.url, "http://localhost:7474");
        assert_eq!(config.graph.commit_path, "/db/data/transaction/commit");
        assert_eq!(config.layout().archive_entry("0000-0002-1825-0097"), "summaries/097/0000-0002-1825-0097.xml");
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
identifier_list: ./ORCIDs.csv
records_dir: ../cache/ORCID_2020_10_summaries
alias_table: ./org_matches.json
resolution_cache: ../cache/orcid_cache.json
auxiliary_cache: ../cache/geo_cache.json
on_graph_error: continue
graph:
  url: http://neo4j:7474
  timeout_secs: 5
"#;
        let config = PipelineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.on_graph_error, FailurePolicy::Continue);
        assert_eq!(config.graph.url, "http://neo4j:7474");
        assert_eq!(config.graph.timeout(), Duration::from_secs(5));
        assert_eq!(config.graph.commit_path, "/db/data/transaction/commit");
        assert_eq!(config.auxiliary_cache, Some(PathBuf::from("../cache/geo_cache.json")));
    }

    #[test]
    fn test_requires_a_record_location() {
        let err = PipelineConfig::from_yaml_str("shard_len: 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_zero_shard_len() {
        let err = PipelineConfig::from_yaml_str("archive: a.zip\nshard_len: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_policy_is_a_yaml_error() {
        let err = PipelineConfig::from_yaml_str("archive: a.zip\non_graph_error: retry\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }
}
