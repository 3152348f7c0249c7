//! Affiliation Graph
//!
//! Builds a person-organization affiliation graph from ORCID public data
//! summaries and loads it into a Cypher graph store.
//!
//! # Architecture
//!
//! - [`source`]: identifier to raw XML, from a loose directory tree or the bulk
//!   archive, behind a persistent resolution cache
//! - [`record`]: ORCID summary XML to [`PersonRecord`]
//! - [`org`]: alias resolution and the first-seen organization registry
//! - [`export`]: idempotent person/organization upserts and affiliation edges
//! - [`pipeline`]: the two-pass warm-up/export orchestration
//! - [`config`]: YAML configuration
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use affiliation_graph::{Pipeline, PipelineConfig, read_identifiers};
//! use affiliation_graph_client::RemoteClient;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::from_file(Path::new("affiliation-graph.yaml"))?;
//! let client = RemoteClient::with_options(&config.graph.url, &config.graph.commit_path, config.graph.timeout())?;
//!
//! let identifiers = read_identifiers(&config.identifier_list)?;
//! let mut pipeline = Pipeline::from_config(&config, Arc::new(client))?;
//! let report = pipeline.run(&identifiers).await?;
//! println!("{} records exported", report.export.exported);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod export;
pub mod org;
pub mod pipeline;
pub mod record;
pub mod source;

pub use config::{ConfigError, FailurePolicy, GraphConfig, PipelineConfig};
pub use export::{statements_for, ExportError, GraphExporter};
pub use org::{derive_org_id, AliasTable, OrgError, OrganizationRegistry};
pub use pipeline::{
    parse_identifiers, read_identifiers, CachePaths, PassStats, Phase, Pipeline, PipelineError,
    PipelineResult, RunReport,
};
pub use record::{Employment, OrganizationRef, PartialDate, PersonRecord, RecordParser};
pub use source::{ArchiveLayout, AuxiliaryCache, RecordSource, ResolutionCache, UnzipExtractor};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
