//! Two-pass orchestration
//!
//! The pipeline walks the identifier list twice, in list order:
//!
//! - **warm-up**: resolve, parse and register every organization, so each
//!   canonical name has its org_id settled before anything is written
//! - **export**: resolve again (served from the resolution cache), rewrite
//!   organizations to their registered entries and commit each record
//!
//! A failing record never aborts the run, except for graph store errors under
//! `FailurePolicy::Abort`. Caches are persisted once at the end of `run`,
//! whether or not the export pass was aborted.

pub mod identifiers;

pub use identifiers::{parse_identifiers, read_identifiers};

use affiliation_graph_client::GraphClient;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, FailurePolicy, PipelineConfig};
use crate::export::{ExportError, GraphExporter};
use crate::org::{AliasError, AliasTable, OrgError, OrganizationRegistry};
use crate::record::{PersonRecord, RecordError, RecordParser};
use crate::source::{
    AuxiliaryCache, CacheError, RecordSource, ResolutionCache, SourceError, UnzipExtractor,
};

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Organization(#[from] OrgError),

    #[error(transparent)]
    Alias(#[from] AliasError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Export(#[from] ExportError),

    /// Input file could not be read
    #[error("Cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A pass was started out of order
    #[error("Cannot run {requested} while pipeline is {current:?}")]
    PhaseOrder {
        requested: &'static str,
        current: Phase,
    },
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Where the pipeline is in its two-pass lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// Nothing has run yet
    Pending,
    /// Warm-up finished, the registry is settled
    WarmedUp,
    /// Export pass finished (or was aborted)
    Exported,
}

/// Per-pass record counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassStats {
    /// Records found and parsed
    pub resolved: usize,
    /// Identifiers with no record (cached as absent)
    pub missing: usize,
    /// Records that failed to parse
    pub malformed: usize,
    /// Records committed to the graph store (export only)
    pub exported: usize,
    /// Records that failed for any other reason
    pub failed: usize,
}

/// Summary of a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub identifiers: usize,
    pub warm_up: PassStats,
    pub export: PassStats,
    /// Distinct canonical organizations
    pub organizations: usize,
    /// Whether the caches were written at the end of the run
    pub caches_persisted: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Where the caches go at the end of a run
#[derive(Debug, Clone)]
pub struct CachePaths {
    pub resolution: PathBuf,
    pub auxiliary: Option<PathBuf>,
}

/// Owns the source, registry and exporter for one run
pub struct Pipeline {
    source: RecordSource,
    parser: RecordParser,
    registry: OrganizationRegistry,
    exporter: GraphExporter,
    policy: FailurePolicy,
    phase: Phase,
    cache_paths: Option<CachePaths>,
    auxiliary: Option<AuxiliaryCache>,
    report: RunReport,
}

impl Pipeline {
    pub fn new(source: RecordSource, registry: OrganizationRegistry, exporter: GraphExporter) -> Self {
        Self {
            source,
            parser: RecordParser::new(),
            registry,
            exporter,
            policy: FailurePolicy::default(),
            phase: Phase::Pending,
            cache_paths: None,
            auxiliary: None,
            report: RunReport::default(),
        }
    }

    /// Build a pipeline from configuration, loading caches and aliases
    pub fn from_config(config: &PipelineConfig, client: Arc<dyn GraphClient>) -> PipelineResult<Self> {
        config.validate()?;

        let cache = ResolutionCache::load(&config.resolution_cache)?;
        let auxiliary = config
            .auxiliary_cache
            .as_deref()
            .map(AuxiliaryCache::load)
            .transpose()?;
        let aliases = match config.alias_table.as_deref() {
            Some(path) => AliasTable::load(path)?,
            None => AliasTable::default(),
        };

        let mut source = RecordSource::new(config.layout(), cache);
        if let Some(archive) = config.archive.as_ref() {
            source = source.with_extractor(
                UnzipExtractor::new(archive)
                    .with_program(config.unzip_program.clone())
                    .with_timeout(config.extraction_timeout()),
            );
        }

        let mut pipeline = Self::new(source, OrganizationRegistry::new(aliases), GraphExporter::new(client))
            .with_policy(config.on_graph_error);
        pipeline.cache_paths = Some(CachePaths {
            resolution: config.resolution_cache.clone(),
            auxiliary: config.auxiliary_cache.clone(),
        });
        pipeline.auxiliary = auxiliary;
        Ok(pipeline)
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn registry(&self) -> &OrganizationRegistry {
        &self.registry
    }

    pub fn source(&self) -> &RecordSource {
        &self.source
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Resolve and parse one identifier, counting the outcome
    async fn load_record(&mut self, identifier: &str, stats: &mut PassStats) -> Option<PersonRecord> {
        let document = match self.source.resolve(identifier).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                debug!("No record for {}, skipping", identifier);
                stats.missing += 1;
                return None;
            }
            Err(e) => {
                warn!("Cannot read record {}: {}", identifier, e);
                stats.failed += 1;
                return None;
            }
        };

        match self.parser.parse(document.as_bytes()) {
            Ok(mut record) => {
                if record.id.is_empty() {
                    record.id = identifier.to_string();
                }
                stats.resolved += 1;
                Some(record)
            }
            Err(e) => {
                warn!("Skipping malformed record {}: {}", identifier, e);
                stats.malformed += 1;
                None
            }
        }
    }

    /// First pass: register every organization in list order
    pub async fn warm_up(&mut self, identifiers: &[String]) -> PassStats {
        info!("Warm-up pass over {} identifiers", identifiers.len());
        let mut stats = PassStats::default();

        for identifier in identifiers {
            if let Some(record) = self.load_record(identifier, &mut stats).await {
                self.registry.warm_up(&record);
            }
        }

        self.phase = Phase::WarmedUp;
        self.report.warm_up = stats.clone();
        self.report.organizations = self.registry.len();
        info!(
            "Warm-up done: {} records, {} missing, {} malformed, {} organizations",
            stats.resolved,
            stats.missing,
            stats.malformed,
            self.registry.len()
        );
        stats
    }

    /// Second pass: resolve organizations and commit each record
    pub async fn export(&mut self, identifiers: &[String]) -> PipelineResult<PassStats> {
        if self.phase != Phase::WarmedUp {
            return Err(PipelineError::PhaseOrder {
                requested: "export",
                current: self.phase,
            });
        }

        info!("Export pass over {} identifiers", identifiers.len());
        let mut stats = PassStats::default();
        let mut aborted = None;

        for identifier in identifiers {
            let Some(mut record) = self.load_record(identifier, &mut stats).await else {
                continue;
            };

            if let Err(e) = self.registry.normalize(&mut record) {
                error!("Record {} skipped: {}", identifier, e);
                stats.failed += 1;
                continue;
            }

            match self.exporter.export(&record).await {
                Ok(()) => stats.exported += 1,
                Err(e) => {
                    stats.failed += 1;
                    match self.policy {
                        FailurePolicy::Continue => {
                            warn!("Continuing after failed export of {}", identifier);
                        }
                        FailurePolicy::Abort => {
                            error!("Aborting export pass at {}", identifier);
                            aborted = Some(e);
                            break;
                        }
                    }
                }
            }
        }

        self.phase = Phase::Exported;
        self.report.export = stats.clone();
        info!(
            "Export done: {} exported, {} failed, {} missing, {} malformed",
            stats.exported, stats.failed, stats.missing, stats.malformed
        );

        match aborted {
            Some(e) => Err(e.into()),
            None => Ok(stats),
        }
    }

    /// Write the resolution and auxiliary caches, if paths are configured
    pub fn persist_caches(&self) -> PipelineResult<()> {
        let Some(paths) = self.cache_paths.as_ref() else {
            debug!("No cache paths configured, skipping persistence");
            return Ok(());
        };

        self.source.cache().save(&paths.resolution)?;
        if let (Some(path), Some(auxiliary)) = (paths.auxiliary.as_ref(), self.auxiliary.as_ref()) {
            auxiliary.save(path)?;
        }
        Ok(())
    }

    /// Warm-up, export, then persist caches even if export aborted
    pub async fn run(&mut self, identifiers: &[String]) -> PipelineResult<RunReport> {
        self.report = RunReport {
            identifiers: identifiers.len(),
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        self.warm_up(identifiers).await;
        let exported = self.export(identifiers).await;
        let persisted = self.persist_caches();
        self.report.caches_persisted = persisted.is_ok();
        self.report.finished_at = Some(Utc::now());

        match (exported, persisted) {
            (Err(e), Err(cache_error)) => {
                // Only the export error is returned, the cache failure must not vanish
                error!("Failed to persist caches after aborted export: {}", cache_error);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(_), Err(cache_error)) => {
                error!("Failed to persist caches: {}", cache_error);
                Err(cache_error)
            }
            (Ok(_), Ok(())) => Ok(self.report.clone()),
        }
    }

    /// Resolve and parse a single record without touching the registry
    pub async fn show(&mut self, identifier: &str) -> PipelineResult<Option<PersonRecord>> {
        let Some(document) = self.source.resolve(identifier).await? else {
            return Ok(None);
        };
        let mut record = self.parser.parse(document.as_bytes())?;
        if record.id.is_empty() {
            record.id = identifier.to_string();
        }
        Ok(Some(record))
    }
}
