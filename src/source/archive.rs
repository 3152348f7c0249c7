//! Single-entry extraction from a compressed archive

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::{SourceError, SourceResult};

/// Extract one file from an archive.
///
/// Any error is treated by `RecordSource` as a recoverable miss.
#[async_trait]
pub trait ArchiveExtractor: Send + Sync {
    /// Return the bytes of `entry` (a path inside the archive)
    async fn extract(&self, entry: &str) -> SourceResult<Vec<u8>>;
}

/// Runs `unzip -p <archive> <entry>` and captures stdout
#[derive(Debug, Clone)]
pub struct UnzipExtractor {
    program: String,
    archive: PathBuf,
    timeout: Duration,
}

impl UnzipExtractor {
    pub fn new(archive: impl AsRef<Path>) -> Self {
        Self {
            program: "unzip".to_string(),
            archive: archive.as_ref().to_path_buf(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Use a different executable with unzip-compatible arguments
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

}

#[async_trait]
impl ArchiveExtractor for UnzipExtractor {
    async fn extract(&self, entry: &str) -> SourceResult<Vec<u8>> {
        debug!("{} -p {:?} {}", self.program, self.archive, entry);

        let mut command = Command::new(&self.program);
        command
            .arg("-p")
            .arg(&self.archive)
            .arg(entry)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(result) => result.map_err(|source| SourceError::Spawn {
                program: self.program.clone(),
                source,
            })?,
            Err(_) => {
                return Err(SourceError::Timeout {
                    entry: entry.to_string(),
                    timeout: self.timeout,
                })
            }
        };

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(SourceError::Extraction {
                entry: entry.to_string(),
                status: output.status.code(),
                diagnostic: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}
