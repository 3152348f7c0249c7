//! GraphClient trait: the unified interface for remote and recording modes

use async_trait::async_trait;

use crate::error::GraphResult;
use crate::models::{Statement, TransactionResponse};

/// Client interface for a transactional Cypher graph store.
///
/// Implemented by:
/// - `RemoteClient`: posts to a running store over HTTP
/// - `RecordingClient`: keeps the transactions in memory (tests, dry runs)
#[async_trait]
pub trait GraphClient: Send + Sync {
    /// Run all statements in a single transaction and commit it.
    ///
    /// Either every statement applies or an error is returned.
    async fn commit(&self, statements: Vec<Statement>) -> GraphResult<TransactionResponse>;

    /// Check that the store is reachable
    async fn ping(&self) -> GraphResult<String>;
}
