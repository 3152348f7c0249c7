//! RecordingClient: in-process client that never leaves the process
//!
//! Every committed transaction is kept in memory. Used by tests and by
//! dry runs that only want to see the statements.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::client::GraphClient;
use crate::error::GraphResult;
use crate::models::{Statement, StatementResult, TransactionResponse};

/// In-process client that records transactions instead of sending them.
#[derive(Clone, Default)]
pub struct RecordingClient {
    transactions: Arc<Mutex<Vec<Vec<Statement>>>>,
}

impl RecordingClient {
    /// Create a client with an empty transaction log
    pub fn new() -> Self {
        Self::default()
    }

    /// All committed transactions, oldest first
    pub async fn transactions(&self) -> Vec<Vec<Statement>> {
        self.transactions.lock().await.clone()
    }

    /// All committed statements flattened in commit order
    pub async fn statements(&self) -> Vec<Statement> {
        self.transactions.lock().await.iter().flatten().cloned().collect()
    }

    /// Number of committed transactions
    pub async fn transaction_count(&self) -> usize {
        self.transactions.lock().await.len()
    }
}

#[async_trait]
impl GraphClient for RecordingClient {
    async fn commit(&self, statements: Vec<Statement>) -> GraphResult<TransactionResponse> {
        let results = statements.iter().map(|_| StatementResult::default()).collect();
        self.transactions.lock().await.push(statements);
        Ok(TransactionResponse {
            results,
            errors: Vec::new(),
        })
    }

    async fn ping(&self) -> GraphResult<String> {
        Ok("PONG".to_string())
    }
}
