//! Wire models for the transactional Cypher endpoint
//!
//! These types mirror the request/response bodies of
//! `POST /db/data/transaction/commit` and are shared by
//! `RemoteClient` and `RecordingClient`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single Cypher statement with its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// Cypher query text
    pub statement: String,
    /// Named parameters referenced as `$name` in the query
    pub parameters: Map<String, Value>,
}

impl Statement {
    /// Create a statement without parameters
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            parameters: Map::new(),
        }
    }

    /// Add a parameter
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Look up a parameter by name
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }
}

/// Request body: every statement runs inside one transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub statements: Vec<Statement>,
}

/// Result set of one statement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatementResult {
    /// Column names
    #[serde(default)]
    pub columns: Vec<String>,
    /// Raw rows as returned by the store
    #[serde(default)]
    pub data: Vec<Value>,
}

/// Error reported by the store inside a 200 response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreError {
    pub code: String,
    pub message: String,
}

/// Response body of a commit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionResponse {
    #[serde(default)]
    pub results: Vec<StatementResult>,
    #[serde(default)]
    pub errors: Vec<StoreError>,
}

impl TransactionResponse {
    /// Whether the store accepted the whole transaction
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}
