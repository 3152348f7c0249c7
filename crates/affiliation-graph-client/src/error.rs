//! Error types for the graph store client

use thiserror::Error;

use crate::models::StoreError;

/// Errors that can occur when talking to the graph store
#[derive(Error, Debug)]
pub enum GraphError {
    /// The store answered with something other than HTTP 200
    #[error("Graph store returned HTTP {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },

    /// HTTP 200, but the transaction reported errors and was rolled back
    #[error("Transaction failed: {}", summarize(.0))]
    Transaction(Vec<StoreError>),

    /// Connection error (ping, unreachable host)
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

fn summarize(errors: &[StoreError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type GraphResult<T> = Result<T, GraphError>;
