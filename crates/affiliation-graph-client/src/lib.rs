//! Affiliation graph client: transactional Cypher client for the graph store
//!
//! Provides two client implementations:
//!
//! - **`RemoteClient`**: Posts statement batches to a running store's
//!   transactional HTTP endpoint. For production runs.
//!
//! - **`RecordingClient`**: In-process, no network. Keeps every committed
//!   transaction in memory. Ideal for tests and dry runs.
//!
//! Both implement the `GraphClient` trait for a unified API.
//!
//! # Quick Start
//!
//! ```rust
//! use affiliation_graph_client::{GraphClient, RecordingClient, Statement};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = RecordingClient::new();
//!
//!     client.commit(vec![
//!         Statement::new("MERGE (o:Organization {org_id: $org_id, name: $name}) RETURN o")
//!             .with_parameter("org_id", "ROR123")
//!             .with_parameter("name", "Massachusetts Institute of Technology"),
//!     ]).await.unwrap();
//!
//!     assert_eq!(client.transaction_count().await, 1);
//! }
//! ```

pub mod client;
pub mod error;
pub mod models;
pub mod recording;
pub mod remote;

pub use client::GraphClient;
pub use error::{GraphError, GraphResult};
pub use models::{Statement, StatementResult, StoreError, TransactionRequest, TransactionResponse};
pub use recording::RecordingClient;
pub use remote::{RemoteClient, DEFAULT_COMMIT_PATH};
