//! RemoteClient: network client for a running graph store
//!
//! Talks to the transactional Cypher HTTP endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use tracing::{debug, error};

use crate::client::GraphClient;
use crate::error::{GraphError, GraphResult};
use crate::models::{Statement, TransactionRequest, TransactionResponse};

/// Default path of the commit endpoint
pub const DEFAULT_COMMIT_PATH: &str = "/db/data/transaction/commit";

/// Network client that connects to a running graph store.
pub struct RemoteClient {
    http_base_url: String,
    commit_path: String,
    http_client: Client,
}

impl RemoteClient {
    /// Create a new RemoteClient connecting to the given HTTP base URL.
    ///
    /// # Example
    /// ```no_run
    /// # use affiliation_graph_client::RemoteClient;
    /// let client = RemoteClient::new("http://localhost:7474").unwrap();
    /// ```
    pub fn new(http_base_url: &str) -> GraphResult<Self> {
        Self::with_options(http_base_url, DEFAULT_COMMIT_PATH, Duration::from_secs(30))
    }

    /// Create a client with an explicit commit path and request timeout
    pub fn with_options(http_base_url: &str, commit_path: &str, timeout: Duration) -> GraphResult<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_base_url: http_base_url.trim_end_matches('/').to_string(),
            commit_path: format!("/{}", commit_path.trim_start_matches('/')),
            http_client,
        })
    }

    /// Full URL of the commit endpoint
    pub fn commit_url(&self) -> String {
        format!("{}{}", self.http_base_url, self.commit_path)
    }
}

#[async_trait]
impl GraphClient for RemoteClient {
    async fn commit(&self, statements: Vec<Statement>) -> GraphResult<TransactionResponse> {
        let url = self.commit_url();
        let body = TransactionRequest { statements };
        debug!("POST {} ({} statements)", url, body.statements.len());

        let response = self.http_client.post(&url)
            .header(ACCEPT, "application/json; charset=utf-8")
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status != StatusCode::OK {
            error!("Graph store returned {}: {}", status, text);
            return Err(GraphError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let result: TransactionResponse = serde_json::from_str(&text)?;
        if !result.is_success() {
            error!("Transaction rejected by graph store: {}", text);
            return Err(GraphError::Transaction(result.errors));
        }

        Ok(result)
    }

    async fn ping(&self) -> GraphResult<String> {
        let url = format!("{}/", self.http_base_url);
        let response = self.http_client.get(&url)
            .header(ACCEPT, "application/json; charset=utf-8")
            .send()
            .await?;

        if response.status().is_success() {
            Ok("PONG".to_string())
        } else {
            Err(GraphError::ConnectionError(
                format!("{} returned {}", url, response.status())
            ))
        }
    }
}
