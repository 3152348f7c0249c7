//! Graph export
//!
//! Turns a resolved `PersonRecord` into Cypher statements and commits them
//! as one transaction per record:
//!
//! 1. `MERGE` the person, keyed on orcid and names
//! 2. for each employment, `MERGE` the organization keyed on org_id and name,
//!    then `CREATE` an `AFFILIATED_WITH` edge from person to organization
//!
//! Person and organization nodes are idempotent across re-runs. Edges are
//! not: exporting the same record twice creates the edges twice, so a full
//! replay needs the edges cleared first.

use affiliation_graph_client::{GraphClient, GraphError, Statement};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

use crate::record::{Employment, PartialDate, PersonRecord};

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    /// The graph store rejected or failed the transaction
    #[error("Graph store error for {orcid}: {source}")]
    Graph {
        orcid: String,
        #[source]
        source: GraphError,
    },
}

pub type ExportResult<T> = Result<T, ExportError>;

const MERGE_PERSON: &str = "MERGE (p:Person {orcid: $person.orcid, first_name: $person.first_name, last_name: $person.last_name})
RETURN p";

const MERGE_ORGANIZATION: &str = "MERGE (o:Organization {org_id: $org_id, name: $name})
RETURN o";

const CREATE_AFFILIATION: &str = "MATCH (p:Person {orcid: $orcid}),(o:Organization {org_id: $org_id})
CREATE (p)-[r:AFFILIATED_WITH {role: $role, start: $start, end: $end}]->(o)
RETURN r";

fn person_statement(record: &PersonRecord) -> Statement {
    Statement::new(MERGE_PERSON).with_parameter(
        "person",
        json!({
            "orcid": record.id,
            "first_name": record.first_name,
            "last_name": record.last_name,
        }),
    )
}

fn organization_statement(employment: &Employment) -> Statement {
    Statement::new(MERGE_ORGANIZATION)
        .with_parameter("org_id", employment.organization.org_id.as_str())
        .with_parameter("name", employment.organization.name.as_str())
}

fn affiliation_statement(record: &PersonRecord, employment: &Employment) -> Statement {
    let date = |d: &Option<PartialDate>| {
        d.as_ref().map(|d| Value::from(d.as_str())).unwrap_or(Value::Null)
    };
    let role = if employment.role.is_empty() {
        Value::Null
    } else {
        Value::from(employment.role.as_str())
    };

    Statement::new(CREATE_AFFILIATION)
        .with_parameter("orcid", record.id.as_str())
        .with_parameter("org_id", employment.organization.org_id.as_str())
        .with_parameter("role", role)
        .with_parameter("start", date(&employment.start))
        .with_parameter("end", date(&employment.end))
}

/// All statements for one record, in submission order
pub fn statements_for(record: &PersonRecord) -> Vec<Statement> {
    let mut statements = Vec::with_capacity(1 + 2 * record.employments.len());
    statements.push(person_statement(record));
    for employment in &record.employments {
        statements.push(organization_statement(employment));
        statements.push(affiliation_statement(record, employment));
    }
    statements
}

/// Commits records to the graph store
pub struct GraphExporter {
    client: Arc<dyn GraphClient>,
}

impl GraphExporter {
    pub fn new(client: Arc<dyn GraphClient>) -> Self {
        Self { client }
    }

    /// Commit one record as a single transaction
    pub async fn export(&self, record: &PersonRecord) -> ExportResult<()> {
        let statements = statements_for(record);
        let count = statements.len();

        match self.client.commit(statements).await {
            Ok(_) => {
                debug!("Exported {} ({} statements)", record.id, count);
                Ok(())
            }
            Err(source) => {
                error!("Export of {} failed: {}", record.id, source);
                Err(ExportError::Graph {
                    orcid: record.id.clone(),
                    source,
                })
            }
        }
    }
}
