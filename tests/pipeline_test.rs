//! End-to-end pipeline tests over a temporary records tree

use std::path::PathBuf;
use std::sync::Arc;

use affiliation_graph::{
    derive_org_id, parse_identifiers, FailurePolicy, Phase, Pipeline, PipelineConfig, PipelineError,
};
use affiliation_graph_client::{
    GraphClient, GraphError, GraphResult, RecordingClient, Statement, StoreError, TransactionResponse,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

const MIT: &str = "Massachusetts Institute of Technology";

fn record_xml(orcid: &str, given: &str, family: &str, employments: &[(&str, Option<&str>, &str)]) -> String {
    let mut groups = String::new();
    for (name, source_id, role) in employments {
        let disambiguated = source_id
            .map(|id| {
                format!(
                    "<common:disambiguated-organization>\
                     <common:disambiguated-organization-identifier>{}</common:disambiguated-organization-identifier>\
                     </common:disambiguated-organization>",
                    id
                )
            })
            .unwrap_or_default();
        groups.push_str(&format!(
            "<activities:affiliation-group><employment:employment-summary>\
             <common:role-title>{role}</common:role-title>\
             <common:start-date><common:year>2015</common:year></common:start-date>\
             <common:organization><common:name>{name}</common:name>{disambiguated}</common:organization>\
             </employment:employment-summary></activities:affiliation-group>"
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<record:record xmlns:record="http://www.orcid.org/ns/record" xmlns:common="http://www.orcid.org/ns/common"
    xmlns:person="http://www.orcid.org/ns/person" xmlns:personal-details="http://www.orcid.org/ns/personal-details"
    xmlns:activities="http://www.orcid.org/ns/activities" xmlns:employment="http://www.orcid.org/ns/employment">
  <common:orcid-identifier><common:path>{orcid}</common:path></common:orcid-identifier>
  <person:person><person:name>
    <personal-details:given-names>{given}</personal-details:given-names>
    <personal-details:family-name>{family}</personal-details:family-name>
  </person:name></person:person>
  <activities:activities-summary><activities:employments>{groups}</activities:employments></activities:activities-summary>
</record:record>"#
    )
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let ws = Self { dir: TempDir::new().unwrap() };
        std::fs::write(ws.path("aliases.json"), json!({ "MIT": MIT }).to_string()).unwrap();
        ws
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn add_record(&self, orcid: &str, xml: &str) {
        let shard = &orcid[orcid.len() - 3..];
        let dir = self.path("records").join(shard);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{}.xml", orcid)), xml).unwrap();
    }

    fn remove_record(&self, orcid: &str) {
        let shard = &orcid[orcid.len() - 3..];
        std::fs::remove_file(self.path("records").join(shard).join(format!("{}.xml", orcid))).unwrap();
    }

    fn config(&self, policy: FailurePolicy) -> PipelineConfig {
        PipelineConfig {
            records_dir: Some(self.path("records")),
            alias_table: Some(self.path("aliases.json")),
            resolution_cache: self.path("cache/orcid_cache.json"),
            on_graph_error: policy,
            ..Default::default()
        }
    }

    fn cache_json(&self) -> Value {
        let text = std::fs::read_to_string(self.path("cache/orcid_cache.json")).unwrap();
        serde_json::from_str(&text).unwrap()
    }
}

fn seed_mit(ws: &Workspace) {
    ws.add_record("0000-0001-AAAA", &record_xml("0000-0001-AAAA", "Ada", "Lovelace", &[("MIT", None, "Professor")]));
    ws.add_record(
        "0000-0002-BBBB",
        &record_xml("0000-0002-BBBB", "Grace", "Hopper", &[(MIT, Some("ROR123"), "Researcher")]),
    );
}

fn affiliation_targets(statements: &[Statement]) -> Vec<String> {
    statements
        .iter()
        .filter(|s| s.statement.contains("AFFILIATED_WITH"))
        .map(|s| s.parameter("org_id").and_then(Value::as_str).unwrap_or_default().to_string())
        .collect()
}

fn ids(list: &str) -> Vec<String> {
    parse_identifiers(list)
}

#[tokio::test]
async fn test_alias_and_first_seen_collapse_to_one_organization() {
    let ws = Workspace::new();
    seed_mit(&ws);
    let client = RecordingClient::new();

    let mut pipeline = Pipeline::from_config(&ws.config(FailurePolicy::Abort), Arc::new(client.clone())).unwrap();
    let report = pipeline.run(&ids("0000-0001-AAAA\n0000-0002-BBBB\n")).await.unwrap();

    assert_eq!(report.warm_up.resolved, 2);
    assert_eq!(report.export.exported, 2);
    assert_eq!(report.organizations, 1);
    assert_eq!(pipeline.phase(), Phase::Exported);

    // The first record named MIT without a source id, so the derived id wins
    let expected = derive_org_id(MIT);
    let statements = client.statements().await;
    assert_eq!(affiliation_targets(&statements), vec![expected.clone(), expected.clone()]);

    let org_merges: Vec<&Statement> = statements
        .iter()
        .filter(|s| s.statement.starts_with("MERGE (o:Organization"))
        .collect();
    assert_eq!(org_merges.len(), 2);
    for merge in org_merges {
        assert_eq!(merge.parameter("name"), Some(&json!(MIT)));
        assert_eq!(merge.parameter("org_id"), Some(&json!(expected)));
    }
}

#[tokio::test]
async fn test_alias_within_one_record() {
    let ws = Workspace::new();
    ws.add_record(
        "0000-0001-AAAA",
        &record_xml("0000-0001-AAAA", "Ada", "Lovelace", &[("MIT", None, ""), (MIT, Some("ROR123"), "")]),
    );
    let client = RecordingClient::new();

    let mut pipeline = Pipeline::from_config(&ws.config(FailurePolicy::Abort), Arc::new(client.clone())).unwrap();
    pipeline.run(&ids("0000-0001-AAAA")).await.unwrap();

    assert_eq!(pipeline.registry().len(), 1);
    let expected = derive_org_id(MIT);

    let transactions = client.transactions().await;
    assert_eq!(transactions.len(), 1);
    let statements = &transactions[0];
    assert_eq!(statements.len(), 5);
    assert_eq!(statements[1], statements[3]);
    assert_eq!(statements[1].parameter("org_id"), Some(&json!(expected)));
    assert_eq!(affiliation_targets(statements), vec![expected.clone(), expected]);
}

#[tokio::test]
async fn test_list_order_decides_first_seen() {
    let ws = Workspace::new();
    seed_mit(&ws);
    let client = RecordingClient::new();

    let mut pipeline = Pipeline::from_config(&ws.config(FailurePolicy::Abort), Arc::new(client.clone())).unwrap();
    pipeline.run(&ids("0000-0002-BBBB,0000-0001-AAAA")).await.unwrap();

    let statements = client.statements().await;
    assert_eq!(affiliation_targets(&statements), vec!["ROR123", "ROR123"]);
    assert_eq!(pipeline.registry().resolve("MIT").unwrap().org_id, "ROR123");
}

#[tokio::test]
async fn test_one_transaction_per_record() {
    let ws = Workspace::new();
    seed_mit(&ws);
    let client = RecordingClient::new();

    let mut pipeline = Pipeline::from_config(&ws.config(FailurePolicy::Abort), Arc::new(client.clone())).unwrap();
    pipeline.run(&ids("0000-0001-AAAA\n0000-0002-BBBB")).await.unwrap();

    let transactions = client.transactions().await;
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0][0].parameter("person").unwrap()["orcid"], json!("0000-0001-AAAA"));
    assert_eq!(transactions[1][0].parameter("person").unwrap()["first_name"], json!("Grace"));
    assert_eq!(transactions[1][2].parameter("role"), Some(&json!("Researcher")));
    assert_eq!(transactions[1][2].parameter("start"), Some(&json!("2015")));
}

#[tokio::test]
async fn test_missing_records_are_cached_as_absent() {
    let ws = Workspace::new();
    seed_mit(&ws);
    let list = ids("0000-0001-AAAA\n0000-0009-ZZZZ\n");

    let mut pipeline = Pipeline::from_config(&ws.config(FailurePolicy::Abort), Arc::new(RecordingClient::new())).unwrap();
    let report = pipeline.run(&list).await.unwrap();
    assert_eq!(report.warm_up.missing, 1);
    assert_eq!(report.export.exported, 1);

    let cache = ws.cache_json();
    assert_eq!(cache["0000-0009-ZZZZ"], Value::Null);
    assert!(cache["0000-0001-AAAA"].as_str().unwrap().contains("Lovelace"));

    // A record that appears later is not picked up while the miss is cached,
    // and a cached hit survives the loose file going away
    ws.add_record("0000-0009-ZZZZ", &record_xml("0000-0009-ZZZZ", "Late", "Arrival", &[]));
    ws.remove_record("0000-0001-AAAA");

    let client = RecordingClient::new();
    let mut pipeline = Pipeline::from_config(&ws.config(FailurePolicy::Abort), Arc::new(client.clone())).unwrap();
    let report = pipeline.run(&list).await.unwrap();
    assert_eq!(report.warm_up.missing, 1);
    assert_eq!(report.export.exported, 1);
    assert_eq!(client.transaction_count().await, 1);
}

#[tokio::test]
async fn test_malformed_record_is_skipped() {
    let ws = Workspace::new();
    seed_mit(&ws);
    ws.add_record("0000-0003-CCCC", "<record:record><unclosed>");
    let client = RecordingClient::new();

    let mut pipeline = Pipeline::from_config(&ws.config(FailurePolicy::Abort), Arc::new(client.clone())).unwrap();
    let report = pipeline
        .run(&ids("0000-0001-AAAA\n0000-0003-CCCC\n0000-0002-BBBB"))
        .await
        .unwrap();

    assert_eq!(report.warm_up.malformed, 1);
    assert_eq!(report.export.malformed, 1);
    assert_eq!(report.export.exported, 2);
    assert_eq!(client.transaction_count().await, 2);
}

/// Fails any transaction for the given person
struct FailingFor {
    orcid: &'static str,
    inner: RecordingClient,
}

#[async_trait]
impl GraphClient for FailingFor {
    async fn commit(&self, statements: Vec<Statement>) -> GraphResult<TransactionResponse> {
        let person = statements
            .first()
            .and_then(|s| s.parameter("person"))
            .and_then(|p| p["orcid"].as_str())
            .unwrap_or_default();
        if person == self.orcid {
            return Err(GraphError::Transaction(vec![StoreError {
                code: "Neo.TransientError.General.DatabaseUnavailable".to_string(),
                message: "store unavailable".to_string(),
            }]));
        }
        self.inner.commit(statements).await
    }

    async fn ping(&self) -> GraphResult<String> {
        self.inner.ping().await
    }
}

fn three_records(ws: &Workspace) -> Vec<String> {
    seed_mit(ws);
    ws.add_record("0000-0003-CCCC", &record_xml("0000-0003-CCCC", "Alan", "Turing", &[("Bletchley Park", None, "")]));
    ids("0000-0001-AAAA\n0000-0002-BBBB\n0000-0003-CCCC")
}

#[tokio::test]
async fn test_abort_policy_stops_but_persists_caches() {
    let ws = Workspace::new();
    let list = three_records(&ws);
    let inner = RecordingClient::new();
    let client = FailingFor { orcid: "0000-0002-BBBB", inner: inner.clone() };

    let mut pipeline = Pipeline::from_config(&ws.config(FailurePolicy::Abort), Arc::new(client)).unwrap();
    let err = pipeline.run(&list).await.unwrap_err();

    assert!(matches!(err, PipelineError::Export(_)));
    assert_eq!(inner.transaction_count().await, 1);
    assert_eq!(pipeline.report().export.exported, 1);
    assert_eq!(pipeline.report().export.failed, 1);
    assert_eq!(ws.cache_json().as_object().unwrap().len(), 3);
    assert!(pipeline.report().caches_persisted);
}

#[tokio::test]
async fn test_cache_failure_after_abort_is_reported() {
    let ws = Workspace::new();
    let list = three_records(&ws);
    let client = FailingFor { orcid: "0000-0001-AAAA", inner: RecordingClient::new() };

    let mut pipeline = Pipeline::from_config(&ws.config(FailurePolicy::Abort), Arc::new(client)).unwrap();
    // The cache directory's name is taken by a regular file, so the save fails
    std::fs::write(ws.path("cache"), "").unwrap();

    let err = pipeline.run(&list).await.unwrap_err();
    assert!(matches!(err, PipelineError::Export(_)));
    assert!(!pipeline.report().caches_persisted);
    assert!(pipeline.report().finished_at.is_some());
    assert!(matches!(pipeline.persist_caches(), Err(PipelineError::Cache(_))));
}

#[tokio::test]
async fn test_cache_failure_without_abort_is_returned() {
    let ws = Workspace::new();
    let list = three_records(&ws);

    let mut pipeline = Pipeline::from_config(&ws.config(FailurePolicy::Abort), Arc::new(RecordingClient::new())).unwrap();
    std::fs::write(ws.path("cache"), "").unwrap();

    let err = pipeline.run(&list).await.unwrap_err();
    assert!(matches!(err, PipelineError::Cache(_)));
    assert!(!pipeline.report().caches_persisted);
    assert_eq!(pipeline.report().export.exported, 3);
}

#[tokio::test]
async fn test_continue_policy_exports_the_rest() {
    let ws = Workspace::new();
    let list = three_records(&ws);
    let inner = RecordingClient::new();
    let client = FailingFor { orcid: "0000-0002-BBBB", inner: inner.clone() };

    let mut pipeline = Pipeline::from_config(&ws.config(FailurePolicy::Continue), Arc::new(client)).unwrap();
    let report = pipeline.run(&list).await.unwrap();

    assert_eq!(report.export.exported, 2);
    assert_eq!(report.export.failed, 1);
    assert_eq!(inner.transaction_count().await, 2);
}

#[tokio::test]
async fn test_auxiliary_cache_is_written_back_unchanged() {
    let ws = Workspace::new();
    seed_mit(&ws);
    let aux = json!({ "Cambridge, MA": { "lat": 42.37, "lng": -71.11 } });
    std::fs::write(ws.path("geo_cache.json"), aux.to_string()).unwrap();

    let mut config = ws.config(FailurePolicy::Abort);
    config.auxiliary_cache = Some(ws.path("geo_cache.json"));

    let mut pipeline = Pipeline::from_config(&config, Arc::new(RecordingClient::new())).unwrap();
    pipeline.run(&ids("0000-0001-AAAA")).await.unwrap();

    let written: Value = serde_json::from_str(&std::fs::read_to_string(ws.path("geo_cache.json")).unwrap()).unwrap();
    assert_eq!(written, aux);
}

#[tokio::test]
async fn test_show_does_not_touch_the_registry() {
    let ws = Workspace::new();
    seed_mit(&ws);

    let mut pipeline = Pipeline::from_config(&ws.config(FailurePolicy::Abort), Arc::new(RecordingClient::new())).unwrap();
    let record = pipeline.show("0000-0002-BBBB").await.unwrap().unwrap();

    assert_eq!(record.last_name, "Hopper");
    assert_eq!(record.employments[0].organization.org_id, "ROR123");
    assert!(pipeline.registry().is_empty());
    assert!(pipeline.show("0000-0009-ZZZZ").await.unwrap().is_none());
}

#[test]
fn test_cyclic_alias_table_is_rejected() {
    let ws = Workspace::new();
    std::fs::write(ws.path("aliases.json"), json!({ "MIT": MIT, MIT: "MIT" }).to_string()).unwrap();

    let err = Pipeline::from_config(&ws.config(FailurePolicy::Abort), Arc::new(RecordingClient::new()))
        .err()
        .unwrap();
    assert!(matches!(err, PipelineError::Alias(_)));
}
