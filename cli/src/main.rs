//! affiliation-graph: command-line front end for the ORCID affiliation pipeline
//!
//! Reads a YAML config, then runs the two-pass import against a graph store
//! (or a recording client for dry runs).

use std::path::PathBuf;
use std::sync::Arc;

use affiliation_graph::{
    read_identifiers, FailurePolicy, PassStats, Pipeline, PipelineConfig, PersonRecord, RunReport,
};
use affiliation_graph_client::{GraphClient, RecordingClient, RemoteClient};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "affiliation-graph", version, about = "ORCID affiliation graph importer")]
struct Cli {
    /// Pipeline config file
    #[arg(long, default_value = "affiliation-graph.yaml", global = true, env = "AFFILIATION_GRAPH_CONFIG")]
    config: PathBuf,

    /// Graph store URL, overrides graph.url from the config
    #[arg(long, global = true, env = "AFFILIATION_GRAPH_URL")]
    url: Option<String>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Run warm-up and export over the identifier list
    Run {
        /// Record statements in memory instead of committing them
        #[arg(long)]
        dry_run: bool,

        /// Keep exporting after a graph store error
        #[arg(long)]
        continue_on_error: bool,
    },
    /// Run the warm-up pass only and list the canonical organizations
    Orgs,
    /// Resolve and parse one record
    Show {
        /// ORCID identifier
        orcid: String,
    },
    /// Ping the graph store
    Ping,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Run { dry_run, continue_on_error } => {
            run_pipeline(&cli, *dry_run, *continue_on_error).await
        }
        Commands::Orgs => run_orgs(&cli).await,
        Commands::Show { orcid } => run_show(&cli, orcid).await,
        Commands::Ping => run_ping(&cli).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(url) = cli.url.as_ref() {
        config.graph.url = url.clone();
    }
    Ok(config)
}

fn remote_client(config: &PipelineConfig) -> Result<RemoteClient> {
    RemoteClient::with_options(&config.graph.url, &config.graph.commit_path, config.graph.timeout())
        .context("building graph store client")
}

async fn run_pipeline(cli: &Cli, dry_run: bool, continue_on_error: bool) -> Result<()> {
    let mut config = load_config(cli)?;
    if continue_on_error {
        config.on_graph_error = FailurePolicy::Continue;
    }

    let recording = RecordingClient::new();
    let client: Arc<dyn GraphClient> = if dry_run {
        info!("Dry run: statements are recorded, not committed");
        Arc::new(recording.clone())
    } else {
        Arc::new(remote_client(&config)?)
    };

    let identifiers = read_identifiers(&config.identifier_list)?;
    info!("Loaded {} identifiers from {}", identifiers.len(), config.identifier_list.display());

    let mut pipeline = Pipeline::from_config(&config, client)?;
    let report = pipeline.run(&identifiers).await?;

    if dry_run {
        let transactions = recording.transactions().await;
        info!("Dry run recorded {} transactions", transactions.len());
        for statements in &transactions {
            println!("{}", serde_json::to_string(statements)?);
        }
    }

    print_report(&report, &cli.format)
}

fn stats_row(pass: &str, stats: &PassStats) -> Vec<Value> {
    vec![
        json!(pass),
        json!(stats.resolved),
        json!(stats.missing),
        json!(stats.malformed),
        json!(stats.exported),
        json!(stats.failed),
    ]
}

fn print_report(report: &RunReport, format: &OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let columns = ["pass", "resolved", "missing", "malformed", "exported", "failed"];
    let rows = vec![
        stats_row("warm-up", &report.warm_up),
        stats_row("export", &report.export),
    ];
    print_rows(&columns, &rows, format);
    if let OutputFormat::Table = format {
        println!("{} identifier(s), {} organization(s)", report.identifiers, report.organizations);
    }
    Ok(())
}

async fn run_orgs(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let identifiers = read_identifiers(&config.identifier_list)?;

    // Warm-up never commits, the recording client only satisfies the constructor
    let mut pipeline = Pipeline::from_config(&config, Arc::new(RecordingClient::new()))?;
    pipeline.warm_up(&identifiers).await;
    pipeline.persist_caches()?;

    let rows: Vec<Vec<Value>> = pipeline
        .registry()
        .iter()
        .map(|org| vec![json!(org.name), json!(org.org_id)])
        .collect();

    match cli.format {
        OutputFormat::Json => {
            let orgs: Vec<_> = pipeline.registry().iter().collect();
            println!("{}", serde_json::to_string_pretty(&orgs)?);
        }
        _ => print_rows(&["name", "org_id"], &rows, &cli.format),
    }
    Ok(())
}

async fn run_show(cli: &Cli, orcid: &str) -> Result<()> {
    let config = load_config(cli)?;
    let mut pipeline = Pipeline::from_config(&config, Arc::new(RecordingClient::new()))?;

    let Some(record) = pipeline.show(orcid).await? else {
        println!("No record for {}", orcid);
        return Ok(());
    };

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        _ => {
            println!("{} {} ({})", record.first_name, record.last_name, record.id);
            print_rows(&["organization", "org_id", "role", "start", "end"], &employment_rows(&record), &cli.format);
        }
    }
    Ok(())
}

fn employment_rows(record: &PersonRecord) -> Vec<Vec<Value>> {
    record
        .employments
        .iter()
        .map(|e| {
            vec![
                json!(e.organization.name),
                json!(e.organization.org_id),
                json!(e.role),
                json!(e.start.as_ref().map(|d| d.as_str())),
                json!(e.end.as_ref().map(|d| d.as_str())),
            ]
        })
        .collect()
}

async fn run_ping(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let client = remote_client(&config)?;
    let result = client.ping().await?;
    println!("{}", result);
    Ok(())
}

fn print_rows(columns: &[&str], rows: &[Vec<Value>], format: &OutputFormat) {
    match format {
        OutputFormat::Csv => {
            println!("{}", columns.join(","));
            for row in rows {
                let cells: Vec<String> = row.iter().map(format_csv_value).collect();
                println!("{}", cells.join(","));
            }
        }
        _ => {
            if rows.is_empty() {
                println!("(no results)");
                return;
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(columns);

            for row in rows {
                let cells: Vec<String> = row.iter().map(format_table_value).collect();
                table.add_row(cells);
            }

            println!("{}", table);
            println!("{} row(s)", rows.len());
        }
    }
}

fn format_table_value(v: &Value) -> String {
    match v {
        Value::Null => "".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Object(_) | Value::Array(_) => serde_json::to_string(v).unwrap_or_default(),
    }
}

fn format_csv_value(v: &Value) -> String {
    match v {
        Value::Null => "".to_string(),
        Value::String(s) => {
            if s.contains(',') || s.contains('"') || s.contains('\n') {
                format!("\"{}\"", s.replace('"', "\"\""))
            } else {
                s.clone()
            }
        }
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => {
            let json = serde_json::to_string(v).unwrap_or_default();
            format!("\"{}\"", json.replace('"', "\"\""))
        }
    }
}
