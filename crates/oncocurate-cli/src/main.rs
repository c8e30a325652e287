//! Oncocurate - evidence curation pipeline CLI
//!
//! The `oncocurate` command runs the standard curation catalogue over a
//! publication and inspects or re-validates its results.
//!
//! ## Commands
//!
//! - `run`: Curate a document with scripted stages and print the result
//! - `graph`: Print the phase plan of the standard catalogue
//! - `validate`: Validate (and optionally resolve) a flat field map
//! - `replay`: Print a stored result artifact after verifying its digest

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use oncocurate_core::telemetry::{init_tracing, LogFormat};
use oncocurate_core::{
    read_result_artifact, write_result_artifact, AuditTrace, CommittedFields, ConfidenceAggregator,
    ConfidenceReport, ConflictResolver, Document, EvidenceRecord, FixRegistry, PipelineConfig,
    PipelineResult, Resolution, SectionSpan, ValidationReport, Validator,
};
use oncocurate_stages::catalogue::PlannedPhase;
use oncocurate_stages::{phase_plan, standard_graph, CatalogueBuilder, FixtureSet, HttpOntologyConnector};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

const DEFAULT_RUNS_DIR: &str = ".oncocurate/runs";

#[derive(Parser)]
#[command(name = "oncocurate")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Clinical-genomic evidence curation pipeline", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Curate one document through the standard catalogue
    Run(RunArgs),

    /// Print the phase plan of the standard catalogue
    Graph {
        /// Pipeline config (TOML) to validate alongside the graph
        #[arg(short, long, env = "ONCOCURATE_CONFIG")]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Validate a flat field map, optionally running automated fixes
    Validate {
        /// Path to the record (JSON object of field -> value)
        #[arg(short, long)]
        record: PathBuf,

        /// Run the conflict resolver and report fixes and the review queue
        #[arg(long)]
        resolve: bool,

        /// Pipeline config (TOML)
        #[arg(short, long, env = "ONCOCURATE_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Print a stored result artifact after verifying its digest
    Replay {
        /// Run ID to replay
        #[arg(long)]
        run: String,

        /// Root directory containing run artifacts (default: .oncocurate/runs)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
struct RunArgs {
    /// Path to the publication text
    #[arg(short, long)]
    document: PathBuf,

    /// Section spans (JSON object of name -> {"start", "end"})
    #[arg(long)]
    sections: Option<PathBuf>,

    /// Seed fields (JSON object of field -> value), committed at confidence 1.0
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Scripted stage outputs keyed by task id
    #[arg(short, long, env = "ONCOCURATE_FIXTURES")]
    fixtures: PathBuf,

    /// Pipeline config (TOML)
    #[arg(short, long, env = "ONCOCURATE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory to write the result artifact to
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Base URL of an ontology lookup service for normalization tasks
    #[arg(long, env = "ONCOCURATE_ONTOLOGY_URL")]
    ontology_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_tracing(format, level);

    match cli.command {
        Commands::Run(args) => cmd_run(&args).await,
        Commands::Graph { config, format } => cmd_graph(config.as_deref(), format),
        Commands::Validate {
            record,
            resolve,
            config,
        } => cmd_validate(&record, resolve, config.as_deref()),
        Commands::Replay { run, dir } => cmd_replay(&run, dir.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path)),
        None => Ok(PipelineConfig::default()),
    }
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_slice(&bytes).with_context(|| format!("Invalid JSON in {:?}", path))
}

/// Field map from a JSON object file. Null values are dropped.
fn load_field_map(path: &Path) -> Result<CommittedFields> {
    let value: Value = read_json_file(path)?;
    let Value::Object(map) = value else {
        bail!("Expected a JSON object of fields in {:?}", path);
    };
    Ok(map.into_iter().filter(|(_, v)| !v.is_null()).collect())
}

fn load_document(path: &Path, sections: Option<&Path>) -> Result<Document> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document {:?}", path))?;
    match sections {
        Some(sections_path) => {
            let spans: BTreeMap<String, SectionSpan> = read_json_file(sections_path)?;
            Document::with_sections(text, spans)
                .with_context(|| format!("Invalid sections in {:?}", sections_path))
        }
        None => Ok(Document::new(text)),
    }
}

/// Build and run the pipeline described by `args`; Ctrl-C cancels the run.
async fn execute_run(args: &RunArgs, cancel: CancellationToken) -> Result<PipelineResult> {
    let config = load_config(args.config.as_deref())?;
    let document = load_document(&args.document, args.sections.as_deref())?;
    let seeds = match &args.seed {
        Some(path) => load_field_map(path)?,
        None => CommittedFields::new(),
    };
    let fixtures = FixtureSet::load(&args.fixtures)
        .with_context(|| format!("Failed to load fixtures {:?}", args.fixtures))?;

    let mut builder = CatalogueBuilder::new().fixtures(fixtures).config(config);
    if let Some(url) = &args.ontology_url {
        let connector = HttpOntologyConnector::new(url.as_str())
            .with_context(|| format!("Failed to create ontology connector for {url}"))?;
        builder = builder.connector(Arc::new(connector));
    }
    let pipeline = builder.build().context("Failed to build curation pipeline")?;

    let result = pipeline.run_with_cancel(document, seeds, cancel).await;

    if let Some(dir) = &args.out {
        let path = write_result_artifact(&result, dir)
            .with_context(|| format!("Failed to write result artifact under {:?}", dir))?;
        info!(run_id = %result.run_id, path = %path.display(), "result artifact written");
    }
    Ok(result)
}

async fn cmd_run(args: &RunArgs) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling run");
            on_signal.cancel();
        }
    });

    let result = execute_run(args, cancel).await?;
    info!(
        run_id = %result.run_id,
        state = %result.state,
        review_items = result.review_queue.len(),
        confidence = result.overall_confidence(),
        "run complete"
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn render_plan_text(plan: &[PlannedPhase]) -> String {
    let mut out = String::new();
    for phase in plan {
        out.push_str(&format!("Phase {} ({})\n", phase.ordinal, phase.name));
        for task in &phase.tasks {
            out.push_str(&format!("  {} [{}]", task.id, task.kind));
            if !task.inputs.is_empty() {
                out.push_str(&format!(" <- {}", task.inputs.join(", ")));
            }
            out.push_str(&format!(" -> {}", task.outputs.join(", ")));
            if let Some(condition) = &task.condition {
                out.push_str(&format!(" when {condition}"));
            }
            if task.idempotent {
                out.push_str(" (retryable)");
            }
            out.push('\n');
        }
    }
    out
}

fn cmd_graph(config: Option<&Path>, format: OutputFormat) -> Result<()> {
    let config = load_config(config)?;
    let graph = standard_graph().context("Standard catalogue failed to load")?;
    let plan = phase_plan(&graph);
    info!(
        tasks = graph.len(),
        phases = plan.len(),
        max_concurrent = config.orchestrator.max_concurrent,
        "catalogue loaded"
    );

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        OutputFormat::Text => print!("{}", render_plan_text(&plan)),
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ValidateOutput {
    Report {
        validation: ValidationReport,
        confidence: ConfidenceReport,
    },
    Resolved(Resolution),
}

fn validate_record(record_path: &Path, resolve: bool, config: &PipelineConfig) -> Result<ValidateOutput> {
    let fields = load_field_map(record_path)?;
    let mut record = EvidenceRecord::from_seeds(fields)
        .with_context(|| format!("Invalid record in {:?}", record_path))?;

    let validator = Validator::standard().with_weights(config.completeness);
    let aggregator = ConfidenceAggregator::new(config.confidence.clone());
    if !resolve {
        return Ok(ValidateOutput::Report {
            validation: validator.validate(&record),
            confidence: aggregator.assess(&record),
        });
    }

    let resolver = ConflictResolver::new(
        validator,
        aggregator,
        FixRegistry::standard(),
        config.resolution.clone(),
    );
    let mut audit = AuditTrace::new();
    Ok(ValidateOutput::Resolved(resolver.resolve(
        "validate",
        &mut record,
        &mut audit,
        &[],
    )))
}

fn cmd_validate(record: &Path, resolve: bool, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let output = validate_record(record, resolve, &config)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn cmd_replay(run_id: &str, dir: Option<&Path>) -> Result<()> {
    let root = dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RUNS_DIR));
    let result = read_result_artifact(run_id, &root)
        .with_context(|| format!("Failed to replay run {} from {:?}", run_id, root))?;
    info!(run_id = %run_id, state = %result.state, "replay digest verified");
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
