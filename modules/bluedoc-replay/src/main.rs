use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bluedoc_processor::{
    load_config, BlueDocumentProcessor, Document, ProcessingResult, ProcessorConfig, Sha256Blue,
};

#[derive(Parser, Debug)]
#[command(name = "bluedoc-replay", about = "Replay a batch of events against a document")]
struct Cli {
    /// Document JSON file
    document: PathBuf,

    /// Event payloads: a JSON array, or a single payload
    events: PathBuf,

    /// Path to config TOML file (defaults to BLUEDOC_* environment variables)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Initialize the document before replaying
    #[arg(long)]
    init: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logs = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("bluedoc_processor=info".parse()?))
        .with_writer(std::io::stderr);
    if cli.json_logs {
        logs.json().init();
    } else {
        logs.init();
    }

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProcessorConfig::from_env()?,
    };
    config.log_summary();

    let mut document = Document::new(read_json(&cli.document)?);
    let payloads = match read_json(&cli.events)? {
        Value::Array(items) => items,
        single => vec![single],
    };

    let mut processor = BlueDocumentProcessor::new(Arc::new(Sha256Blue), config)?;
    let mut emitted = Vec::new();

    if cli.init {
        let initialized = processor.initialize(&document).await?;
        emitted.extend(initialized.emitted);
        document = initialized.state;
    }

    info!(events = payloads.len(), "Replaying batch");
    let result = processor.process_payloads(&document, payloads).await?;
    emitted.extend(result.emitted);

    let output = ProcessingResult {
        state: result.state,
        emitted,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {} as JSON", path.display()))
}
