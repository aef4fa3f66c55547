//! Collector Service - fetches the CVM compensation extract once
//!
//! Responsibilities:
//! - Fetch the configured source (URL or local file)
//! - Store the raw bytes under their content hash
//! - Normalize and print the load summary
//!
//! Usage:
//!   cargo run --bin cvm-collector
//!   cargo run --bin cvm-collector -- --source ./dados.csv --output canonical.csv

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cvm_collector::{fetch_source, save_to_fs, Config, DatasetCache, DatasetState, SourceLocation};

#[derive(Parser, Debug)]
#[command(name = "cvm-collector", about = "Fetches and normalizes the CVM compensation extract")]
struct Args {
    /// URL or path of the raw extract (defaults to CVM_DATA_URL)
    #[arg(long)]
    source: Option<String>,

    /// Directory for raw artifacts (defaults to RAW_FS_DIR)
    #[arg(long)]
    raw_dir: Option<PathBuf>,

    /// Don't store the raw artifact
    #[arg(long, default_value = "false")]
    no_store: bool,

    /// Write the canonical table here as CSV
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the normalization report as JSON
    #[arg(long, default_value = "false")]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    cvm_parser::logging::init("cvm_collector=info,cvm_parser=info");
    let args = Args::parse();
    let mut config = Config::from_env()?;

    if let Some(source) = &args.source {
        config.data_source = SourceLocation::parse(source);
    }
    if let Some(dir) = &args.raw_dir {
        config.raw_fs_dir = dir.clone();
    }

    println!("=== CVM Compensation Collector ===");
    println!("Source: {}", config.data_source);

    let client = config.http_client()?;
    let fetched = fetch_source(&client, &config.data_source).await;

    if let Ok(artifact) = &fetched {
        println!("Downloaded: {} bytes", artifact.size_bytes);
        println!("Hash: {}", artifact.content_hash);
        if !args.no_store {
            let path = save_to_fs(&config.raw_fs_dir, artifact).await?;
            println!("Saved to: {}", path.display());
        }
    }

    let mut cache = DatasetCache::new(config.data_source.clone());
    let entry = cache.install(fetched);

    let dataset = match &entry.state {
        DatasetState::Ready(dataset) => dataset.clone(),
        DatasetState::Failed { reason } => {
            anyhow::bail!("No data available: {}", reason);
        }
    };

    let report = &dataset.report;
    println!("\nLoad ID: {}", entry.load_id);
    println!("Encoding: {}", report.encoding.unwrap_or("workbook"));
    println!("Rows: {}", dataset.table.len());
    println!("Columns: {} ({} passthrough)", dataset.table.columns().len(), report.passthrough.len());

    let years = dataset.table.all().years();
    if let (Some(first), Some(last)) = (years.first(), years.last()) {
        println!("Years: {}..={}", first, last);
    }

    if !report.warnings.is_empty() {
        println!("\nWarnings ({}):", report.warnings.len());
        for (i, warning) in report.warnings.iter().enumerate() {
            println!("  [{}] {}", i + 1, warning);
        }
    }

    if let Some(path) = &args.output {
        let csv = dataset.table.to_csv_bytes()?;
        std::fs::write(path, csv).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("\nCanonical table written to {}", path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(report)?);
    }

    println!("\n=== Collection Complete ===");
    Ok(())
}
