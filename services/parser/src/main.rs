//! Parser CLI - normalizes a raw CVM compensation extract from disk
//!
//! Reads a CSV or workbook, reconciles it against the canonical schema and
//! prints the column mapping. Optionally writes the canonical table as CSV
//! and the normalization report as JSON.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cvm_parser::normalize::{ColumnSource, Normalized};
use cvm_parser::schema::{FieldKind, SCHEMA};

#[derive(Parser, Debug)]
#[command(name = "cvm-parser", about = "Normalizes a raw CVM compensation extract")]
struct Args {
    /// Raw extract (CSV, XLS or XLSX)
    #[arg(long)]
    input: PathBuf,

    /// Write the canonical table here as CSV
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write the normalization report here as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Fail instead of producing an empty table when the source can't be parsed
    #[arg(long, default_value = "false")]
    strict: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    cvm_parser::logging::init("cvm_parser=info");
    let args = Args::parse();

    println!("=== CVM Compensation Parser ===");
    println!("Input: {}", args.input.display());

    let bytes = fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    println!("Content size: {} bytes", bytes.len());

    let normalized = if args.strict {
        cvm_parser::normalize(&bytes).context("Normalization failed")?
    } else {
        cvm_parser::normalize_or_empty(&bytes)
    };

    print_summary(&normalized);

    if let Some(path) = &args.output {
        let csv = normalized.table.to_csv_bytes()?;
        fs::write(path, csv).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("\nCanonical table written to {}", path.display());
    }

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&normalized.report)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    if !normalized.is_available() {
        println!("\nNo data available");
    }
    Ok(())
}

fn print_summary(normalized: &Normalized) {
    let report = &normalized.report;

    if let Some(reason) = &report.failure {
        println!("\nParse failed: {}", reason);
        return;
    }

    println!("Encoding: {}", report.encoding.unwrap_or("workbook"));
    println!("Rows: {}", report.rows);

    println!("\nColumn mapping:");
    for resolution in &report.resolutions {
        let origin = match &resolution.source {
            ColumnSource::Canonical => "(canonical)".to_string(),
            ColumnSource::Alias { header } => header.clone(),
            ColumnSource::Position { offset, header } => format!("[{}] {} (by position)", offset, header),
            ColumnSource::Synthesized => "-".to_string(),
        };
        println!("  {:28} <- {}", resolution.field, origin);
    }

    if !report.passthrough.is_empty() {
        println!("\nPassthrough columns ({}):", report.passthrough.len());
        for name in &report.passthrough {
            println!("  {}", name);
        }
    }

    if !report.warnings.is_empty() {
        println!("\nWarnings ({}):", report.warnings.len());
        for (i, warning) in report.warnings.iter().take(10).enumerate() {
            println!("  [{}] {}", i + 1, warning);
        }
        if report.warnings.len() > 10 {
            println!("  ... and {} more", report.warnings.len() - 10);
        }
    }

    let numeric = SCHEMA.iter().filter(|f| f.kind == FieldKind::Numeric).count();
    println!(
        "\nCoerced {} numeric cells to zero across {} numeric columns",
        report.coerced_cells, numeric
    );
    println!("Rows without a usable year: {}", report.invalid_years);

    let years = normalized.table.all().years();
    if let (Some(first), Some(last)) = (years.first(), years.last()) {
        println!("Years covered: {}..={}", first, last);
    }
}
