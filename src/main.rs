use clap::{Parser, Subcommand};
use remito_ingest::IngestConfig;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Extract line items from delivery-note PDFs and inventory spreadsheets.
#[derive(Parser, Debug)]
#[command(name = "remito-ingest")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML file with layout tolerances, units and markers
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Items of a delivery-note PDF as JSON
    Remito { file: PathBuf },
    /// Items and inventory id of a spreadsheet export as JSON
    Sheet { file: PathBuf },
    /// Reconstructed text lines of a delivery-note PDF
    Lines { file: PathBuf },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // init tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cfg = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            IngestConfig::load(path)?
        }
        None => IngestConfig::default(),
    };

    match &cli.command {
        Command::Remito { file } => {
            let bytes = read_input(file)?;
            let items = remito_ingest::ingest_remito(&bytes, &cfg)?;
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        Command::Sheet { file } => {
            let bytes = read_input(file)?;
            let result = remito_ingest::ingest_spreadsheet(&bytes, &cfg)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Lines { file } => {
            let bytes = read_input(file)?;
            for page in remito_ingest::reconstruct_remito_lines(&bytes, &cfg)? {
                println!("--- Page {} ---", page.number);
                for line in &page.lines {
                    println!("{}", line.text);
                }
                if let Some(marker) = &page.stop_marker {
                    println!("--- Stopped at {marker} ---");
                }
            }
        }
    }

    Ok(())
}

fn read_input(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    info!(file = %path.display(), bytes = bytes.len(), "Read input");
    Ok(bytes)
}
