// pdfbrief CLI - summarize a PDF into a paragraph and numbered key points
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pdfbrief::config::{Config, TableTool, DEFAULT_OUTPUT_DIR};
use pdfbrief::output::{self, SummaryRecord};
use pdfbrief::{SummarizeError, Summarizer};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// PDF file to summarize
    pdf_file: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for <stem>.summary.txt and <stem>.summary.json
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    out_dir: PathBuf,

    /// Override the table tool (camelot, tabula, auto, none)
    #[arg(long)]
    table_tool: Option<TableTool>,

    /// Disable OCR for image-only pages
    #[arg(long)]
    no_ocr: bool,

    /// Print the JSON record instead of the plain-text summary
    #[arg(long)]
    json: bool,

    /// Do not write output files
    #[arg(long)]
    no_write: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => Config::from_toml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    config = config.with_env_overrides().context("invalid PDFBRIEF_* environment")?;
    if let Some(tool) = args.table_tool {
        config.table_tool = tool;
    }
    if args.no_ocr {
        config.ocr.enabled = false;
        config.ocr.required = false;
    }

    let summarizer = Summarizer::new(config)?;
    let summary = match summarizer.summarize_file(&args.pdf_file) {
        Ok(summary) => summary,
        Err(e @ SummarizeError::DocumentUnreadable { .. }) => {
            anyhow::bail!("{}: {}", args.pdf_file.display(), e)
        }
        Err(e) => {
            return Err(e).with_context(|| format!("failed to summarize {}", args.pdf_file.display()))
        }
    };

    if args.json {
        println!("{}", SummaryRecord::from(&summary).to_json()?);
    } else {
        print!("{}", output::to_plain_text(&summary));
    }

    if !args.no_write {
        let stem = args
            .pdf_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        output::write_outputs(&args.out_dir, &stem, &summary)
            .with_context(|| format!("failed to write outputs to {}", args.out_dir.display()))?;
    }

    Ok(())
}
