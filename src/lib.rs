// pdfbrief - local extractive summaries and key points for PDF documents
pub mod assembler;
pub mod categorizer;
pub mod chunker;
pub mod config;
pub mod output;
pub mod pdf_extraction;
pub mod pipeline;
pub mod scorer;
pub mod segmenter;
pub mod types;

use std::path::Path;

pub use config::Config;
pub use output::SummaryRecord;
pub use pipeline::{Report, Summarizer};
pub use types::{Result, Summary, SummarizeError};

/// Summarize raw PDF bytes. The company is taken from the PDF title, if any.
pub fn summarize(bytes: &[u8], config: &Config) -> Result<Summary> {
    Summarizer::new(config.clone())?.summarize(bytes.to_vec())
}

/// Summarize a PDF on disk, using the file stem as the company identifier.
pub fn summarize_file(path: impl AsRef<Path>, config: &Config) -> Result<Summary> {
    Summarizer::new(config.clone())?.summarize_file(path.as_ref())
}
