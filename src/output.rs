// Plain-text and JSON renderings of a Summary
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::{Result, Summary};

/// Structured form of a summary: the three stable fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub company: Option<String>,
    pub summary: String,
    pub key_points: Vec<String>,
}

impl From<&Summary> for SummaryRecord {
    fn from(summary: &Summary) -> Self {
        Self {
            company: summary.company.clone(),
            summary: summary.text(),
            key_points: summary.key_points.clone(),
        }
    }
}

impl SummaryRecord {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Title block, summary paragraph, then numbered key points.
pub fn to_plain_text(summary: &Summary) -> String {
    let mut out = String::new();
    if let Some(company) = &summary.company {
        let title = format!("{} — Summary", company);
        out.push_str(&title);
        out.push('\n');
        out.push_str(&"=".repeat(title.chars().count()));
        out.push_str("\n\n");
    }

    out.push_str("Summary\n-------\n");
    out.push_str(&summary.text());
    out.push_str("\n\n");

    out.push_str("Key Points\n----------\n");
    for (i, point) in summary.key_points.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, point));
    }
    out
}

/// Paths written by `write_outputs`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFiles {
    pub text: PathBuf,
    pub json: PathBuf,
}

/// Write `<stem>.summary.txt` and `<stem>.summary.json` into `dir`, creating it if needed.
pub fn write_outputs(dir: &Path, stem: &str, summary: &Summary) -> Result<OutputFiles> {
    fs::create_dir_all(dir)?;
    let files = OutputFiles {
        text: dir.join(format!("{}.summary.txt", stem)),
        json: dir.join(format!("{}.summary.json", stem)),
    };
    fs::write(&files.text, to_plain_text(summary))?;
    fs::write(&files.json, SummaryRecord::from(summary).to_json()?)?;
    tracing::info!("wrote {} and {}", files.text.display(), files.json.display());
    Ok(files)
}
