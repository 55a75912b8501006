// Core types for pdfbrief
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a page's text was obtained. Exactly one per page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    Native,
    FallbackParser,
    Ocr,
    ExtractionFailed,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Native => "native",
            ExtractionMethod::FallbackParser => "fallback-parser",
            ExtractionMethod::Ocr => "ocr",
            ExtractionMethod::ExtractionFailed => "extraction-failed",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub index: usize,
    pub text: String,
    pub method: ExtractionMethod,
    /// Non-whitespace characters in `text`.
    pub density: usize,
}

impl Page {
    pub fn new(index: usize, text: String, method: ExtractionMethod) -> Self {
        let density = text_density(&text);
        Self {
            index,
            text,
            method,
            density,
        }
    }

    pub fn failed(index: usize) -> Self {
        Self::new(index, String::new(), ExtractionMethod::ExtractionFailed)
    }

    pub fn is_failed(&self) -> bool {
        self.method == ExtractionMethod::ExtractionFailed
    }
}

/// Count of non-whitespace characters, the density metric for OCR decisions.
pub fn text_density(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// A table recovered by the table side-channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub page: Option<usize>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Non-empty cells of each row joined into one line.
    pub fn row_texts(&self) -> impl Iterator<Item = String> + '_ {
        self.rows.iter().filter_map(|row| {
            let cells: Vec<&str> = row
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .collect();
            if cells.is_empty() {
                None
            } else {
                Some(cells.join(" | "))
            }
        })
    }
}

/// Recoverable problems recorded while building a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Diagnostic {
    PageExtractionFailed { page: usize, reason: String },
    LowDensity { page: usize, chars: usize },
    OcrUnavailable { reason: String },
    TableExtractionFailed { tool: String, reason: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::PageExtractionFailed { page, reason } => {
                write!(f, "page {} extraction failed: {}", page + 1, reason)
            }
            Diagnostic::LowDensity { page, chars } => {
                write!(f, "page {} kept with only {} characters", page + 1, chars)
            }
            Diagnostic::OcrUnavailable { reason } => write!(f, "OCR unavailable: {}", reason),
            Diagnostic::TableExtractionFailed { tool, reason } => {
                write!(f, "table extraction with {} failed: {}", tool, reason)
            }
        }
    }
}

/// Extracted document. Not mutated after extraction completes.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: Option<String>,
    pub pages: Vec<Page>,
    pub tables: Vec<Table>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Document {
    pub fn from_texts<I, S>(id: Option<String>, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pages = texts
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                let text: String = t.into();
                if text_density(&text) == 0 {
                    Page::failed(i)
                } else {
                    Page::new(i, text, ExtractionMethod::Native)
                }
            })
            .collect();
        Self {
            id,
            pages,
            tables: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// True if at least one page reached the extraction density threshold.
    pub fn has_usable_text(&self, min_chars: usize) -> bool {
        self.pages.iter().any(|p| !p.is_failed() && p.density >= min_chars.max(1))
    }
}

/// Text of one page inside a chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    pub page: usize,
    pub text: String,
}

/// Contiguous page range `[start, end]` processed as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub pages: Vec<PageText>,
}

impl Chunk {
    pub fn page_count(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Stable document-order position of a sentence: (chunk, ordinal within chunk).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SentenceId {
    pub chunk: usize,
    pub ordinal: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sentence {
    pub id: SentenceId,
    pub page: usize,
    pub text: String,
    pub score: f64,
    pub section: SectionLabel,
}

impl Sentence {
    pub fn new(id: SentenceId, page: usize, text: String) -> Self {
        Self {
            id,
            page,
            text,
            score: 0.0,
            section: SectionLabel::General,
        }
    }

    pub fn token_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Closed vocabulary of topical buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionLabel {
    Overview,
    Financials,
    Risks,
    Strategy,
    Governance,
    General,
}

impl SectionLabel {
    pub const ALL: [SectionLabel; 6] = [
        SectionLabel::Overview,
        SectionLabel::Financials,
        SectionLabel::Risks,
        SectionLabel::Strategy,
        SectionLabel::Governance,
        SectionLabel::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionLabel::Overview => "overview",
            SectionLabel::Financials => "financials",
            SectionLabel::Risks => "risks",
            SectionLabel::Strategy => "strategy",
            SectionLabel::Governance => "governance",
            SectionLabel::General => "general",
        }
    }
}

impl fmt::Display for SectionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub label: SectionLabel,
    pub sentences: Vec<SentenceId>,
    pub table_rows: Vec<String>,
}

impl Section {
    pub fn new(label: SectionLabel) -> Self {
        Self {
            label,
            sentences: Vec::new(),
            table_rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty() && self.table_rows.is_empty()
    }
}

/// Terminal artifact of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub company: Option<String>,
    pub sentences: Vec<String>,
    pub key_points: Vec<String>,
}

impl Summary {
    /// The summary paragraph: selected sentences in reading order.
    pub fn text(&self) -> String {
        self.sentences.join(" ")
    }
}

// Error types
#[derive(Debug, thiserror::Error)]
pub enum SummarizeError {
    #[error("document is unreadable: no page yielded usable text ({pages} pages tried)")]
    DocumentUnreadable { pages: usize },

    #[error("OCR is required but unavailable: {0}")]
    OcrUnavailable(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, SummarizeError>;
