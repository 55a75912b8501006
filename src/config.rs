// Configuration for pdfbrief
//
// One immutable `Config` value is built at startup (defaults, then an optional TOML file,
// then PDFBRIEF_* environment overrides) and passed by reference to every stage.
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::str::FromStr;

use crate::types::{Result, SectionLabel, SummarizeError};

pub const DEFAULT_OUTPUT_DIR: &str = "outputs/summaries";
pub const MAX_KEY_POINTS_LIMIT: usize = 10;

/// Finance-aware scoring keywords, in the syntax of [`keyword_pattern`].
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "revenue", "ebit", "ebitda", "pat", "profit*", "loss", "income", "balance sheet",
    "cash flow", "financial highlight", "risk", "outlook", "challenge", "headwind",
    "uncertaint*", "strategy", "strategic", "priority", "roadmap", "growth", "investment",
    "innovation", "market", "product", "segment",
];

/// Case-insensitive pattern for a keyword list, or `None` if the list is empty.
///
/// A plain entry matches the whole word, optionally pluralized ("risk" matches "risks"
/// but not "riskier"). An entry ending in `*` matches as a word prefix.
pub fn keyword_pattern(keywords: &[String]) -> Option<String> {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty() && *k != "*")
        .map(|k| match k.strip_suffix('*') {
            Some(stem) => regex::escape(stem),
            None => format!(r"{}(?:s|es)?\b", regex::escape(k)),
        })
        .collect();
    if alternatives.is_empty() {
        return None;
    }
    Some(format!(r"(?i)\b(?:{})", alternatives.join("|")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableTool {
    Camelot,
    Tabula,
    Auto,
    #[default]
    None,
}

impl FromStr for TableTool {
    type Err = SummarizeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "camelot" => Ok(TableTool::Camelot),
            "tabula" => Ok(TableTool::Tabula),
            "auto" => Ok(TableTool::Auto),
            "none" | "" => Ok(TableTool::None),
            other => Err(SummarizeError::InvalidConfig(format!(
                "unknown table tool '{}' (expected camelot, tabula, auto or none)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Minimum non-whitespace characters for a method's output to be accepted.
    pub min_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self { min_chars: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub enabled: bool,
    /// Abort before extraction if the OCR binary is missing.
    pub required: bool,
    pub binary: String,
    pub rasterizer_binary: String,
    pub dpi: u32,
    pub language: String,
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            required: false,
            binary: "tesseract".to_string(),
            rasterizer_binary: "pdftoppm".to_string(),
            dpi: 200,
            language: "eng".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Sentences with fewer whitespace tokens are dropped as noise.
    pub min_tokens: usize,
    /// Lines at the top and bottom of a page inspected for running headers/footers.
    pub header_footer_lines: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_tokens: 5,
            header_footer_lines: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub position: f64,
    pub chunk_position: f64,
    pub length: f64,
    pub keyword: f64,
    pub numeric: f64,
    pub cue: f64,
    pub length_optimal_min: usize,
    pub length_optimal_max: usize,
    pub keywords: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            position: 1.0,
            chunk_position: 0.3,
            length: 1.0,
            keyword: 1.5,
            numeric: 1.2,
            cue: 1.0,
            length_optimal_min: 12,
            length_optimal_max: 40,
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub max_sentences: usize,
    /// Character budget of the summary paragraph (sentences joined by single spaces).
    pub max_chars: usize,
    pub max_key_points: usize,
    pub key_point_max_chars: usize,
    /// Token-overlap similarity above which two sentences count as duplicates.
    pub duplicate_threshold: f64,
    pub section_coverage: bool,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_sentences: 8,
            max_chars: 1500,
            max_key_points: 8,
            key_point_max_chars: 240,
            duplicate_threshold: 0.7,
            section_coverage: true,
        }
    }
}

/// One ordered categorization rule.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CategoryRule {
    pub label: SectionLabel,
    pub keywords: Vec<String>,
}

impl CategoryRule {
    pub fn new(label: SectionLabel, keywords: &[&str]) -> Self {
        Self {
            label,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

pub fn default_category_rules() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new(
            SectionLabel::Financials,
            &[
                "revenue", "ebit", "ebitda", "pat", "profit*", "loss", "income",
                "balance sheet", "cash flow", "financial highlight", "earnings", "margin",
                "dividend",
            ],
        ),
        CategoryRule::new(
            SectionLabel::Risks,
            &["risk", "outlook", "challenge", "headwind", "uncertaint*", "exposure"],
        ),
        CategoryRule::new(
            SectionLabel::Strategy,
            &[
                "strategy", "strategic", "priority", "roadmap", "growth", "investment",
                "innovation", "market", "product", "segment",
            ],
        ),
        CategoryRule::new(
            SectionLabel::Governance,
            &["board", "director", "governance", "shareholder", "audit committee"],
        ),
        CategoryRule::new(
            SectionLabel::Overview,
            &["overview", "about us", "company profile", "headquarter*", "founded", "mission"],
        ),
    ]
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub table_tool: TableTool,
    pub chunk_pages_min: usize,
    pub chunk_pages_max: usize,
    pub remove_headers_footers: bool,
    /// Process chunks on the rayon pool.
    pub parallel: bool,
    pub extraction: ExtractionConfig,
    pub ocr: OcrConfig,
    pub segmenter: SegmenterConfig,
    pub scoring: ScoringConfig,
    pub summary: SummaryConfig,
    pub categories: Vec<CategoryRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table_tool: TableTool::None,
            chunk_pages_min: 1,
            chunk_pages_max: 3,
            remove_headers_footers: true,
            parallel: true,
            extraction: ExtractionConfig::default(),
            ocr: OcrConfig::default(),
            segmenter: SegmenterConfig::default(),
            scoring: ScoringConfig::default(),
            summary: SummaryConfig::default(),
            categories: default_category_rules(),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Apply PDFBRIEF_* environment overrides on top of this config.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PDFBRIEF_TABLE_TOOL") {
            self.table_tool = v.parse()?;
        }
        if let Some(v) = lookup("PDFBRIEF_CHUNK_PAGES_MIN") {
            self.chunk_pages_min = parse_var("PDFBRIEF_CHUNK_PAGES_MIN", &v)?;
        }
        if let Some(v) = lookup("PDFBRIEF_CHUNK_PAGES_MAX") {
            self.chunk_pages_max = parse_var("PDFBRIEF_CHUNK_PAGES_MAX", &v)?;
        }
        if let Some(v) = lookup("PDFBRIEF_REMOVE_HEADERS_FOOTERS") {
            self.remove_headers_footers = parse_bool("PDFBRIEF_REMOVE_HEADERS_FOOTERS", &v)?;
        }
        if let Some(v) = lookup("PDFBRIEF_OCR") {
            self.ocr.enabled = parse_bool("PDFBRIEF_OCR", &v)?;
        }
        if let Some(v) = lookup("PDFBRIEF_OCR_REQUIRED") {
            self.ocr.required = parse_bool("PDFBRIEF_OCR_REQUIRED", &v)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(SummarizeError::InvalidConfig(msg));

        if self.chunk_pages_min == 0 {
            return invalid("chunk_pages_min must be at least 1".into());
        }
        if self.chunk_pages_min > self.chunk_pages_max {
            return invalid(format!(
                "chunk_pages_min ({}) exceeds chunk_pages_max ({})",
                self.chunk_pages_min, self.chunk_pages_max
            ));
        }
        if !(0.0..=1.0).contains(&self.summary.duplicate_threshold) {
            return invalid("summary.duplicate_threshold must be within [0, 1]".into());
        }
        if self.summary.max_sentences == 0 || self.summary.max_chars == 0 {
            return invalid("summary budgets must be positive".into());
        }
        if self.summary.max_key_points > MAX_KEY_POINTS_LIMIT {
            return invalid(format!(
                "summary.max_key_points must not exceed {}",
                MAX_KEY_POINTS_LIMIT
            ));
        }
        if self.scoring.length_optimal_min > self.scoring.length_optimal_max {
            return invalid("scoring.length_optimal_min exceeds length_optimal_max".into());
        }
        if self.ocr.required && !self.ocr.enabled {
            return invalid("ocr.required is set but OCR is disabled".into());
        }
        if self.categories.iter().any(|r| r.label == SectionLabel::General) {
            return invalid("'general' is the fallback section and cannot have rules".into());
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SummarizeError::InvalidConfig(format!("{} has invalid value '{}'", key, value)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SummarizeError::InvalidConfig(format!(
            "{} has invalid boolean '{}'",
            key, value
        ))),
    }
}
