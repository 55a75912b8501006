// PDF extraction module
pub mod extraction_router;
pub mod fallback;
pub mod lopdf_helper;
pub mod native;
pub mod ocr_engine;
pub mod tables;

pub use extraction_router::{ExtractionResult, ExtractionRouter, TextSource};
pub use fallback::FallbackSource;
pub use lopdf_helper::LoadedPdf;
pub use native::NativeSource;
pub use ocr_engine::{OcrEngine, OcrSource, PageRasterizer};

use crate::config::Config;
use crate::types::{Diagnostic, Document, Result, SummarizeError};

/// Builds a `Document` from raw PDF bytes.
pub struct Extractor {
    router: ExtractionRouter,
    /// Diagnostics about the chain itself (e.g. OCR dropped), copied into every document.
    setup_diagnostics: Vec<Diagnostic>,
}

impl Extractor {
    /// Standard chain for `config`. A missing OCR binary is fatal only when OCR is required.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut sources: Vec<Box<dyn TextSource>> = vec![Box::new(NativeSource), Box::new(FallbackSource)];
        let mut setup_diagnostics = Vec::new();

        if config.ocr.enabled {
            if ocr_engine::command_available(&config.ocr.binary) {
                let ocr = OcrSource::from_config(&config.ocr)
                    .map_err(|e| SummarizeError::OcrUnavailable(format!("{:#}", e)))?;
                sources.push(Box::new(ocr));
            } else {
                let reason = format!("'{}' is not installed or not on PATH", config.ocr.binary);
                if config.ocr.required {
                    return Err(SummarizeError::OcrUnavailable(reason));
                }
                tracing::warn!("OCR disabled: {}", reason);
                setup_diagnostics.push(Diagnostic::OcrUnavailable { reason });
            }
        }

        Ok(Self {
            router: ExtractionRouter::new(sources, config.extraction.min_chars),
            setup_diagnostics,
        })
    }

    /// Custom chain, e.g. with an injected OCR engine.
    pub fn with_sources(sources: Vec<Box<dyn TextSource>>, min_chars: usize) -> Self {
        Self {
            router: ExtractionRouter::new(sources, min_chars),
            setup_diagnostics: Vec::new(),
        }
    }

    pub fn router(&self) -> &ExtractionRouter {
        &self.router
    }

    /// Extract all pages (and tables, if configured). Fails only when the file
    /// cannot be opened at all or no page reached the density threshold.
    pub fn extract(&self, bytes: Vec<u8>, id: Option<String>, config: &Config) -> Result<Document> {
        let pdf = LoadedPdf::from_bytes(bytes).map_err(|e| {
            tracing::error!("cannot open PDF: {:#}", e);
            SummarizeError::DocumentUnreadable { pages: 0 }
        })?;
        let id = id.or_else(|| pdf.title());

        let span = tracing::info_span!("extract", pages = pdf.page_count());
        let _guard = span.enter();

        let (pages, mut diagnostics) = self.router.extract_pages(&pdf);
        let mut all_diagnostics = self.setup_diagnostics.clone();
        all_diagnostics.append(&mut diagnostics);

        let mut document = Document {
            id,
            pages,
            tables: Vec::new(),
            diagnostics: all_diagnostics,
        };
        if !document.has_usable_text(self.router.min_chars()) {
            return Err(SummarizeError::DocumentUnreadable {
                pages: document.pages.len(),
            });
        }

        let (tables, mut table_diagnostics) = tables::extract_tables(&pdf, &document.pages, config.table_tool);
        document.tables = tables;
        document.diagnostics.append(&mut table_diagnostics);

        let failed = document.pages.iter().filter(|p| p.is_failed()).count();
        tracing::info!(
            "extracted {} pages ({} failed, {} tables)",
            document.pages.len(),
            failed,
            document.tables.len()
        );
        Ok(document)
    }
}
