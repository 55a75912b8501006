// Secondary parser: pdf-extract, run once per document and sliced by page
use anyhow::{anyhow, Result};

use super::extraction_router::TextSource;
use super::lopdf_helper::LoadedPdf;
use crate::types::ExtractionMethod;

pub struct FallbackSource;

impl TextSource for FallbackSource {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::FallbackParser
    }

    fn extract(&self, pdf: &LoadedPdf, page_index: usize) -> Result<String> {
        let pages = pdf.fallback_pages()?;
        pages
            .get(page_index)
            .cloned()
            .ok_or_else(|| anyhow!("pdf-extract returned {} pages, no page {}", pages.len(), page_index + 1))
    }
}
