// Per-page extraction through an ordered chain of text sources
//
// Sources are tried in order (native text layer, secondary parser, OCR). The first
// result whose text density reaches `min_chars` wins. Failures of a single source or
// a single page are recorded as diagnostics and never abort the document.
use anyhow::Result;
use std::time::Instant;

use super::lopdf_helper::LoadedPdf;
use crate::types::{text_density, Diagnostic, ExtractionMethod, Page};

/// One provider in the fallback chain.
pub trait TextSource: Send + Sync {
    fn method(&self) -> ExtractionMethod;
    fn extract(&self, pdf: &LoadedPdf, page_index: usize) -> Result<String>;
}

/// Outcome of one source on one page.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub text: String,
    pub method: ExtractionMethod,
    pub density: usize,
    pub extraction_time_ms: u64,
}

impl ExtractionResult {
    pub fn new(text: String, method: ExtractionMethod) -> Self {
        let density = text_density(&text);
        Self {
            text,
            method,
            density,
            extraction_time_ms: 0,
        }
    }
}

pub struct ExtractionRouter {
    sources: Vec<Box<dyn TextSource>>,
    min_chars: usize,
}

impl ExtractionRouter {
    pub fn new(sources: Vec<Box<dyn TextSource>>, min_chars: usize) -> Self {
        Self { sources, min_chars }
    }

    pub fn min_chars(&self) -> usize {
        self.min_chars
    }

    pub fn methods(&self) -> Vec<ExtractionMethod> {
        self.sources.iter().map(|s| s.method()).collect()
    }

    fn is_acceptable(&self, result: &ExtractionResult) -> bool {
        result.density >= self.min_chars
    }

    /// Run the chain on one page. Never fails: an unusable page comes back
    /// as `extraction-failed` with a diagnostic.
    pub fn extract_page(&self, pdf: &LoadedPdf, page_index: usize) -> (Page, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let mut best: Option<ExtractionResult> = None;
        let mut errors = Vec::new();

        for source in &self.sources {
            let method = source.method();
            let start = Instant::now();
            match source.extract(pdf, page_index) {
                Ok(text) => {
                    let mut result = ExtractionResult::new(text, method);
                    result.extraction_time_ms = start.elapsed().as_millis() as u64;
                    tracing::debug!(
                        page = page_index + 1,
                        %method,
                        chars = result.density,
                        ms = result.extraction_time_ms,
                        "extraction attempt"
                    );
                    if self.is_acceptable(&result) {
                        return (
                            Page::new(page_index, result.text, method),
                            diagnostics,
                        );
                    }
                    if best.as_ref().map_or(true, |b| result.density > b.density) {
                        best = Some(result);
                    }
                }
                Err(e) => {
                    tracing::debug!(page = page_index + 1, %method, "extraction attempt failed: {:#}", e);
                    errors.push(format!("{}: {:#}", method, e));
                }
            }
        }

        match best {
            Some(result) if result.density > 0 => {
                tracing::info!(
                    "page {} below density threshold ({} < {}), keeping {} text",
                    page_index + 1,
                    result.density,
                    self.min_chars,
                    result.method
                );
                diagnostics.push(Diagnostic::LowDensity {
                    page: page_index,
                    chars: result.density,
                });
                (Page::new(page_index, result.text, result.method), diagnostics)
            }
            _ => {
                let reason = if errors.is_empty() {
                    "no text found".to_string()
                } else {
                    errors.join("; ")
                };
                tracing::warn!("page {} extraction failed: {}", page_index + 1, reason);
                diagnostics.push(Diagnostic::PageExtractionFailed {
                    page: page_index,
                    reason,
                });
                (Page::failed(page_index), diagnostics)
            }
        }
    }

    /// Extract every page in order.
    pub fn extract_pages(&self, pdf: &LoadedPdf) -> (Vec<Page>, Vec<Diagnostic>) {
        let mut pages = Vec::with_capacity(pdf.page_count());
        let mut diagnostics = Vec::new();
        for index in 0..pdf.page_count() {
            let (page, mut diags) = self.extract_page(pdf, index);
            pages.push(page);
            diagnostics.append(&mut diags);
        }
        (pages, diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use lopdf::{dictionary, Document, Object};

    struct Fixed(ExtractionMethod, Vec<Option<&'static str>>);

    impl TextSource for Fixed {
        fn method(&self) -> ExtractionMethod {
            self.0
        }
        fn extract(&self, _pdf: &LoadedPdf, page_index: usize) -> Result<String> {
            match self.1.get(page_index).copied().flatten() {
                Some(text) => Ok(text.to_string()),
                None => bail!("nothing here"),
            }
        }
    }

    fn blank_pdf(pages: usize) -> LoadedPdf {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = (0..pages)
            .map(|_| {
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                })
                .into()
            })
            .collect();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        LoadedPdf::from_bytes(bytes).unwrap()
    }

    const LONG: &str = "Revenue grew strongly across every segment this year.";

    #[test]
    fn test_first_acceptable_source_wins() {
        let router = ExtractionRouter::new(
            vec![
                Box::new(Fixed(ExtractionMethod::Native, vec![Some("tiny")])),
                Box::new(Fixed(ExtractionMethod::FallbackParser, vec![Some(LONG)])),
                Box::new(Fixed(ExtractionMethod::Ocr, vec![Some(LONG)])),
            ],
            20,
        );
        let (page, diags) = router.extract_page(&blank_pdf(1), 0);
        assert_eq!(page.method, ExtractionMethod::FallbackParser);
        assert_eq!(page.text, LONG);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_dense_native_never_reaches_ocr() {
        let router = ExtractionRouter::new(
            vec![
                Box::new(Fixed(ExtractionMethod::Native, vec![Some(LONG)])),
                Box::new(Fixed(ExtractionMethod::Ocr, vec![Some("ocr text that is long enough")])),
            ],
            20,
        );
        let (page, _) = router.extract_page(&blank_pdf(1), 0);
        assert_eq!(page.method, ExtractionMethod::Native);
    }

    #[test]
    fn test_low_density_keeps_best_candidate() {
        let router = ExtractionRouter::new(
            vec![
                Box::new(Fixed(ExtractionMethod::Native, vec![Some("ab")])),
                Box::new(Fixed(ExtractionMethod::FallbackParser, vec![Some("abc def")])),
            ],
            20,
        );
        let (page, diags) = router.extract_page(&blank_pdf(1), 0);
        assert_eq!(page.method, ExtractionMethod::FallbackParser);
        assert_eq!(diags, vec![Diagnostic::LowDensity { page: 0, chars: 6 }]);
    }

    #[test]
    fn test_all_sources_fail_flags_page() {
        let router = ExtractionRouter::new(
            vec![
                Box::new(Fixed(ExtractionMethod::Native, vec![None, Some(LONG)])),
                Box::new(Fixed(ExtractionMethod::FallbackParser, vec![Some("   ")])),
            ],
            20,
        );
        let (pages, diags) = router.extract_pages(&blank_pdf(2));
        assert!(pages[0].is_failed());
        assert_eq!(pages[1].method, ExtractionMethod::Native);
        assert!(matches!(
            &diags[0],
            Diagnostic::PageExtractionFailed { page: 0, reason } if reason.contains("nothing here")
        ));
    }

    /// OCR stand-in whose external command never finishes in time.
    #[cfg(unix)]
    struct Stalled(crate::pdf_extraction::ocr_engine::CommandRunner);

    #[cfg(unix)]
    impl TextSource for Stalled {
        fn method(&self) -> ExtractionMethod {
            ExtractionMethod::Ocr
        }
        fn extract(&self, _pdf: &LoadedPdf, _page_index: usize) -> Result<String> {
            let output = self.0.run("sleep", &["5".to_string()])?;
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_ocr_timeout_fails_only_that_page() {
        use crate::pdf_extraction::ocr_engine::CommandRunner;
        use std::time::Duration;

        let runner = CommandRunner::new(Duration::from_millis(200)).unwrap();
        let router = ExtractionRouter::new(
            vec![
                Box::new(Fixed(ExtractionMethod::Native, vec![Some(LONG), Some("")])),
                Box::new(Stalled(runner)),
            ],
            20,
        );
        let (pages, diags) = router.extract_pages(&blank_pdf(2));
        assert_eq!(pages[0].method, ExtractionMethod::Native);
        assert_eq!(pages[1].method, ExtractionMethod::ExtractionFailed);
        assert!(matches!(
            diags.as_slice(),
            [Diagnostic::PageExtractionFailed { page: 1, reason }] if reason.contains("timed out")
        ));
    }
}
