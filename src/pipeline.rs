// Pipeline orchestration: extract -> chunk -> (segment, score, categorize) per chunk -> assemble
use rayon::prelude::*;
use std::path::Path;
use std::time::Instant;

use crate::assembler;
use crate::categorizer::Categorizer;
use crate::chunker::chunk_pages;
use crate::config::Config;
use crate::pdf_extraction::Extractor;
use crate::scorer::Scorer;
use crate::segmenter::{dedup_exact, prepare_pages, segment_chunk};
use crate::types::{Chunk, Document, Result, Section, Sentence, SummarizeError, Summary};

/// Everything the pipeline produced for one document.
#[derive(Debug, Clone)]
pub struct Report {
    pub document: Document,
    /// Scored, labelled sentences in document order.
    pub sentences: Vec<Sentence>,
    pub sections: Vec<Section>,
    pub summary: Summary,
}

/// Owns the configuration and the stages built from it. Reusable across documents.
pub struct Summarizer {
    config: Config,
    extractor: Extractor,
    scorer: Scorer,
    categorizer: Categorizer,
}

impl Summarizer {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let extractor = Extractor::from_config(&config)?;
        Self::with_extractor(config, extractor)
    }

    /// Use a custom extraction chain (e.g. an injected OCR engine).
    pub fn with_extractor(config: Config, extractor: Extractor) -> Result<Self> {
        config.validate()?;
        let scorer = Scorer::new(&config.scoring);
        let categorizer = Categorizer::new(&config.categories)?;
        Ok(Self {
            config,
            extractor,
            scorer,
            categorizer,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn summarize(&self, bytes: Vec<u8>) -> Result<Summary> {
        Ok(self.report(bytes, None)?.summary)
    }

    /// Summarize a file on disk; the file stem becomes the company identifier.
    pub fn summarize_file(&self, path: &Path) -> Result<Summary> {
        Ok(self.report_file(path)?.summary)
    }

    pub fn report_file(&self, path: &Path) -> Result<Report> {
        let bytes = std::fs::read(path)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty());
        self.report(bytes, stem)
    }

    pub fn report(&self, bytes: Vec<u8>, id: Option<String>) -> Result<Report> {
        let start = Instant::now();
        let document = self.extractor.extract(bytes, id, &self.config)?;
        let report = self.summarize_document(document);
        if report.summary.sentences.is_empty() {
            tracing::error!("no sentence survived segmentation");
            return Err(SummarizeError::DocumentUnreadable {
                pages: report.document.pages.len(),
            });
        }
        tracing::info!(
            "summarized {} pages in {}ms",
            report.document.pages.len(),
            start.elapsed().as_millis()
        );
        Ok(report)
    }

    /// Run every stage after extraction on an already extracted document.
    pub fn summarize_document(&self, document: Document) -> Report {
        let span = tracing::info_span!("summarize", id = document.id.as_deref().unwrap_or("-"));
        let _guard = span.enter();

        for diagnostic in &document.diagnostics {
            tracing::warn!("{}", diagnostic);
        }

        let pages = prepare_pages(&document.pages, &self.config);
        let chunks = chunk_pages(&pages, self.config.chunk_pages_min, self.config.chunk_pages_max);
        let total = chunks.len();
        tracing::debug!("{} pages in {} chunks", pages.len(), total);

        // Indexed collect keeps chunk order, so the merge is deterministic either way.
        let per_chunk: Vec<Vec<Sentence>> = if self.config.parallel {
            chunks.par_iter().map(|chunk| self.process_chunk(chunk, total)).collect()
        } else {
            chunks.iter().map(|chunk| self.process_chunk(chunk, total)).collect()
        };
        let sentences = dedup_exact(per_chunk.into_iter().flatten().collect());

        let sections = self.categorizer.sections(&sentences, &document.tables);
        let summary = assembler::assemble(document.id.clone(), &sentences, &sections, &self.config.summary);

        Report {
            document,
            sentences,
            sections,
            summary,
        }
    }

    fn process_chunk(&self, chunk: &Chunk, chunks: usize) -> Vec<Sentence> {
        let span = tracing::debug_span!("chunk", index = chunk.index, start = chunk.start, end = chunk.end);
        let _guard = span.enter();

        let mut sentences = segment_chunk(chunk, self.config.segmenter.min_tokens);
        self.scorer.score_chunk(&mut sentences, chunks);
        self.categorizer.categorize(&mut sentences);
        tracing::debug!("{} candidate sentences", sentences.len());
        sentences
    }
}
