// Groups consecutive pages into bounded chunks
use crate::types::{Chunk, Page, PageText};

/// Split `pages` into windows of `max_pages`; the last window takes the remainder.
///
/// Every chunk but the last has exactly `max_pages >= min_pages` pages, so only the
/// final chunk can fall below `min_pages`. Fewer pages than `min_pages` give one chunk.
pub fn chunk_pages(pages: &[Page], min_pages: usize, max_pages: usize) -> Vec<Chunk> {
    debug_assert!(min_pages >= 1 && min_pages <= max_pages);
    let window = max_pages.max(1);

    pages
        .chunks(window)
        .enumerate()
        .map(|(index, window)| Chunk {
            index,
            start: window[0].index,
            end: window[window.len() - 1].index,
            pages: window
                .iter()
                .map(|p| PageText {
                    page: p.index,
                    text: p.text.clone(),
                })
                .collect(),
        })
        .collect()
}
