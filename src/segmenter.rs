// Sentence segmentation and page-text normalization
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::config::Config;
use crate::types::{Chunk, Page, Sentence, SentenceId};

static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").unwrap());
static MANY_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static INLINE_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\t\u{00A0}]+").unwrap());
static BOILERPLATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*\d+\s*$|\b(page|annual report|confidential|draft)\b|https?://").unwrap()
});

const MAX_EDGE_LINE_CHARS: usize = 120;
const MAX_BOILERPLATE_TOKENS: usize = 8;

/// Words that end in '.' without ending a sentence, in any case.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "inc", "ltd", "corp", "plc", "pvt",
    "llc", "vs", "etc", "approx", "fig", "figs", "vol", "rs", "jan", "feb", "apr", "jun",
    "jul", "aug", "sep", "sept", "oct", "nov", "dec",
];

/// CRLF/CR to LF, tabs and NBSP to spaces, at most one blank line in a row.
pub fn normalize_whitespace(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = INLINE_SPACE.replace_all(&text, " ");
    let text = MANY_NEWLINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

fn collapse(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Key for "near-identical" edge lines: case-folded, digits masked so
/// "Page 3 of 40" and "Page 4 of 40" compare equal.
fn edge_key(line: &str) -> String {
    collapse(line)
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_digit() { '#' } else { c })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Edge {
    Top,
    Bottom,
}

/// (line index, edge, offset from that edge) for the non-empty lines in a page's edge zones.
/// Each zone covers at most half of the page's lines.
fn edge_zone(lines: &[&str], depth: usize) -> Vec<(usize, Edge, usize)> {
    let filled: Vec<usize> = (0..lines.len()).filter(|&i| !lines[i].trim().is_empty()).collect();
    let depth = depth.min(filled.len() / 2);
    let mut zone = Vec::new();
    for (offset, &i) in filled.iter().take(depth).enumerate() {
        zone.push((i, Edge::Top, offset));
    }
    for (offset, &i) in filled.iter().rev().take(depth).enumerate() {
        if !zone.iter().any(|(j, _, _)| *j == i) {
            zone.push((i, Edge::Bottom, offset));
        }
    }
    zone
}

/// Remove running headers and footers from page texts.
///
/// An edge-zone line is dropped when it is short and a neighbouring page has a
/// near-identical line at the same edge offset, when the exact line sits in the edge
/// zone of two or more pages, or when it is short page furniture (page numbers,
/// "confidential", URLs).
pub fn strip_headers_footers(pages: &[String], depth: usize) -> Vec<String> {
    let split: Vec<Vec<&str>> = pages.iter().map(|p| p.lines().collect()).collect();
    let zones: Vec<Vec<(usize, Edge, usize)>> = split.iter().map(|lines| edge_zone(lines, depth)).collect();

    let positional: Vec<HashSet<(Edge, usize, String)>> = split
        .iter()
        .zip(&zones)
        .map(|(lines, zone)| {
            zone.iter()
                .map(|&(i, edge, offset)| (edge, offset, edge_key(lines[i])))
                .collect()
        })
        .collect();

    let mut exact_pages: HashMap<String, HashSet<usize>> = HashMap::new();
    for (page, (lines, zone)) in split.iter().zip(&zones).enumerate() {
        for &(i, _, _) in zone {
            exact_pages
                .entry(collapse(lines[i]).to_lowercase())
                .or_default()
                .insert(page);
        }
    }

    split
        .iter()
        .zip(&zones)
        .enumerate()
        .map(|(page, (lines, zone))| {
            let mut drop = HashSet::new();
            for &(i, edge, offset) in zone {
                let line = lines[i];
                if collapse(line).chars().count() > MAX_EDGE_LINE_CHARS {
                    continue;
                }
                let short = line.split_whitespace().count() <= MAX_BOILERPLATE_TOKENS;
                let key = (edge, offset, edge_key(line));
                let neighbour_repeat = short
                    && ((page > 0 && positional[page - 1].contains(&key))
                        || positional.get(page + 1).map_or(false, |next| next.contains(&key)));
                let exact_repeat = exact_pages
                    .get(&collapse(line).to_lowercase())
                    .map_or(false, |seen| seen.len() >= 2);
                let furniture = short && BOILERPLATE.is_match(line);
                if neighbour_repeat || exact_repeat || furniture {
                    drop.insert(i);
                }
            }
            if !drop.is_empty() {
                tracing::trace!("page {}: dropped {} header/footer lines", page + 1, drop.len());
            }
            lines
                .iter()
                .enumerate()
                .filter(|(i, _)| !drop.contains(i))
                .map(|(_, line)| *line)
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .collect()
}

/// Normalized copy of the document's pages, ready for chunking.
pub fn prepare_pages(pages: &[Page], config: &Config) -> Vec<Page> {
    let normalized: Vec<String> = pages.iter().map(|p| normalize_whitespace(&p.text)).collect();
    let cleaned = if config.remove_headers_footers {
        strip_headers_footers(&normalized, config.segmenter.header_footer_lines)
    } else {
        normalized
    };
    pages
        .iter()
        .zip(cleaned)
        .map(|(page, text)| Page {
            text,
            ..page.clone()
        })
        .collect()
}

/// Lazy sentence iterator over one paragraph. Clone it to restart.
#[derive(Debug, Clone)]
pub struct Sentences<'a> {
    text: &'a str,
    pos: usize,
}

pub fn sentences(text: &str) -> Sentences<'_> {
    Sentences { text, pos: 0 }
}

/// Whether the '.' after `word` is part of an abbreviation, given the next sentence's first char.
fn is_protected(word: &str, next: char) -> bool {
    let word = word.trim_start_matches(|c: char| !c.is_alphanumeric());
    let lower = word.to_lowercase();
    if ABBREVIATIONS.contains(&lower.as_str()) {
        return true;
    }
    // Ordinary words that are abbreviations only when capitalized: "Acme Co.", "No. 3".
    match word {
        "Co" | "Mar" => return true,
        "No" | "Nos" if next.is_ascii_digit() => return true,
        _ => {}
    }
    // Initials ("J.") and dotted abbreviations ("e.g", "U.S").
    let mut chars = word.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic())
        || (word.contains('.') && word.chars().all(|c| c.is_alphabetic() || c == '.'))
}

fn opens_sentence(c: char) -> bool {
    c.is_uppercase() || c.is_ascii_digit() || matches!(c, '(' | '"' | '\'' | '\u{201C}' | '\u{2018}' | '[')
}

impl<'a> Sentences<'a> {
    /// Next sentence with its byte offset in the paragraph.
    fn next_span(&mut self) -> Option<(usize, &'a str)> {
        let rest = &self.text[self.pos..];
        let start = rest.len() - rest.trim_start().len();
        let rest = &rest[start..];
        if rest.is_empty() {
            self.pos = self.text.len();
            return None;
        }
        let base = self.pos + start;

        let mut chars = rest.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if !matches!(c, '.' | '!' | '?') {
                continue;
            }
            let mut end = i + c.len_utf8();
            while let Some(&(j, q)) = chars.peek() {
                if matches!(q, '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}' | '.' | '!' | '?') {
                    end = j + q.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let after = &rest[end..];
            if !after.starts_with(char::is_whitespace) {
                continue;
            }
            let Some(next) = after.trim_start().chars().next() else {
                continue;
            };
            if !opens_sentence(next) {
                continue;
            }
            if c == '.' {
                let word = rest[..i].rsplit(char::is_whitespace).next().unwrap_or("");
                if is_protected(word, next) {
                    continue;
                }
            }
            self.pos = base + end;
            return Some((base, rest[..end].trim_end()));
        }

        self.pos = self.text.len();
        Some((base, rest.trim_end()))
    }
}

impl<'a> Iterator for Sentences<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        self.next_span().map(|(_, text)| text)
    }
}

/// Paragraphs (blank-line separated) with internal whitespace collapsed.
pub fn paragraphs(text: &str) -> impl Iterator<Item = String> + '_ {
    BLANK_LINES
        .split(text)
        .map(collapse)
        .filter(|p| !p.is_empty())
}

/// A paragraph of a chunk, possibly running over a page break.
struct Block {
    text: String,
    /// (byte offset in `text`, page) where each page's contribution starts.
    starts: Vec<(usize, usize)>,
}

impl Block {
    fn page_at(&self, offset: usize) -> usize {
        self.starts
            .iter()
            .rev()
            .find(|&&(start, _)| start <= offset)
            .or(self.starts.first())
            .map_or(0, |&(_, page)| page)
    }
}

/// Paragraphs of the chunk's concatenated text. A page break is not a paragraph
/// break: the first paragraph of a page continues the last one of the page before.
fn blocks(chunk: &Chunk) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    let mut continues = false;
    for page in &chunk.pages {
        let mut any = false;
        for (i, paragraph) in paragraphs(&page.text).enumerate() {
            any = true;
            if i == 0 && continues {
                if let Some(last) = blocks.last_mut() {
                    last.text.push(' ');
                    last.starts.push((last.text.len(), page.page));
                    last.text.push_str(&paragraph);
                    continue;
                }
            }
            blocks.push(Block {
                text: paragraph,
                starts: vec![(0, page.page)],
            });
        }
        continues = any;
    }
    blocks
}

/// All candidate sentences of a chunk, numbered in reading order. Each sentence
/// records the page it starts on.
pub fn segment_chunk(chunk: &Chunk, min_tokens: usize) -> Vec<Sentence> {
    let mut out = Vec::new();
    for block in blocks(chunk) {
        let mut spans = sentences(&block.text);
        while let Some((offset, text)) = spans.next_span() {
            let tokens = text.split_whitespace().count();
            if tokens < min_tokens || !text.chars().any(char::is_alphabetic) {
                continue;
            }
            let id = SentenceId {
                chunk: chunk.index,
                ordinal: out.len(),
            };
            out.push(Sentence::new(id, block.page_at(offset), text.to_string()));
        }
    }
    out
}

/// Drop sentences whose lowercase alphanumeric form already occurred earlier.
pub fn dedup_exact(sentences: Vec<Sentence>) -> Vec<Sentence> {
    let mut seen = HashSet::new();
    sentences
        .into_iter()
        .filter(|s| {
            let key: String = s
                .text
                .to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            !key.is_empty() && seen.insert(key)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PageText;

    fn split(text: &str) -> Vec<&str> {
        sentences(text).collect()
    }

    #[test]
    fn test_splits_on_terminal_punctuation() {
        assert_eq!(
            split("Revenue rose. Costs fell! Why? Because demand grew."),
            vec!["Revenue rose.", "Costs fell!", "Why?", "Because demand grew."]
        );
    }

    #[test]
    fn test_decimals_and_abbreviations_protected() {
        assert_eq!(
            split("Revenue was $4.2M vs. $3.9M last year. Mr. Rao e.g. said so. Next one."),
            vec!["Revenue was $4.2M vs. $3.9M last year.", "Mr. Rao e.g. said so.", "Next one."]
        );
    }

    #[test]
    fn test_common_words_still_end_sentences() {
        assert_eq!(
            split("The answer was no. Revenue rose. Costs are est. Margins held."),
            vec!["The answer was no.", "Revenue rose.", "Costs are est.", "Margins held."]
        );
        assert_eq!(
            split("See Note No. 4 for details. Acme Co. Ltd grew."),
            vec!["See Note No. 4 for details.", "Acme Co. Ltd grew."]
        );
    }

    #[test]
    fn test_lowercase_continuation_does_not_split() {
        assert_eq!(split("Sales up 3 p.c. in the quarter."), vec!["Sales up 3 p.c. in the quarter."]);
    }

    #[test]
    fn test_closing_quote_stays_with_sentence() {
        assert_eq!(
            split("He said \"growth is back.\" Then he left."),
            vec!["He said \"growth is back.\"", "Then he left."]
        );
    }

    #[test]
    fn test_iterator_restarts_from_clone() {
        let it = sentences("One two. Three four.");
        let first: Vec<_> = it.clone().collect();
        let second: Vec<_> = it.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("a\r\nb\t\u{00A0}c\n\n\n\nd  "), "a\nb c\n\nd");
    }

    #[test]
    fn test_running_header_and_page_numbers_removed() {
        let pages: Vec<String> = ["opening", "middle", "closing"]
            .iter()
            .enumerate()
            .map(|(n, name)| {
                format!(
                    "Acme Industries Limited\nBody text for the {} section goes here.\nMore {} body text.\n{}",
                    name,
                    name,
                    n + 1
                )
            })
            .collect();
        let cleaned = strip_headers_footers(&pages, 4);
        for page in &cleaned {
            assert!(!page.contains("Acme Industries"));
            assert!(page.starts_with("Body text"));
            assert!(page.ends_with("body text."));
        }
    }

    #[test]
    fn test_masked_digits_match_on_neighbour_pages() {
        let pages = vec![
            "Quarterly review 2023 - Section 1\nFirst page body sentence.\nIt continues here.".to_string(),
            "Quarterly review 2023 - Section 2\nSecond page body sentence.\nAnd ends here.".to_string(),
        ];
        let cleaned = strip_headers_footers(&pages, 1);
        assert_eq!(cleaned[0], "First page body sentence.\nIt continues here.");
        assert_eq!(cleaned[1], "Second page body sentence.\nAnd ends here.");
    }

    #[test]
    fn test_numeric_body_sentences_at_page_top_survive() {
        let pages = vec![
            "Revenue grew 12% to $4.2M in 2023 on strong export demand.\nSecond body line for the first section.\nThird line.\nFourth line.\nFifth line.\nSixth line.".to_string(),
            "Revenue grew 15% to $5.1M in 2024 on strong export demand.\nAnother body line for the second section.\nThird line here.\nFourth line here.\nFifth line here.\nSixth line here.".to_string(),
        ];
        let cleaned = strip_headers_footers(&pages, 4);
        assert!(cleaned[0].starts_with("Revenue grew 12%"));
        assert!(cleaned[1].starts_with("Revenue grew 15%"));
    }

    #[test]
    fn test_single_page_body_kept() {
        let pages = vec!["Revenue grew 12% to $4.2M in the year.\nMargins expanded.".to_string()];
        assert_eq!(strip_headers_footers(&pages, 4), pages);
    }

    #[test]
    fn test_segment_chunk_filters_noise_and_numbers_ids() {
        let chunk = Chunk {
            index: 2,
            start: 4,
            end: 5,
            pages: vec![
                PageText {
                    page: 4,
                    text: "12\n\nRevenue increased sharply during the year. Ok.".into(),
                },
                PageText {
                    page: 5,
                    text: "The board approved a final dividend for shareholders.".into(),
                },
            ],
        };
        let sentences = segment_chunk(&chunk, 4);
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].id, SentenceId { chunk: 2, ordinal: 0 });
        assert_eq!(sentences[1].id, SentenceId { chunk: 2, ordinal: 1 });
        assert_eq!(sentences[1].page, 5);
    }

    #[test]
    fn test_sentence_across_page_break_is_kept_whole() {
        let chunk = Chunk {
            index: 0,
            start: 3,
            end: 4,
            pages: vec![
                PageText {
                    page: 3,
                    text: "Margins held firm. Revenue increased strongly during the year because".into(),
                },
                PageText {
                    page: 4,
                    text: "demand in the export markets recovered sharply and prices held. \
                           The board approved a final dividend for shareholders."
                        .into(),
                },
            ],
        };
        let sentences = segment_chunk(&chunk, 3);
        let texts: Vec<&str> = sentences.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Margins held firm.",
                "Revenue increased strongly during the year because demand in the export markets recovered sharply and prices held.",
                "The board approved a final dividend for shareholders.",
            ]
        );
        let pages: Vec<usize> = sentences.iter().map(|s| s.page).collect();
        assert_eq!(pages, vec![3, 3, 4]);
    }

    #[test]
    fn test_dedup_exact_ignores_case_and_punctuation() {
        let mk = |ordinal, text: &str| Sentence::new(SentenceId { chunk: 0, ordinal }, 0, text.into());
        let kept = dedup_exact(vec![
            mk(0, "Revenue grew 12% this year."),
            mk(1, "revenue grew 12 % this year"),
            mk(2, "Costs fell."),
        ]);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].text, "Costs fell.");
    }
}
