// Summary assembly: budgeted selection, near-duplicate filtering, reading-order output
use std::collections::{HashMap, HashSet};

use crate::config::SummaryConfig;
use crate::types::{SectionLabel, Section, Sentence, Summary};

/// Indices of `sentences` ordered by score descending, earlier document position first on ties.
pub fn rank(sentences: &[Sentence]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..sentences.len()).collect();
    order.sort_by(|&a, &b| {
        sentences[b]
            .score
            .total_cmp(&sentences[a].score)
            .then_with(|| sentences[a].id.cmp(&sentences[b].id))
    });
    order
}

fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Token-overlap (Jaccard) similarity in [0, 1].
pub fn similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (tokens(a), tokens(b));
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

/// Cut `text` to at most `max_chars` characters at a word boundary, marking the cut with `…`.
pub fn truncate_at_word(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let head: String = text.chars().take(max_chars - 1).collect();
    let cut = match head.rfind(char::is_whitespace) {
        Some(i) if i > 0 => &head[..i],
        _ => head.as_str(),
    };
    let mut out = cut.trim_end_matches(|c: char| c.is_whitespace() || c == ',' || c == ';').to_string();
    out.push('…');
    out
}

/// Running state of the summary selection.
struct Selection<'a> {
    config: &'a SummaryConfig,
    sentences: &'a [Sentence],
    chosen: Vec<usize>,
    chars: usize,
}

impl<'a> Selection<'a> {
    fn new(sentences: &'a [Sentence], config: &'a SummaryConfig) -> Self {
        Self {
            config,
            sentences,
            chosen: Vec::new(),
            chars: 0,
        }
    }

    fn contains(&self, index: usize) -> bool {
        self.chosen.contains(&index)
    }

    /// Length of the joined summary if `index` were added.
    fn length_with(&self, index: usize) -> usize {
        let sep = usize::from(!self.chosen.is_empty());
        self.chars + sep + self.sentences[index].text.chars().count()
    }

    fn is_duplicate(&self, text: &str) -> bool {
        self.chosen
            .iter()
            .any(|&i| similarity(&self.sentences[i].text, text) > self.config.duplicate_threshold)
    }

    fn try_add(&mut self, index: usize) -> bool {
        if self.chosen.len() >= self.config.max_sentences || self.contains(index) {
            return false;
        }
        let length = self.length_with(index);
        if length > self.config.max_chars {
            return false;
        }
        if self.is_duplicate(&self.sentences[index].text) {
            tracing::debug!("skipping near-duplicate {:?}", self.sentences[index].id);
            return false;
        }
        self.chars = length;
        self.chosen.push(index);
        true
    }
}

/// Pick summary sentences; returns indices into `sentences` in document order.
pub fn select_summary(sentences: &[Sentence], sections: &[Section], config: &SummaryConfig) -> Vec<usize> {
    let ranked = rank(sentences);
    let mut selection = Selection::new(sentences, config);

    if config.section_coverage {
        let position: HashMap<_, usize> = ranked
            .iter()
            .enumerate()
            .map(|(pos, &i)| (sentences[i].id, pos))
            .collect();

        // Members of each topical section in rank order, sections ordered by their best member.
        let mut covered: Vec<Vec<usize>> = sections
            .iter()
            .filter(|s| s.label != SectionLabel::General)
            .map(|s| {
                let mut members: Vec<usize> = s.sentences.iter().filter_map(|id| position.get(id).copied()).collect();
                members.sort_unstable();
                members
            })
            .filter(|m| !m.is_empty())
            .collect();
        covered.sort_by_key(|m| m[0]);

        for members in covered {
            for pos in members {
                if selection.try_add(ranked[pos]) {
                    break;
                }
            }
        }
    }

    for &index in &ranked {
        if selection.chosen.len() >= config.max_sentences {
            break;
        }
        selection.try_add(index);
    }

    let mut chosen = selection.chosen;
    chosen.sort_by_key(|&i| sentences[i].id);
    chosen
}

/// Top sentences by score, no two of them near-duplicates, in rank order.
///
/// Sentences that the summary does not already say are preferred. Summary sentences
/// only fill the slots left over, so a short document still gets its highlights.
pub fn select_key_points(sentences: &[Sentence], summary: &[usize], config: &SummaryConfig) -> Vec<String> {
    let ranked = rank(sentences);
    let threshold = config.duplicate_threshold;
    let in_summary = |index: usize| {
        summary
            .iter()
            .any(|&i| i == index || similarity(&sentences[i].text, &sentences[index].text) > threshold)
    };

    // Positions in `ranked`.
    let mut picked: Vec<usize> = Vec::new();
    for fresh_pass in [true, false] {
        for (pos, &index) in ranked.iter().enumerate() {
            if picked.len() >= config.max_key_points {
                break;
            }
            if picked.contains(&pos) || in_summary(index) == fresh_pass {
                continue;
            }
            let text = &sentences[index].text;
            if picked
                .iter()
                .any(|&p| similarity(&sentences[ranked[p]].text, text) > threshold)
            {
                continue;
            }
            picked.push(pos);
        }
    }

    picked.sort_unstable();
    picked
        .into_iter()
        .map(|pos| truncate_at_word(&sentences[ranked[pos]].text, config.key_point_max_chars))
        .filter(|point| !point.is_empty())
        .collect()
}

/// Build the final `Summary` from scored, labelled sentences.
pub fn assemble(
    company: Option<String>,
    sentences: &[Sentence],
    sections: &[Section],
    config: &SummaryConfig,
) -> Summary {
    let chosen = select_summary(sentences, sections, config);
    let mut summary_sentences: Vec<String> = chosen.iter().map(|&i| sentences[i].text.clone()).collect();

    // A lone sentence longer than the whole budget is shortened rather than dropped.
    if summary_sentences.is_empty() {
        if let Some(&best) = rank(sentences).first() {
            summary_sentences.push(truncate_at_word(&sentences[best].text, config.max_chars));
            let key_points = select_key_points(sentences, &[best], config);
            return Summary {
                company,
                sentences: summary_sentences,
                key_points,
            };
        }
    }

    let key_points = select_key_points(sentences, &chosen, config);
    tracing::info!(
        "selected {} of {} sentences, {} key points",
        summary_sentences.len(),
        sentences.len(),
        key_points.len()
    );
    Summary {
        company,
        sentences: summary_sentences,
        key_points,
    }
}
