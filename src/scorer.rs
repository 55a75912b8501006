// Heuristic sentence scoring
//
// score = Σ weight·signal over normalized signals in [0, 1], plus weighted domain cues.
// Scores are only comparable within one document.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{keyword_pattern, ScoringConfig};
use crate::types::Sentence;

static NUMERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d,.]*").unwrap());
static CURRENCY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[$€£¥₹]|\b(usd|eur|gbp|inr|rs|crore|lakh|million|billion|mn|bn)\b").unwrap()
});

/// One keyword density per this many tokens saturates the keyword signal.
const KEYWORD_SATURATION: f64 = 10.0;
/// Numerals needed to saturate the numeric signal on their own.
const NUMERAL_SATURATION: f64 = 4.0;

/// Additive cue: phrase patterns that mark high- or low-value statements.
#[derive(Debug, Clone)]
pub struct CueRule {
    pub pattern: Regex,
    pub adjustment: f64,
}

pub fn default_cues() -> Vec<CueRule> {
    vec![
        CueRule {
            pattern: Regex::new(
                r"(?i)\b(yoy|qoq|guidance|margin|dividend|order book|backlog|capex|opex|free cash)",
            )
            .unwrap(),
            adjustment: 0.6,
        },
        CueRule {
            pattern: Regex::new(
                r"(?i)(forward-looking|statutory|notes to accounts|auditor|secretarial)",
            )
            .unwrap(),
            adjustment: -0.8,
        },
    ]
}

/// Where a sentence sits, needed for the position signals.
#[derive(Debug, Clone, Copy)]
pub struct Context {
    pub ordinal: usize,
    pub sentences_in_chunk: usize,
    pub chunk: usize,
    pub chunks: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Signals {
    pub position: f64,
    pub chunk_position: f64,
    pub length: f64,
    pub keyword: f64,
    pub numeric: f64,
    pub cue: f64,
}

pub struct Scorer {
    weights: ScoringConfig,
    keywords: Option<Regex>,
    cues: Vec<CueRule>,
}

impl Scorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self::with_cues(config, default_cues())
    }

    pub fn with_cues(config: &ScoringConfig, cues: Vec<CueRule>) -> Self {
        Self {
            weights: config.clone(),
            keywords: keyword_regex(&config.keywords),
            cues,
        }
    }

    pub fn signals(&self, text: &str, ctx: Context) -> Signals {
        let tokens = text.split_whitespace().count();
        Signals {
            position: front_loaded(ctx.ordinal, ctx.sentences_in_chunk),
            chunk_position: front_loaded(ctx.chunk, ctx.chunks),
            length: self.length_signal(tokens),
            keyword: self.keyword_signal(text, tokens),
            numeric: numeric_signal(text),
            cue: self
                .cues
                .iter()
                .filter(|cue| cue.pattern.is_match(text))
                .map(|cue| cue.adjustment)
                .sum(),
        }
    }

    pub fn score(&self, text: &str, ctx: Context) -> f64 {
        let s = self.signals(text, ctx);
        let w = &self.weights;
        w.position * s.position
            + w.chunk_position * s.chunk_position
            + w.length * s.length
            + w.keyword * s.keyword
            + w.numeric * s.numeric
            + w.cue * s.cue
    }

    /// Score one chunk's sentences in place.
    pub fn score_chunk(&self, sentences: &mut [Sentence], chunks: usize) {
        let total = sentences.len();
        for (ordinal, sentence) in sentences.iter_mut().enumerate() {
            let ctx = Context {
                ordinal,
                sentences_in_chunk: total,
                chunk: sentence.id.chunk,
                chunks,
            };
            sentence.score = self.score(&sentence.text, ctx);
        }
    }

    /// Full weight inside the optimal range, tapering off on either side.
    fn length_signal(&self, tokens: usize) -> f64 {
        let (lo, hi) = (self.weights.length_optimal_min, self.weights.length_optimal_max);
        if (lo..=hi).contains(&tokens) {
            1.0
        } else if tokens < lo {
            // Linear ramp up to the range, nothing below a third of it.
            let floor = lo / 3;
            if tokens <= floor {
                0.0
            } else {
                0.5 * (tokens - floor) as f64 / (lo - floor).max(1) as f64
            }
        } else {
            // Half credit just past the range, decaying to a small constant for run-ons.
            (0.5 * hi as f64 / tokens as f64).max(0.1)
        }
    }

    fn keyword_signal(&self, text: &str, tokens: usize) -> f64 {
        let Some(keywords) = &self.keywords else {
            return 0.0;
        };
        if tokens == 0 {
            return 0.0;
        }
        let matches = keywords.find_iter(text).count() as f64;
        (matches / tokens as f64 * KEYWORD_SATURATION).min(1.0)
    }
}

/// 1.0 at the front, falling linearly towards 0 at the back.
fn front_loaded(index: usize, count: usize) -> f64 {
    if count <= 1 {
        1.0
    } else {
        1.0 - index as f64 / count as f64
    }
}

fn numeric_signal(text: &str) -> f64 {
    let numerals = NUMERAL.find_iter(text).count() as f64;
    let mut signal = (numerals / NUMERAL_SATURATION).min(1.0) * 0.5;
    if CURRENCY.is_match(text) {
        signal += 0.25;
    }
    if text.contains('%') {
        signal += 0.25;
    }
    signal
}

fn keyword_regex(keywords: &[String]) -> Option<Regex> {
    keyword_pattern(keywords).and_then(|pattern| Regex::new(&pattern).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SentenceId;

    fn ctx(ordinal: usize) -> Context {
        Context {
            ordinal,
            sentences_in_chunk: 10,
            chunk: 0,
            chunks: 1,
        }
    }

    fn scorer() -> Scorer {
        Scorer::new(&ScoringConfig::default())
    }

    #[test]
    fn test_earlier_sentence_scores_higher() {
        let text = "The company opened two new plants in the northern region this year.";
        assert!(scorer().score(text, ctx(0)) > scorer().score(text, ctx(7)));
    }

    #[test]
    fn test_quantitative_statement_beats_plain_one() {
        let plain = "The company held a meeting with several partners during the year.";
        let numeric = "Total revenue increased 12% to $4.2M during the year on strong demand.";
        assert!(scorer().score(numeric, ctx(3)) > scorer().score(plain, ctx(3)));
    }

    #[test]
    fn test_length_signal_prefers_mid_range() {
        let s = scorer();
        assert_eq!(s.length_signal(20), 1.0);
        assert!(s.length_signal(6) < 0.5);
        assert_eq!(s.length_signal(2), 0.0);
        assert!(s.length_signal(120) < s.length_signal(45));
    }

    #[test]
    fn test_keyword_prefix_and_density() {
        let s = scorer();
        let sig = s.signals("Uncertainty around growth remains high this quarter.", ctx(0));
        assert!(sig.keyword > 0.9);
        let sig = s.signals("Nothing relevant is said in this particular line here.", ctx(0));
        assert_eq!(sig.keyword, 0.0);
    }

    #[test]
    fn test_short_keywords_match_whole_words() {
        let s = scorer();
        let sig = s.signals("The patent covers a new path for the pattern library.", ctx(0));
        assert_eq!(sig.keyword, 0.0);
        let sig = s.signals("PAT rose to a record level in the year.", ctx(0));
        assert!(sig.keyword > 0.0);
    }

    #[test]
    fn test_cues_adjust_score() {
        let s = scorer();
        let boost = s.signals("Management raised full year guidance on margins.", ctx(0));
        assert!((boost.cue - 0.6).abs() < 1e-9);
        let penalty = s.signals("This report contains forward-looking statements by the auditor.", ctx(0));
        assert!((penalty.cue + 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_numeric_signal_bounds() {
        assert_eq!(numeric_signal("no numbers here"), 0.0);
        let full = numeric_signal("Revenue of $4.2M, up 12% from 3.7 in 2023 and 2.9 in 2022.");
        assert!((full - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_chunk_is_deterministic() {
        let mk = |ordinal: usize, text: &str| {
            Sentence::new(SentenceId { chunk: 1, ordinal }, 0, text.to_string())
        };
        let base = vec![
            mk(0, "Revenue grew 8% to $1.1 billion on higher volumes."),
            mk(1, "The outlook remains uncertain given market headwinds."),
        ];
        let mut a = base.clone();
        let mut b = base;
        scorer().score_chunk(&mut a, 3);
        scorer().score_chunk(&mut b, 3);
        assert_eq!(a, b);
        assert!(a[0].score > 0.0);
    }
}
