// Rule-driven section categorization
use regex::RegexSet;

use crate::config::{keyword_pattern, CategoryRule};
use crate::types::{Result, SectionLabel, Section, Sentence, SummarizeError, Table};

/// Ordered keyword rules compiled into one `RegexSet`; the lowest matching index wins.
#[derive(Debug, Clone)]
pub struct Categorizer {
    set: RegexSet,
    labels: Vec<SectionLabel>,
}

impl Categorizer {
    pub fn new(rules: &[CategoryRule]) -> Result<Self> {
        let mut patterns = Vec::with_capacity(rules.len());
        let mut labels = Vec::with_capacity(rules.len());
        for rule in rules {
            let Some(pattern) = keyword_pattern(&rule.keywords) else {
                tracing::debug!("skipping empty rule for {}", rule.label);
                continue;
            };
            patterns.push(pattern);
            labels.push(rule.label);
        }

        let set = RegexSet::new(&patterns)
            .map_err(|e| SummarizeError::InvalidConfig(format!("bad category rule: {}", e)))?;
        Ok(Self { set, labels })
    }

    pub fn label(&self, text: &str) -> SectionLabel {
        self.set
            .matches(text)
            .iter()
            .next()
            .map(|i| self.labels[i])
            .unwrap_or(SectionLabel::General)
    }

    pub fn categorize(&self, sentences: &mut [Sentence]) {
        for sentence in sentences.iter_mut() {
            sentence.section = self.label(&sentence.text);
        }
    }

    /// Group labelled sentences (and table rows) into sections, in `SectionLabel::ALL` order.
    /// Empty sections are omitted.
    pub fn sections(&self, sentences: &[Sentence], tables: &[Table]) -> Vec<Section> {
        let mut sections: Vec<Section> = SectionLabel::ALL.iter().map(|&l| Section::new(l)).collect();
        let slot = |label: SectionLabel| {
            SectionLabel::ALL
                .iter()
                .position(|&l| l == label)
                .unwrap_or(SectionLabel::ALL.len() - 1)
        };

        for sentence in sentences {
            sections[slot(sentence.section)].sentences.push(sentence.id);
        }
        for table in tables {
            for row in table.row_texts() {
                let label = self.label(&row);
                sections[slot(label)].table_rows.push(row);
            }
        }

        sections.retain(|s| !s.is_empty());
        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_category_rules;
    use crate::types::SentenceId;

    fn categorizer() -> Categorizer {
        Categorizer::new(&default_category_rules()).unwrap()
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let c = categorizer();
        // Both financials ("revenue") and strategy ("growth") match; financials is listed first.
        assert_eq!(c.label("Revenue growth was driven by exports."), SectionLabel::Financials);
        assert_eq!(c.label("Currency headwinds may persist."), SectionLabel::Risks);
        assert_eq!(c.label("The Board met six times."), SectionLabel::Governance);
    }

    #[test]
    fn test_unmatched_is_general() {
        assert_eq!(categorizer().label("Employees volunteered at local schools."), SectionLabel::General);
    }

    #[test]
    fn test_keywords_match_at_word_start_only() {
        let c = Categorizer::new(&[CategoryRule::new(SectionLabel::Risks, &["risk"])]).unwrap();
        assert_eq!(c.label("Risks are monitored."), SectionLabel::Risks);
        assert_eq!(c.label("Asterisks mark footnotes."), SectionLabel::General);
    }

    #[test]
    fn test_short_keyword_does_not_match_longer_words() {
        let c = categorizer();
        assert_eq!(c.label("The patent office granted the claim."), SectionLabel::General);
        assert_eq!(c.label("PAT grew to a record this year."), SectionLabel::Financials);
        assert_eq!(c.label("Profitability improved in all plants."), SectionLabel::Financials);
    }

    #[test]
    fn test_rule_order_is_configurable() {
        let rules = vec![
            CategoryRule::new(SectionLabel::Strategy, &["growth"]),
            CategoryRule::new(SectionLabel::Financials, &["revenue"]),
        ];
        let c = Categorizer::new(&rules).unwrap();
        assert_eq!(c.label("Revenue growth was strong."), SectionLabel::Strategy);
    }

    #[test]
    fn test_sections_group_sentences_and_table_rows() {
        let c = categorizer();
        let mut sentences = vec![
            Sentence::new(SentenceId { chunk: 0, ordinal: 0 }, 0, "Revenue rose 10% this year.".into()),
            Sentence::new(SentenceId { chunk: 0, ordinal: 1 }, 0, "Staff enjoyed the annual offsite.".into()),
        ];
        c.categorize(&mut sentences);
        let tables = vec![Table {
            page: Some(0),
            rows: vec![vec!["EBITDA".into(), "1.1".into()]],
        }];

        let sections = c.sections(&sentences, &tables);
        let labels: Vec<SectionLabel> = sections.iter().map(|s| s.label).collect();
        assert_eq!(labels, vec![SectionLabel::Financials, SectionLabel::General]);
        assert_eq!(sections[0].table_rows, vec!["EBITDA | 1.1".to_string()]);
        assert_eq!(sections[1].sentences, vec![SentenceId { chunk: 0, ordinal: 1 }]);
    }
}
