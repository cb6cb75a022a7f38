//! Okapi BM25 over content blocks.

use crate::blocks::{split_blocks, Block};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

pub const BM25_K1: f64 = 1.5;
pub const BM25_B: f64 = 0.75;

/// Lowercase, strip markdown formatting and punctuation, keep tokens of
/// length >= 2.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(String::from)
        .collect()
}

/// BM25 model built over a fixed corpus of documents.
#[derive(Debug)]
pub struct Bm25Model {
    doc_tokens: Vec<Vec<String>>,
    doc_freq: HashMap<String, usize>,
    avg_len: f64,
    k1: f64,
    b: f64,
}

impl Bm25Model {
    pub fn build(documents: &[&str]) -> Self {
        Self::build_with_params(documents, BM25_K1, BM25_B)
    }

    pub fn build_with_params(documents: &[&str], k1: f64, b: f64) -> Self {
        let doc_tokens: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d)).collect();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for tokens in &doc_tokens {
            let mut seen: Vec<&String> = tokens.iter().collect();
            seen.sort();
            seen.dedup();
            for term in seen {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
        }
        let total_len: usize = doc_tokens.iter().map(Vec::len).sum();
        let avg_len = if doc_tokens.is_empty() {
            0.0
        } else {
            total_len as f64 / doc_tokens.len() as f64
        };
        Self {
            doc_tokens,
            doc_freq,
            avg_len,
            k1,
            b,
        }
    }

    pub fn len(&self) -> usize {
        self.doc_tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_tokens.is_empty()
    }

    fn idf(&self, term: &str) -> f64 {
        let n = self.doc_tokens.len() as f64;
        let df = *self.doc_freq.get(term).unwrap_or(&0) as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// BM25 score of document `index` against the query, summed per term.
    pub fn score(&self, index: usize, query: &str) -> f64 {
        let Some(tokens) = self.doc_tokens.get(index) else {
            return 0.0;
        };
        let query_terms = tokenize(query);
        if query_terms.is_empty() || tokens.is_empty() || self.avg_len == 0.0 {
            return 0.0;
        }

        let mut term_freq: HashMap<&str, usize> = HashMap::new();
        for token in tokens {
            *term_freq.entry(token.as_str()).or_insert(0) += 1;
        }
        let doc_len = tokens.len() as f64;

        let mut total = 0.0;
        for term in &query_terms {
            let tf = *term_freq.get(term.as_str()).unwrap_or(&0) as f64;
            if tf == 0.0 {
                continue;
            }
            let idf = self.idf(term);
            let numerator = tf * (self.k1 + 1.0);
            let denominator =
                tf + self.k1 * (1.0 - self.b + self.b * (doc_len / self.avg_len));
            total += idf * numerator / denominator;
        }
        total
    }

    pub fn score_all(&self, query: &str) -> Vec<f64> {
        (0..self.doc_tokens.len())
            .map(|i| self.score(i, query))
            .collect()
    }
}

/// Result of query-focused filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOutcome {
    pub content: String,
    pub kept: usize,
    pub total: usize,
    pub reduction_percent: f64,
}

/// Keep blocks scoring at least `0.5 * mean` against the query, in document
/// order. Never returns empty: if the threshold filters everything, the top
/// three blocks are kept instead. An empty query returns the content
/// unchanged.
pub fn filter_blocks(content: &str, query: &str) -> FilterOutcome {
    let blocks = split_blocks(content);
    let total = blocks.len();

    if tokenize(query).is_empty() || blocks.is_empty() {
        return FilterOutcome {
            content: content.to_string(),
            kept: total,
            total,
            reduction_percent: 0.0,
        };
    }

    let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
    let model = Bm25Model::build(&texts);
    let scores = model.score_all(query);
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    let threshold = 0.5 * mean;

    let mut kept_indices: Vec<usize> = scores
        .iter()
        .enumerate()
        .filter(|(_, s)| **s >= threshold && **s > 0.0)
        .map(|(i, _)| i)
        .collect();

    if kept_indices.is_empty() {
        // Fall back to the top three, restored to document order.
        let mut ranked: Vec<usize> = (0..scores.len()).collect();
        ranked.sort_by(|a, b| scores[*b].total_cmp(&scores[*a]));
        kept_indices = ranked.into_iter().take(3).collect();
        kept_indices.sort_unstable();
    }

    let kept = kept_indices.len();
    let kept_blocks: Vec<&Block> = kept_indices.iter().map(|&i| &blocks[i]).collect();
    let content_out = kept_blocks
        .iter()
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let reduction_percent = if total == 0 {
        0.0
    } else {
        100.0 * (total - kept) as f64 / total as f64
    };
    debug!(total, kept, reduction_percent, "bm25 filter applied");

    FilterOutcome {
        content: content_out,
        kept,
        total,
        reduction_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_strips_markdown_and_short_tokens() {
        let tokens = tokenize("**Hotel** prices, in 2024: $99 (a night)!");
        assert!(tokens.contains(&"hotel".to_string()));
        assert!(tokens.contains(&"prices".to_string()));
        assert!(tokens.contains(&"2024".to_string()));
        assert!(tokens.contains(&"99".to_string()));
        // single-char token dropped
        assert!(!tokens.iter().any(|t| t == "a"));
    }

    #[test]
    fn matching_document_outscores_unrelated() {
        let docs = [
            "Hotel prices in Paris start at 120 euros per night.",
            "The weather was cloudy with occasional rain.",
            "Trains depart hourly from the central station.",
        ];
        let model = Bm25Model::build(&docs);
        let scores = model.score_all("hotel prices");
        assert!(scores[0] > scores[1]);
        assert!(scores[0] > scores[2]);
    }

    #[test]
    fn idf_uses_plus_one_form() {
        // With the +1 inside the log, IDF is always positive even for a term
        // present in every document.
        let docs = ["common word", "common again", "common thrice"];
        let model = Bm25Model::build(&docs);
        assert!(model.idf("common") > 0.0);
    }

    #[test]
    fn filter_keeps_price_block_for_price_query() {
        let md = "# Travel guide\n\nIntro text about the city.\n\n\
                  Hotel prices range from $80 to $250 per night downtown.\n\n\
                  The museum is closed on Mondays.\n\n\
                  Restaurants serve dinner until late.\n\n\
                  Parking is scarce near the river.\n\n\
                  Local buses run every ten minutes.\n\n\
                  The airport is 30 km away.\n\n\
                  Street markets open on weekends.\n\n\
                  Winter brings heavy snowfall.";
        let outcome = filter_blocks(md, "hotel prices");
        assert!(outcome.content.contains("$80"));
        assert!(outcome.kept <= outcome.total);
        assert!(outcome.reduction_percent >= 0.0);
        assert!(outcome.kept >= 1);
    }

    #[test]
    fn empty_query_returns_unchanged() {
        let md = "# A\n\nBody text.";
        let outcome = filter_blocks(md, "");
        assert_eq!(outcome.content, md);
        assert_eq!(outcome.reduction_percent, 0.0);
    }

    #[test]
    fn no_match_falls_back_to_top_three_in_order() {
        let md = "First block here.\n\nSecond block here.\n\n\
                  Third block here.\n\nFourth block here.";
        let outcome = filter_blocks(md, "zyzzyva quux");
        assert_eq!(outcome.kept, 3);
        let first = outcome.content.find("First").unwrap_or(usize::MAX);
        let second = outcome.content.find("Second").unwrap_or(usize::MAX);
        assert!(first < second);
    }

    #[test]
    fn filter_preserves_document_order() {
        let md = "alpha beta gamma.\n\nquery term rich block about hotels.\n\n\
                  another hotels block with query term.\n\ndelta epsilon.";
        let outcome = filter_blocks(md, "hotels query term");
        let a = outcome.content.find("rich block");
        let b = outcome.content.find("another hotels");
        if let (Some(a), Some(b)) = (a, b) {
            assert!(a < b);
        }
    }
}
