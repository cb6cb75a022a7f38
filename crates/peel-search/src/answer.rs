//! LLM-free quick answers.
//!
//! The question is classified by shape, then sentences are scored with BM25
//! plus type-specific boosts and a position bias. A direct-pattern pass runs
//! first for who/when/what questions: infobox-style rows and definition
//! sentences answer immediately with high confidence and skip BM25.

use crate::bm25::{tokenize, Bm25Model};
use crate::sentences::split_sentences;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    What,
    HowMany,
    When,
    Where,
    Why,
    Who,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Passage {
    pub text: String,
    pub score: f64,
    /// Sentence index in the source document.
    pub position: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickAnswer {
    pub answer: Option<String>,
    pub passages: Vec<Passage>,
    pub confidence: f64,
    pub question_type: QuestionType,
}

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(19|20)\d{2}\b|\b(january|february|march|april|may|june|july|august|september|october|november|december)\b|\b\d{1,2}/\d{1,2}/\d{2,4}\b",
    )
    .expect("static regex")
});
static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d[\d,.]*\b").expect("static regex"));
static BY_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:by|founded by|created by|written by|directed by|invented by)\s+[A-Z][a-z]+")
        .expect("static regex")
});
static DEFINITION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z][\w\s',-]{1,60}\s(?:is|are|was|were)\s(?:a|an|the)\s").expect("static regex")
});
static PLACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(located|situated|headquartered|based)\b|\bin\s+[A-Z][a-z]+").expect("static regex")
});
static INFOBOX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:[-*]\s*)?\*{0,2}([A-Za-z][A-Za-z ()/]{1,40}?)\*{0,2}\s*[:·]\s*(.{2,160})$")
        .expect("static regex")
});

/// Classify the question from its wording.
pub fn classify_question(question: &str) -> QuestionType {
    let q = question.trim().to_lowercase();
    if q.starts_with("how many") || q.starts_with("how much") || q.contains("what number") {
        QuestionType::HowMany
    } else if q.starts_with("when") || q.contains("what year") || q.contains("what date") {
        QuestionType::When
    } else if q.starts_with("where") {
        QuestionType::Where
    } else if q.starts_with("why") {
        QuestionType::Why
    } else if q.starts_with("who") || q.starts_with("whose") || q.starts_with("whom") {
        QuestionType::Who
    } else if q.starts_with("what") || q.starts_with("which") || q.contains("definition of") {
        QuestionType::What
    } else {
        QuestionType::Other
    }
}

/// Infobox-row keywords per question type, matched against the field name.
fn infobox_fields(question_type: QuestionType) -> &'static [&'static str] {
    match question_type {
        QuestionType::Who => &[
            "author", "founder", "creator", "director", "president", "ceo", "owner", "developer",
            "written by",
        ],
        QuestionType::When => &[
            "date", "founded", "released", "born", "published", "year", "launched", "established",
        ],
        QuestionType::What => &["type", "genre", "purpose", "industry", "category"],
        _ => &[],
    }
}

/// Direct-pattern extraction: infobox rows ("Field: Value") whose field
/// matches the question type, or a definition sentence overlapping the
/// question terms. Returns an answer bypassing BM25 when matched.
fn direct_pattern_answer(
    content: &str,
    question: &str,
    question_type: QuestionType,
) -> Option<(String, f64)> {
    let fields = infobox_fields(question_type);
    if !fields.is_empty() {
        for caps in INFOBOX_RE.captures_iter(content) {
            let field = caps[1].trim().to_lowercase();
            let value = caps[2].trim();
            if fields.iter().any(|f| field.contains(f)) && !value.is_empty() {
                return Some((format!("{}: {}", caps[1].trim(), value), 0.9));
            }
        }
    }

    if matches!(question_type, QuestionType::What | QuestionType::Who) {
        let question_terms = tokenize(question);
        for sentence in split_sentences(content).iter().take(40) {
            if DEFINITION_RE.is_match(sentence) {
                let sentence_terms = tokenize(sentence);
                let overlap = question_terms
                    .iter()
                    .filter(|t| sentence_terms.contains(t))
                    .count();
                if overlap >= 2 || (overlap >= 1 && question_terms.len() <= 3) {
                    return Some((sentence.clone(), 0.88));
                }
            }
        }
    }
    None
}

fn type_boost(sentence: &str, question_type: QuestionType) -> f64 {
    match question_type {
        QuestionType::What => {
            if DEFINITION_RE.is_match(sentence)
                || sentence.contains(" refers to ")
                || sentence.contains(" means ")
            {
                0.6
            } else {
                0.0
            }
        }
        QuestionType::HowMany => {
            if NUMBER_RE.is_match(sentence) {
                0.5
            } else {
                0.0
            }
        }
        QuestionType::When => {
            if DATE_RE.is_match(sentence) {
                0.6
            } else {
                0.0
            }
        }
        QuestionType::Where => {
            if PLACE_RE.is_match(sentence) {
                0.4
            } else {
                0.0
            }
        }
        QuestionType::Who => {
            if BY_NAME_RE.is_match(sentence) {
                0.5
            } else {
                0.0
            }
        }
        QuestionType::Why | QuestionType::Other => 0.0,
    }
}

/// Early sentences get a bonus: +0.4 inside the first 10% of the document,
/// decaying linearly to 0 at the 50% mark.
fn position_bias(index: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let frac = index as f64 / total as f64;
    if frac <= 0.10 {
        0.4
    } else if frac < 0.50 {
        0.4 * (0.50 - frac) / 0.40
    } else {
        0.0
    }
}

/// Answer a question over already-extracted content.
pub fn quick_answer(content: &str, question: &str, top_n: usize) -> QuickAnswer {
    let question_type = classify_question(question);

    if let Some((answer, confidence)) = direct_pattern_answer(content, question, question_type) {
        debug!(?question_type, confidence, "direct pattern answered");
        return QuickAnswer {
            answer: Some(answer.clone()),
            passages: vec![Passage {
                text: answer,
                score: confidence,
                position: 0,
            }],
            confidence,
            question_type,
        };
    }

    let sentences = split_sentences(content);
    if sentences.is_empty() || tokenize(question).is_empty() {
        return QuickAnswer {
            answer: None,
            passages: Vec::new(),
            confidence: 0.0,
            question_type,
        };
    }

    let refs: Vec<&str> = sentences.iter().map(String::as_str).collect();
    let model = Bm25Model::build(&refs);
    let total = sentences.len();

    let mut scored: Vec<(usize, f64)> = (0..total)
        .map(|i| {
            let mut score = model.score(i, question);
            score += type_boost(&sentences[i], question_type);
            score += position_bias(i, total);
            if DEFINITION_RE.is_match(&sentences[i]) {
                score += 0.3;
            }
            (i, score)
        })
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    // Top-N passages with prev/current/next context, no overlapping windows.
    let mut used: Vec<usize> = Vec::new();
    let mut passages = Vec::new();
    for &(index, score) in scored.iter() {
        if passages.len() >= top_n || score <= 0.0 {
            break;
        }
        if used.iter().any(|&u| index.abs_diff(u) <= 1) {
            continue;
        }
        used.push(index);
        let start = index.saturating_sub(1);
        let end = (index + 1).min(total - 1);
        let text = sentences[start..=end].join(" ");
        passages.push(Passage {
            text,
            score,
            position: index,
        });
    }

    let mean = scored.iter().map(|(_, s)| s).sum::<f64>() / total as f64;
    let top = scored.first().map(|(_, s)| *s).unwrap_or(0.0);
    let confidence = if top > 0.0 {
        (((top - mean) / top).clamp(0.0, 1.0) * 0.8) + 0.1
    } else {
        0.0
    };

    QuickAnswer {
        answer: passages.first().map(|p| p.text.clone()),
        passages,
        confidence,
        question_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = "Rust is a systems programming language focused on safety. \
It was created by Graydon Hoare. The first stable release shipped in May 2015. \
The language has 100 keywords give or take. Projects use it for browsers, \
kernels and games. Memory safety comes without garbage collection. \
The compiler enforces ownership at build time. Adoption keeps growing yearly. \
Large companies sponsor its development. The community publishes crates daily.";

    #[test]
    fn classification_covers_shapes() {
        assert_eq!(classify_question("What is Rust?"), QuestionType::What);
        assert_eq!(classify_question("how many keywords"), QuestionType::HowMany);
        assert_eq!(classify_question("When was it released?"), QuestionType::When);
        assert_eq!(classify_question("Where is the HQ"), QuestionType::Where);
        assert_eq!(classify_question("Why use it?"), QuestionType::Why);
        assert_eq!(classify_question("Who made Rust?"), QuestionType::Who);
        assert_eq!(classify_question("Tell me about Rust"), QuestionType::Other);
    }

    #[test]
    fn definition_question_finds_definition_sentence() {
        let result = quick_answer(ARTICLE, "What is Rust?", 3);
        let answer = result.answer.expect("answer expected");
        assert!(answer.contains("systems programming language"));
        assert!(result.confidence > 0.5);
    }

    #[test]
    fn when_question_prefers_dated_sentence() {
        let result = quick_answer(ARTICLE, "When was the first stable release?", 3);
        let answer = result.answer.expect("answer expected");
        assert!(answer.contains("2015"), "got: {answer}");
    }

    #[test]
    fn infobox_row_bypasses_bm25() {
        let content = "Overview of the project.\n\n- Founder: Ada Lovelace\n- Founded: 1843\n";
        let result = quick_answer(content, "Who founded the project?", 3);
        assert_eq!(result.answer.as_deref(), Some("Founder: Ada Lovelace"));
        assert!(result.confidence >= 0.88);
    }

    #[test]
    fn empty_content_yields_no_answer() {
        let result = quick_answer("", "What is this?", 3);
        assert!(result.answer.is_none());
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn passages_do_not_overlap() {
        let result = quick_answer(ARTICLE, "What is Rust used for?", 3);
        let mut positions: Vec<usize> = result.passages.iter().map(|p| p.position).collect();
        positions.sort_unstable();
        for pair in positions.windows(2) {
            assert!(pair[1] - pair[0] > 1, "overlapping windows at {pair:?}");
        }
    }
}
