//! Sentence splitting that survives URLs, abbreviations and decimals.

use once_cell::sync::Lazy;
use regex::Regex;

/// Single-word abbreviations whose trailing dot must not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "inc", "ltd", "co", "corp",
    "no", "fig", "approx", "dept", "est", "min", "max",
];

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s)\]]+").expect("static regex"));
static DECIMAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d\.\d").expect("static regex"));
static DOTTED_ABBREV_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(e\.g|i\.e|a\.m|p\.m|u\.s|u\.k|ph\.d)\.").expect("static regex")
});

const DOT: char = '\u{1}';

fn protect(text: &str) -> String {
    let mut out = text.to_string();

    // URLs: replace their dots wholesale.
    let mut protected = String::with_capacity(out.len());
    let mut last = 0;
    for m in URL_RE.find_iter(&out) {
        protected.push_str(&out[last..m.start()]);
        protected.push_str(&m.as_str().replace('.', &DOT.to_string()));
        last = m.end();
    }
    protected.push_str(&out[last..]);
    out = protected;

    // Dotted abbreviations: "e.g." / "p.m." keep every dot.
    out = DOTTED_ABBREV_RE
        .replace_all(&out, |caps: &regex::Captures| {
            format!("{}{}", caps[0].trim_end_matches('.').replace('.', &DOT.to_string()), DOT)
        })
        .into_owned();

    // Decimals: 3.14 must not split.
    loop {
        let Some(m) = DECIMAL_RE.find(&out) else { break };
        let idx = m.start() + 1;
        out.replace_range(idx..idx + 1, &DOT.to_string());
    }

    // Abbreviations: "Dr. Smith" stays together. Case-insensitive match on
    // the word before a dot.
    let mut result = String::with_capacity(out.len());
    let mut word = String::new();
    for c in out.chars() {
        if c == '.' {
            let lower = word.to_lowercase();
            let is_abbrev = ABBREVIATIONS.contains(&lower.as_str())
                || (word.len() == 1 && word.chars().all(|c| c.is_ascii_uppercase()));
            result.push_str(&word);
            result.push(if is_abbrev { DOT } else { '.' });
            word.clear();
        } else if c.is_alphanumeric() || c == '\u{1}' {
            word.push(c);
        } else {
            result.push_str(&word);
            result.push(c);
            word.clear();
        }
    }
    result.push_str(&word);
    result
}

fn restore(text: &str) -> String {
    text.replace(DOT, ".")
}

/// Split text into sentences. Terminators are `.`, `!`, `?` followed by
/// whitespace (or end of text); protected dots never terminate.
pub fn split_sentences(text: &str) -> Vec<String> {
    let protected = protect(text);
    let mut sentences = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = protected.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let at_end = i + 1 >= chars.len();
            let followed_by_space = chars.get(i + 1).is_some_and(|n| n.is_whitespace());
            if at_end || followed_by_space {
                let sentence = restore(current.trim());
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                current.clear();
            }
        }
    }
    let tail = restore(current.trim());
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}
