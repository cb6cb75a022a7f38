//! Token estimation and budget distillation.
//!
//! The hard cut walks lines top-down, always keeps the first heading and
//! stops before the budget is exceeded. The smart pass runs first when a
//! distillation budget is set: boilerplate lines, oversized tables and
//! low-density paragraphs go before any content is cut.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Rough tokens: ceil(chars / 4).
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

const TABLE_KEEP_ROWS: usize = 5;

static NAV_PHRASE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(home|menu|subscribe|sign up|sign in|log in|share|read more|back to top|accept cookies|skip to content|advertisement)\b.{0,40}$",
    )
    .expect("static regex")
});

/// Hard truncation to a token budget, keeping the first heading.
pub fn hard_truncate(content: &str, max_tokens: usize) -> String {
    if estimate_tokens(content) <= max_tokens {
        return content.to_string();
    }

    let notice_tokens = 12; // reserve room for the truncation notice
    let budget = max_tokens.saturating_sub(notice_tokens).max(1);

    let mut kept: Vec<&str> = Vec::new();
    let mut used = 0usize;
    let mut heading_kept = false;
    let mut content_kept = false;

    for line in content.lines() {
        let line_tokens = estimate_tokens(line) + 1;
        let is_first_heading = !heading_kept && line.trim_start().starts_with('#');
        if is_first_heading {
            kept.push(line);
            used += line_tokens;
            heading_kept = true;
            continue;
        }
        if used + line_tokens > budget {
            // Never emit a bare notice: the first content line survives even
            // when it alone exceeds the budget.
            if !content_kept && !line.trim().is_empty() {
                kept.push(line);
            }
            if !content_kept && line.trim().is_empty() {
                continue;
            }
            break;
        }
        kept.push(line);
        used += line_tokens;
        if !line.trim().is_empty() {
            content_kept = true;
        }
    }

    let mut out = kept.join("\n").trim_end().to_string();
    out.push_str(&format!(
        "\n\n[Content truncated to ~{max_tokens} tokens]"
    ));
    out
}

/// Lines that repeat verbatim across the document (three or more times) and
/// look like chrome rather than prose.
fn boilerplate_lines(content: &str) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if !trimmed.is_empty() && trimmed.split_whitespace().count() <= 6 {
            *counts.entry(trimmed).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .filter(|(line, n)| *n >= 3 || NAV_PHRASE_RE.is_match(line))
        .map(|(line, _)| line.to_string())
        .collect()
}

fn strip_boilerplate(content: &str) -> String {
    let noise = boilerplate_lines(content);
    if noise.is_empty() {
        return content.to_string();
    }
    content
        .lines()
        .filter(|line| !noise.iter().any(|n| n == line.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keep each table's header, separator and first N body rows.
fn compress_tables(content: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut table_row = 0usize;
    let mut dropped = 0usize;

    for line in content.lines() {
        let is_table = line.trim_start().starts_with('|');
        if !is_table {
            if dropped > 0 {
                out.push(format!("| … {dropped} more rows |"));
                dropped = 0;
            }
            table_row = 0;
            out.push(line.to_string());
            continue;
        }
        table_row += 1;
        // header + separator + first body rows
        if table_row <= 2 + TABLE_KEEP_ROWS {
            out.push(line.to_string());
        } else {
            dropped += 1;
        }
    }
    if dropped > 0 {
        out.push(format!("| … {dropped} more rows |"));
    }
    out.join("\n")
}

/// Alpha-to-total character ratio; link- and symbol-heavy paragraphs score
/// low.
fn paragraph_density(paragraph: &str) -> f64 {
    let total = paragraph.chars().filter(|c| !c.is_whitespace()).count();
    if total == 0 {
        return 0.0;
    }
    let alpha = paragraph.chars().filter(|c| c.is_alphabetic()).count();
    alpha as f64 / total as f64
}

fn drop_low_density_paragraphs(content: &str, budget: usize) -> String {
    let mut paragraphs: Vec<&str> = content.split("\n\n").collect();

    // Drop the least dense paragraph until under budget (or nothing left to
    // drop). Headings and code fences are exempt.
    loop {
        let total: usize = paragraphs.iter().map(|p| estimate_tokens(p)).sum();
        if total <= budget {
            break;
        }
        let candidate = paragraphs
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                let t = p.trim_start();
                !t.starts_with('#') && !t.starts_with("```") && !t.is_empty()
            })
            .min_by(|a, b| paragraph_density(a.1).total_cmp(&paragraph_density(b.1)));
        match candidate {
            Some((index, paragraph)) if paragraph_density(paragraph) < 0.55 => {
                paragraphs.remove(index);
            }
            _ => break,
        }
    }
    paragraphs.join("\n\n")
}

/// Smart distillation: boilerplate stripping, table compression and
/// low-density paragraph dropping, then a hard cut if still over budget.
pub fn smart_distill(content: &str, budget: usize) -> String {
    if estimate_tokens(content) <= budget {
        return content.to_string();
    }
    let stripped = strip_boilerplate(content);
    let compressed = compress_tables(&stripped);
    let thinned = drop_low_density_paragraphs(&compressed, budget);
    if estimate_tokens(&thinned) <= budget {
        thinned
    } else {
        hard_truncate(&thinned, budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn under_budget_content_is_untouched() {
        let content = "# Title\n\nShort body.";
        assert_eq!(hard_truncate(content, 1000), content);
        assert_eq!(smart_distill(content, 1000), content);
    }

    #[test]
    fn hard_truncate_keeps_first_heading_and_appends_notice() {
        let body: String = (0..200)
            .map(|i| format!("Line number {i} with some filler words in it."))
            .collect::<Vec<_>>()
            .join("\n");
        let content = format!("intro line before heading\n# The Heading\n{body}");
        let out = hard_truncate(&content, 50);
        assert!(out.contains("# The Heading"));
        assert!(out.ends_with("[Content truncated to ~50 tokens]"));
        assert!(estimate_tokens(&out) <= 70);
    }

    #[test]
    fn repeated_nav_lines_are_stripped() {
        let content = "Subscribe now\n\nReal paragraph with substance and length to it.\n\n\
                       Subscribe now\n\nAnother real paragraph of content here.\n\nSubscribe now";
        let out = smart_distill(content, 10);
        assert!(!out.contains("Subscribe now"));
        assert!(out.contains("Real paragraph"));
    }

    #[test]
    fn tables_compress_to_header_plus_first_rows() {
        let mut table = String::from("| h1 | h2 |\n| --- | --- |\n");
        for i in 0..30 {
            table.push_str(&format!("| a{i} | b{i} |\n"));
        }
        let content = format!("# T\n\n{table}\nTail paragraph.");
        let out = smart_distill(&content, 60);
        assert!(out.contains("| h1 | h2 |"));
        assert!(out.contains("| a0 | b0 |"));
        assert!(!out.contains("| a29 | b29 |"));
        assert!(out.contains("more rows"));
    }

    #[test]
    fn low_density_paragraphs_go_first() {
        let dense = "This paragraph is ordinary readable prose with plenty of letters.";
        let sparse = "[1] (2) {3} |4| ... ### --- 12345 !!! ??? %%% $$$ @@@ ^^^ &&&";
        let content = format!("{dense}\n\n{sparse}\n\n{dense}");
        let budget = estimate_tokens(&content) - estimate_tokens(sparse);
        let out = smart_distill(&content, budget);
        assert!(!out.contains("12345"));
        assert!(out.contains("readable prose"));
    }
}
