//! Extraction quality scoring.

/// Score an extraction in [0, 1] from four signals: the markdown/HTML
/// compression ratio (5-40% is the sweet spot for real articles), text
/// density versus formatting characters, structural presence (a heading and
/// more than two paragraphs), and overall length landing in a sensible
/// window.
pub fn quality_score(markdown: &str, original_html: &str) -> f64 {
    if markdown.trim().is_empty() {
        return 0.0;
    }

    let ratio = markdown.len() as f64 / original_html.len().max(1) as f64;
    let ratio_score = if (0.05..=0.40).contains(&ratio) {
        1.0
    } else if ratio < 0.05 {
        (ratio / 0.05).max(0.0)
    } else {
        // Barely smaller than the input: likely unpruned chrome.
        (1.0 - ((ratio - 0.40) / 0.60)).clamp(0.0, 1.0)
    };

    let formatting_chars = markdown
        .chars()
        .filter(|c| matches!(c, '#' | '*' | '_' | '`' | '|' | '[' | ']' | '(' | ')' | '>'))
        .count();
    let density_score = (1.0 - formatting_chars as f64 / markdown.len().max(1) as f64)
        .clamp(0.0, 1.0);

    let has_heading = markdown.lines().any(|l| l.trim_start().starts_with('#'));
    let paragraph_count = markdown
        .split("\n\n")
        .filter(|chunk| {
            let t = chunk.trim();
            !t.is_empty() && !t.starts_with('#') && !t.starts_with('|') && !t.starts_with("```")
        })
        .count();
    let structure_score = match (has_heading, paragraph_count > 2) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.5,
        (false, false) => 0.0,
    };

    let len = markdown.chars().count();
    let length_score = if (500..=60_000).contains(&len) {
        1.0
    } else if len < 500 {
        len as f64 / 500.0
    } else {
        0.6
    };

    let score =
        0.35 * ratio_score + 0.25 * density_score + 0.20 * structure_score + 0.20 * length_score;
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_markdown_scores_zero() {
        assert_eq!(quality_score("", "<html>big</html>"), 0.0);
        assert_eq!(quality_score("   ", "<html>big</html>"), 0.0);
    }

    #[test]
    fn well_formed_article_scores_high() {
        let paragraph = "A sentence with enough words to look like prose. ".repeat(4);
        let markdown = format!(
            "# Title\n\n{paragraph}\n\n{paragraph}\n\n{paragraph}\n\n## Section\n\n{paragraph}"
        );
        // Simulate ~10x larger source HTML.
        let html = "x".repeat(markdown.len() * 10);
        let score = quality_score(&markdown, &html);
        assert!(score > 0.8, "score was {score}");
    }

    #[test]
    fn unpruned_output_scores_lower() {
        let markdown = "nav nav nav ".repeat(100);
        let html = format!("<body>{markdown}</body>");
        let bloated = quality_score(&markdown, &html);

        let pruned_md = format!("# T\n\n{}", "real text. ".repeat(100));
        let pruned = quality_score(&pruned_md, &"y".repeat(pruned_md.len() * 8));
        assert!(pruned > bloated);
    }

    #[test]
    fn score_is_bounded() {
        let md = "# h\n\ntext";
        for html_len in [10usize, 1000, 100_000] {
            let s = quality_score(md, &"z".repeat(html_len));
            assert!((0.0..=1.0).contains(&s));
        }
    }
}
