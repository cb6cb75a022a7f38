//! Readability: find the element that actually holds the article.
//!
//! Pass 1 (semantic removal) is implicit: every traversal skips junk
//! elements via the shared tables. Pass 2 scores the remaining block
//! candidates by text density, link density, tag importance and length, and
//! picks the best with a fixed preference order. A safety floor falls back
//! to the whole body when the winner holds too little of the page's text.

use crate::markdown::element_to_markdown;
use crate::selectors::is_junk;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Minimum share of the page's visible text the winning candidate must
/// retain.
const SAFETY_FLOOR: f64 = 0.40;
const MIN_CANDIDATE_CHARS: usize = 100;

#[derive(Debug, Clone)]
pub struct Article {
    /// Tag of the element the content came from (`article`, `main`, ...).
    pub root_tag: String,
    pub markdown: String,
    pub text: String,
}

/// Visible text of a subtree, skipping junk elements.
pub fn visible_text_of(element: ElementRef) -> String {
    let mut out = String::new();
    collect_visible(element, &mut out);
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_visible(element: ElementRef, out: &mut String) {
    if is_junk(&element) {
        return;
    }
    for child in element.children() {
        match child.value() {
            scraper::Node::Text(text) => {
                out.push_str(&text.text);
                out.push(' ');
            }
            scraper::Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_visible(child_el, out);
                }
            }
            _ => {}
        }
    }
}

fn link_text_len(element: ElementRef) -> usize {
    let selector = Selector::parse("a").expect("static selector");
    element
        .select(&selector)
        .filter(|a| !is_junk(a))
        .map(|a| a.text().collect::<String>().split_whitespace().count())
        .sum::<usize>()
        * 6 // rough chars-per-word so densities stay comparable
}

fn paragraph_count(element: ElementRef) -> usize {
    let selector = Selector::parse("p").expect("static selector");
    element
        .select(&selector)
        .filter(|p| !is_junk(p) && !p.text().collect::<String>().trim().is_empty())
        .count()
}

fn tag_importance(tag: &str) -> f64 {
    match tag {
        "article" | "main" | "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => 1.0,
        "aside" | "header" | "footer" | "nav" => 0.0,
        _ => 0.5,
    }
}

/// Density score per the weighted formula: text density, inverse link
/// density, tag importance, logarithmic word bonus and a small baseline.
fn score_candidate(element: ElementRef) -> f64 {
    let text = visible_text_of(element);
    let text_len = text.chars().count();
    if text_len == 0 {
        return 0.0;
    }
    let html_len = element.html().len().max(1);
    let text_density = (text_len as f64 / html_len as f64).min(1.0);

    let link_len = link_text_len(element).min(text_len);
    let link_density = link_len as f64 / text_len as f64;

    let words = text.split_whitespace().count();
    let word_bonus = ((words as f64 + 1.0).ln() / 1000f64.ln()).clamp(0.0, 1.0);

    0.35 * text_density
        + 0.25 * (1.0 - link_density)
        + 0.20 * tag_importance(element.value().name())
        + 0.10 * word_bonus
        + 0.10
}

fn qualifies(element: ElementRef) -> bool {
    !is_junk(&element)
        && paragraph_count(element) >= 1
        && visible_text_of(element).chars().count() >= MIN_CANDIDATE_CHARS
}

fn preferred_candidate(document: &Html) -> Option<(ElementRef<'_>, &'static str)> {
    for (css, label) in [
        ("article", "article"),
        ("main", "main"),
        ("[role=\"main\"]", "main"),
    ] {
        let selector = Selector::parse(css).expect("static selector");
        if let Some(found) = document.select(&selector).find(|el| qualifies(*el)) {
            return Some((found, label));
        }
    }

    let selector = Selector::parse("div, section").expect("static selector");
    let mut best: Option<(ElementRef<'_>, f64)> = None;
    for candidate in document.select(&selector).filter(|el| qualifies(*el)) {
        let score = score_candidate(candidate);
        let beats = best.map(|(_, s)| score > s).unwrap_or(true);
        if beats {
            best = Some((candidate, score));
        }
    }
    best.map(|(el, _)| (el, "div"))
}

/// Extract the main article from a document.
pub fn extract_article(html: &str) -> Article {
    let document = Html::parse_document(html);
    let body_selector = Selector::parse("body").expect("static selector");
    let body = document.select(&body_selector).next();

    let body_text = body.map(visible_text_of).unwrap_or_default();
    let body_len = body_text.chars().count().max(1);

    if let Some((candidate, label)) = preferred_candidate(&document) {
        let candidate_text = visible_text_of(candidate);
        let share = candidate_text.chars().count() as f64 / body_len as f64;
        if share >= SAFETY_FLOOR {
            debug!(root = label, share, "readability candidate selected");
            return Article {
                root_tag: label.to_string(),
                markdown: element_to_markdown(candidate),
                text: candidate_text,
            };
        }
        debug!(root = label, share, "candidate below safety floor, using body");
    }

    match body {
        Some(body_el) => Article {
            root_tag: "body".to_string(),
            markdown: element_to_markdown(body_el),
            text: body_text,
        },
        None => Article {
            root_tag: "body".to_string(),
            markdown: crate::markdown::html_to_markdown(html),
            text: body_text,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_paragraphs(n: usize) -> String {
        (0..n)
            .map(|i| {
                format!(
                    "<p>Paragraph {i} carries a reasonable amount of body text so that \
                     density scoring has something real to measure in this fixture.</p>"
                )
            })
            .collect()
    }

    #[test]
    fn article_tag_is_preferred() {
        let html = format!(
            "<html><body><div class=\"wrapper\">{}</div><article>{}</article></body></html>",
            long_paragraphs(2),
            long_paragraphs(3)
        );
        let article = extract_article(&html);
        assert_eq!(article.root_tag, "article");
        assert!(article.text.contains("Paragraph 2"));
    }

    #[test]
    fn content_div_beats_link_farm() {
        let links: String = (0..40)
            .map(|i| format!("<a href=\"/p{i}\">navigation link number {i}</a> "))
            .collect();
        let html = format!(
            "<html><body>\
             <div id=\"linkfarm\"><p>hub</p>{links}</div>\
             <div id=\"story\">{}</div>\
             </body></html>",
            long_paragraphs(6)
        );
        let article = extract_article(&html);
        assert_eq!(article.root_tag, "div");
        assert!(article.text.contains("Paragraph 5"));
        assert!(!article.markdown.contains("navigation link number 1]"));
    }

    #[test]
    fn tiny_candidate_falls_back_to_body() {
        // The only structured candidate holds a sliver of the page text.
        let html = format!(
            "<html><body><article><p>{}</p></article>{}</body></html>",
            "short intro that is still comfortably long enough to clear the candidate \
             minimum character bar, yet holds a small slice of the page overall.",
            long_paragraphs(20)
        );
        let article = extract_article(&html);
        assert_eq!(article.root_tag, "body");
        assert!(article.text.contains("Paragraph 19"));
    }

    #[test]
    fn junk_never_reaches_output() {
        let html = format!(
            "<html><body><article><nav>menu items here</nav>{}\
             <div class=\"newsletter-signup\">subscribe now</div></article></body></html>",
            long_paragraphs(3)
        );
        let article = extract_article(&html);
        assert!(!article.text.contains("menu items"));
        assert!(!article.text.contains("subscribe now"));
        assert!(!article.markdown.contains("subscribe now"));
    }

    #[test]
    fn visible_text_skips_hidden() {
        let doc = Html::parse_document(
            "<html><body id=\"b\"><p>seen</p><p style=\"display:none\">unseen</p></body></html>",
        );
        let selector = Selector::parse("body").unwrap();
        let body = doc.select(&selector).next().unwrap();
        let text = visible_text_of(body);
        assert!(text.contains("seen"));
        assert!(!text.contains("unseen"));
    }
}
