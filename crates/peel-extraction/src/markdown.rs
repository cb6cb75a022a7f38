//! HTML to markdown / plain-text conversion.
//!
//! A recursive DOM walk with stable rules: ATX headings, fenced code blocks
//! (language preserved from `class="language-*"`), `-` bullets, `_` emphasis,
//! `**` strong, image alt text kept, tables kept as pipe tables. Chrome
//! elements are skipped via the shared junk tables.

use crate::selectors::is_junk;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

static EXCESS_NEWLINES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));
static WS_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("static regex"));

/// Convert a full HTML document to markdown.
pub fn html_to_markdown(html: &str) -> String {
    let document = Html::parse_document(html);
    let body_selector = Selector::parse("body").expect("static selector");
    let rendered = match document.select(&body_selector).next() {
        Some(body) => element_to_markdown(body),
        None => document
            .root_element()
            .children()
            .filter_map(ElementRef::wrap)
            .map(|el| element_to_markdown(el))
            .collect::<Vec<_>>()
            .join("\n\n"),
    };
    tidy(&rendered)
}

/// Convert one element subtree to markdown (used for readability
/// candidates and selector-scoped conversion).
pub fn element_to_markdown(element: ElementRef) -> String {
    tidy(&render_element(element, 0))
}

/// Plain-text rendition: visible text of headings, paragraphs, list items
/// and table cells, double-newline separated.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let selector =
        Selector::parse("h1, h2, h3, h4, h5, h6, p, li, blockquote, pre, td, th, figcaption")
            .expect("static selector");

    let mut parts: Vec<String> = Vec::new();
    for element in document.select(&selector) {
        if is_junk(&element) || element.ancestors().filter_map(ElementRef::wrap).any(|a| is_junk(&a))
        {
            continue;
        }
        // Skip containers whose text a nested match will emit again.
        if element
            .select(&selector)
            .next()
            .is_some_and(|inner| inner.id() != element.id())
        {
            continue;
        }
        let text = collapse_ws(&element.text().collect::<String>());
        if !text.is_empty() {
            parts.push(text);
        }
    }
    parts.join("\n\n")
}

fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tidy(markdown: &str) -> String {
    let collapsed = EXCESS_NEWLINES_RE.replace_all(markdown, "\n\n");
    collapsed.trim().to_string()
}

fn render_children(element: ElementRef, list_depth: usize) -> String {
    let mut out = String::new();
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let raw: &str = &text.text;
                let piece = WS_RUN_RE.replace_all(raw.trim_matches('\n'), " ");
                out.push_str(&piece);
            }
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    out.push_str(&render_element(child_el, list_depth));
                }
            }
            _ => {}
        }
    }
    out
}

/// Inline content: children rendered with newlines flattened to spaces.
fn render_inline(element: ElementRef, list_depth: usize) -> String {
    collapse_ws(&render_children(element, list_depth))
}

fn render_element(element: ElementRef, list_depth: usize) -> String {
    if is_junk(&element) {
        return String::new();
    }
    let tag = element.value().name();

    match tag {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = tag.as_bytes()[1] - b'0';
            let text = render_inline(element, list_depth);
            if text.is_empty() {
                String::new()
            } else {
                format!("\n\n{} {}\n\n", "#".repeat(level as usize), text)
            }
        }
        "p" => {
            let text = render_children(element, list_depth).trim().to_string();
            if text.is_empty() {
                String::new()
            } else {
                format!("\n\n{text}\n\n")
            }
        }
        "br" => "\n".to_string(),
        "hr" => "\n\n---\n\n".to_string(),
        "strong" | "b" => {
            let text = render_inline(element, list_depth);
            if text.is_empty() {
                String::new()
            } else {
                format!("**{text}**")
            }
        }
        "em" | "i" => {
            let text = render_inline(element, list_depth);
            if text.is_empty() {
                String::new()
            } else {
                format!("_{text}_")
            }
        }
        "code" => {
            // Inline only; fenced blocks are handled by the pre branch.
            let text = element.text().collect::<String>();
            let text = text.trim();
            if text.is_empty() {
                String::new()
            } else {
                format!("`{text}`")
            }
        }
        "pre" => render_code_block(element),
        "a" => render_link(element, list_depth),
        "img" => render_image(element),
        "blockquote" => {
            let inner = tidy(&render_children(element, list_depth));
            if inner.is_empty() {
                return String::new();
            }
            let quoted = inner
                .lines()
                .map(|line| format!("> {line}"))
                .collect::<Vec<_>>()
                .join("\n");
            format!("\n\n{quoted}\n\n")
        }
        "ul" => render_list(element, list_depth, false),
        "ol" => render_list(element, list_depth, true),
        "table" => render_table(element),
        _ => render_children(element, list_depth),
    }
}

fn render_code_block(element: ElementRef) -> String {
    let code_selector = Selector::parse("code").expect("static selector");
    let (text, language) = match element.select(&code_selector).next() {
        Some(code) => {
            let lang = code
                .value()
                .attr("class")
                .and_then(|classes| {
                    classes
                        .split_whitespace()
                        .find_map(|c| c.strip_prefix("language-"))
                })
                .unwrap_or("")
                .to_string();
            (code.text().collect::<String>(), lang)
        }
        None => (element.text().collect::<String>(), String::new()),
    };
    let text = text.trim_matches('\n');
    if text.trim().is_empty() {
        return String::new();
    }
    format!("\n\n```{language}\n{text}\n```\n\n")
}

fn render_link(element: ElementRef, list_depth: usize) -> String {
    let text = render_inline(element, list_depth);
    let href = element.value().attr("href").unwrap_or_default();
    if text.is_empty() {
        return String::new();
    }
    if href.is_empty() || href.starts_with("javascript:") || href.starts_with('#') {
        return text;
    }
    format!("[{text}]({href})")
}

fn render_image(element: ElementRef) -> String {
    let alt = element.value().attr("alt").unwrap_or_default().trim();
    let src = element.value().attr("src").unwrap_or_default();
    if src.is_empty() || src.starts_with("data:") {
        return if alt.is_empty() {
            String::new()
        } else {
            alt.to_string()
        };
    }
    format!("![{alt}]({src})")
}

fn render_list(element: ElementRef, list_depth: usize, ordered: bool) -> String {
    let mut out = String::from("\n\n");
    let indent = "  ".repeat(list_depth);
    let mut index = 0usize;
    for child in element.children() {
        let Some(item) = ElementRef::wrap(child) else {
            continue;
        };
        if item.value().name() != "li" || is_junk(&item) {
            continue;
        }
        index += 1;
        let marker = if ordered {
            format!("{index}.")
        } else {
            "-".to_string()
        };
        let body = render_children(item, list_depth + 1);
        let body = tidy(&body).replace('\n', &format!("\n{indent}  "));
        if !body.is_empty() {
            out.push_str(&format!("{indent}{marker} {body}\n"));
        }
    }
    out.push('\n');
    out
}

fn render_table(element: ElementRef) -> String {
    let row_selector = Selector::parse("tr").expect("static selector");
    let cell_selector = Selector::parse("th, td").expect("static selector");

    let mut rows: Vec<Vec<String>> = Vec::new();
    for row in element.select(&row_selector) {
        let cells: Vec<String> = row
            .select(&cell_selector)
            .map(|cell| collapse_ws(&cell.text().collect::<String>()).replace('|', "\\|"))
            .collect();
        if !cells.is_empty() {
            rows.push(cells);
        }
    }
    if rows.is_empty() {
        return String::new();
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = String::from("\n\n");
    for (i, row) in rows.iter().enumerate() {
        let mut padded = row.clone();
        padded.resize(width, String::new());
        out.push_str(&format!("| {} |\n", padded.join(" | ")));
        if i == 0 {
            out.push_str(&format!("|{}\n", " --- |".repeat(width)));
        }
    }
    out.push('\n');
    out
}
