//! DOCX to semantic HTML.
//!
//! The converter walks the document body and emits headings, paragraphs,
//! lists and tables as plain HTML; the markdown converter downstream handles
//! the rest of the format options.

use docx_rs::{read_docx, DocumentChild, Paragraph, ParagraphChild, RunChild, TableRowChild};
use peel_types::{PeelError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocxContent {
    pub html: String,
    pub text: String,
    pub word_count: usize,
}

/// Convert DOCX bytes to semantic HTML plus the flattened text.
pub fn docx_to_html(data: &[u8]) -> Result<DocxContent> {
    let docx = read_docx(data)
        .map_err(|e| PeelError::document(format!("failed to read docx: {e:?}")))?;

    let mut html = String::new();
    let mut text = String::new();

    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(paragraph) => {
                let content = paragraph_text(paragraph);
                if content.trim().is_empty() {
                    continue;
                }
                let tag = heading_tag(paragraph).unwrap_or("p");
                html.push_str(&format!("<{tag}>{}</{tag}>\n", escape(&content)));
                text.push_str(&content);
                text.push_str("\n\n");
            }
            DocumentChild::Table(table) => {
                html.push_str("<table>\n");
                for row in &table.rows {
                    let docx_rs::TableChild::TableRow(row) = row;
                    html.push_str("<tr>");
                    for cell in &row.cells {
                        let TableRowChild::TableCell(cell) = cell;
                        let mut cell_text = String::new();
                        for content in &cell.children {
                            if let docx_rs::TableCellContent::Paragraph(p) = content {
                                cell_text.push_str(&paragraph_text(p));
                                cell_text.push(' ');
                            }
                        }
                        let cell_text = cell_text.trim().to_string();
                        html.push_str(&format!("<td>{}</td>", escape(&cell_text)));
                        text.push_str(&cell_text);
                        text.push(' ');
                    }
                    html.push_str("</tr>\n");
                    text.push('\n');
                }
                html.push_str("</table>\n");
                text.push('\n');
            }
            _ => {}
        }
    }

    let text = text.trim().to_string();
    let word_count = text.split_whitespace().count();

    if html.is_empty() {
        return Err(PeelError::document("docx contained no readable content"));
    }

    Ok(DocxContent {
        html,
        text,
        word_count,
    })
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut out = String::new();
    for child in &paragraph.children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                match run_child {
                    RunChild::Text(t) => out.push_str(&t.text),
                    RunChild::Tab(_) => out.push('\t'),
                    RunChild::Break(_) => out.push('\n'),
                    _ => {}
                }
            }
        }
    }
    out
}

/// Map Word heading styles onto h1..h6.
fn heading_tag(paragraph: &Paragraph) -> Option<&'static str> {
    let style = paragraph.property.style.as_ref()?.val.to_lowercase();
    match style.as_str() {
        "heading1" | "heading 1" | "title" => Some("h1"),
        "heading2" | "heading 2" => Some("h2"),
        "heading3" | "heading 3" => Some("h3"),
        "heading4" | "heading 4" => Some("h4"),
        "heading5" | "heading 5" => Some("h5"),
        "heading6" | "heading 6" => Some("h6"),
        _ => None,
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage_bytes() {
        assert!(matches!(
            docx_to_html(b"definitely not a zip archive"),
            Err(PeelError::Document { .. })
        ));
    }

    #[test]
    fn escape_handles_markup_characters() {
        assert_eq!(escape("a < b & c > d"), "a &lt; b &amp; c &gt; d");
    }

    #[test]
    fn heading_style_mapping() {
        let heading = Paragraph::new().style("Heading2");
        assert_eq!(heading_tag(&heading), Some("h2"));
        let body = Paragraph::new();
        assert_eq!(heading_tag(&body), None);
    }
}
