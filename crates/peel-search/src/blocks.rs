//! Markdown block splitting.
//!
//! A block is the BM25 "document": a fenced code block, a heading merged
//! with its following paragraph, a contiguous list or table, or a single
//! paragraph.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Code,
    Heading,
    List,
    Table,
    Paragraph,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    pub text: String,
}

fn is_list_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("- ")
        || trimmed.starts_with("* ")
        || trimmed.starts_with("+ ")
        || matches!(
            trimmed.split_once('.'),
            Some((n, rest)) if !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) && rest.starts_with(' ')
        )
}

fn is_table_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|') && trimmed.len() > 1
}

/// Split markdown into logical blocks, preserving document order.
pub fn split_blocks(markdown: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let lines: Vec<&str> = markdown.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();

        if trimmed.is_empty() {
            i += 1;
            continue;
        }

        // Fenced code: one block, fence to fence.
        if trimmed.starts_with("```") {
            let mut body = vec![line];
            i += 1;
            while i < lines.len() {
                body.push(lines[i]);
                if lines[i].trim().starts_with("```") {
                    i += 1;
                    break;
                }
                i += 1;
            }
            blocks.push(Block {
                kind: BlockKind::Code,
                text: body.join("\n"),
            });
            continue;
        }

        // Heading: merge with the paragraph that follows it, if any.
        if trimmed.starts_with('#') {
            let mut body = vec![line];
            i += 1;
            while i < lines.len() && lines[i].trim().is_empty() {
                i += 1;
            }
            while i < lines.len() {
                let next = lines[i].trim();
                if next.is_empty()
                    || next.starts_with('#')
                    || next.starts_with("```")
                    || is_list_line(lines[i])
                    || is_table_line(lines[i])
                {
                    break;
                }
                body.push(lines[i]);
                i += 1;
            }
            blocks.push(Block {
                kind: BlockKind::Heading,
                text: body.join("\n"),
            });
            continue;
        }

        // Contiguous list.
        if is_list_line(line) {
            let mut body = vec![line];
            i += 1;
            while i < lines.len() && (is_list_line(lines[i]) || lines[i].starts_with("  ")) {
                body.push(lines[i]);
                i += 1;
            }
            blocks.push(Block {
                kind: BlockKind::List,
                text: body.join("\n"),
            });
            continue;
        }

        // Contiguous table.
        if is_table_line(line) {
            let mut body = vec![line];
            i += 1;
            while i < lines.len() && is_table_line(lines[i]) {
                body.push(lines[i]);
                i += 1;
            }
            blocks.push(Block {
                kind: BlockKind::Table,
                text: body.join("\n"),
            });
            continue;
        }

        // Paragraph: consecutive non-empty plain lines.
        let mut body = vec![line];
        i += 1;
        while i < lines.len() {
            let next = lines[i];
            let next_trimmed = next.trim();
            if next_trimmed.is_empty()
                || next_trimmed.starts_with('#')
                || next_trimmed.starts_with("```")
                || is_list_line(next)
                || is_table_line(next)
            {
                break;
            }
            body.push(next);
            i += 1;
        }
        blocks.push(Block {
            kind: BlockKind::Paragraph,
            text: body.join("\n"),
        });
    }

    blocks
}
