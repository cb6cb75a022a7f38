//! HTML understanding: readability pruning, markdown/text conversion,
//! JSON-LD extraction, metadata harvesting, quality scoring and token-budget
//! distillation.
//!
//! The entry point for the pipeline is [`convert::convert_html`], which ties
//! the pieces together; the individual modules stay usable on their own.

pub mod convert;
pub mod distill;
pub mod jsonld;
pub mod links;
pub mod markdown;
pub mod metadata;
pub mod quality;
pub mod readability;
pub mod selectors;

pub use convert::{convert_html, ConvertOptions, Converted};
pub use distill::{estimate_tokens, hard_truncate, smart_distill};
pub use jsonld::extract_jsonld;
pub use links::{collect_images, collect_links, extract_urls_from_text};
pub use markdown::{html_to_markdown, html_to_text};
pub use metadata::{extract_metadata, PageMetadata};
pub use quality::quality_score;
pub use readability::extract_article;

/// Reject HTML above this size before any parsing.
pub const MAX_HTML_BYTES: usize = 10 * 1024 * 1024;
/// Hard-truncate markdown output above this size.
pub const MAX_MARKDOWN_BYTES: usize = 1024 * 1024;
