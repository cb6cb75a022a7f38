//! Document extraction: PDF and DOCX.
//!
//! Both parsers take raw bytes from the fetcher and produce plain text (PDF)
//! or semantic HTML (DOCX) for the downstream converters. Parse failures
//! surface as `PeelError::Document` so the dispatcher can report them with a
//! stable machine code.

pub mod docx;
pub mod pdf;

pub use docx::{docx_to_html, DocxContent};
pub use pdf::{PdfContent, PdfMetadata};
