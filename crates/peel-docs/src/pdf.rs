//! PDF text and metadata extraction.

use lopdf::{Document, Object};
use once_cell::sync::Lazy;
use peel_types::{PeelError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub page_count: u32,
    pub encrypted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfContent {
    pub text: String,
    pub metadata: PdfMetadata,
    pub word_count: usize,
}

static MULTI_BLANK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("static regex"));
static TRAILING_SPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+\n").expect("static regex"));
static RUN_OF_SPACES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("static regex"));

impl PdfContent {
    /// Parse a PDF from raw bytes. Pages that fail to decode are skipped
    /// with a warning rather than failing the whole document.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 10 {
            return Err(PeelError::document("pdf data too small"));
        }
        if !data.starts_with(b"%PDF-") {
            return Err(PeelError::document("missing %PDF- signature"));
        }

        let document = Document::load_mem(data)
            .map_err(|e| PeelError::document(format!("failed to load pdf: {e}")))?;

        let pages = document.get_pages();
        let page_count = pages.len() as u32;
        let mut text = String::new();

        for (&page_number, _) in pages.iter() {
            match document.extract_text(&[page_number]) {
                Ok(page_text) => {
                    text.push_str(page_text.trim_end());
                    text.push_str("\n\n");
                }
                Err(e) => {
                    warn!(page = page_number, error = %e, "skipping undecodable pdf page");
                }
            }
        }

        let text = normalise_whitespace(&text);
        let word_count = text.split_whitespace().count();
        let mut metadata = extract_metadata(&document);
        metadata.page_count = page_count;

        Ok(Self {
            text,
            metadata,
            word_count,
        })
    }
}

fn extract_metadata(document: &Document) -> PdfMetadata {
    let mut metadata = PdfMetadata {
        encrypted: document.is_encrypted(),
        ..Default::default()
    };

    let info_dict = document
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| match obj {
            Object::Reference(id) => document.get_object(*id).ok(),
            other => Some(other),
        })
        .and_then(|obj| obj.as_dict().ok());

    if let Some(dict) = info_dict {
        metadata.title = dict_string(dict, b"Title");
        metadata.author = dict_string(dict, b"Author");
        metadata.subject = dict_string(dict, b"Subject");
        metadata.producer = dict_string(dict, b"Producer");
        metadata.creation_date = dict_string(dict, b"CreationDate");
    }
    metadata
}

fn dict_string(dict: &lopdf::Dictionary, key: &[u8]) -> Option<String> {
    let obj = dict.get(key).ok()?;
    let bytes = match obj {
        Object::String(bytes, _) => bytes.as_slice(),
        _ => return None,
    };
    let decoded = decode_pdf_string(bytes);
    let trimmed = decoded.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// PDF text strings are either PDFDocEncoded (treated as latin-ish bytes
/// here) or UTF-16BE with a BOM.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Collapse runs of spaces, strip trailing line whitespace, cap blank lines
/// at one.
pub fn normalise_whitespace(text: &str) -> String {
    let text = TRAILING_SPACE_RE.replace_all(text, "\n");
    let text = RUN_OF_SPACES_RE.replace_all(&text, " ");
    MULTI_BLANK_RE.replace_all(&text, "\n\n").trim().to_string()
}
