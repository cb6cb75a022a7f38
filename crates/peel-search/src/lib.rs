//! Query-focused content filtering and LLM-free question answering.
//!
//! Content blocks are ranked against a query with Okapi BM25; the filter
//! keeps relevant blocks in document order, and the quick-answer path scores
//! individual sentences with type-specific boosts to return short passages
//! with a confidence estimate.

pub mod answer;
pub mod blocks;
pub mod bm25;
pub mod sentences;

pub use answer::{quick_answer, QuestionType, QuickAnswer, Passage};
pub use blocks::{split_blocks, Block, BlockKind};
pub use bm25::{filter_blocks, tokenize, Bm25Model, FilterOutcome, BM25_B, BM25_K1};
pub use sentences::split_sentences;
