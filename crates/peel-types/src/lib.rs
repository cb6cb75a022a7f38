//! Shared data model for the peel pipeline.
//!
//! This crate holds the request/result types exchanged between the fetcher,
//! the extractors and the API surface, plus the error taxonomy and the
//! cancellation signal every stage observes. It deliberately has no I/O
//! dependencies so every other crate can depend on it.

pub mod cancel;
pub mod errors;
pub mod outcome;
pub mod request;
pub mod result;

pub use cancel::CancellationSignal;
pub use errors::{PeelError, Result};
pub use outcome::{Body, FetchMethod, FetchOutcome};
pub use request::{
    ExtractConfig, OutputFormat, PageAction, PeelRequest, MAX_URL_LEN, MAX_WAIT_MS,
};
pub use result::{content_fingerprint, ContentKind, PeelResult};
