//! Pipeline orchestration: the staged flow that turns a URL into a
//! `PeelResult`.
//!
//! Stages: validate → cache lookup → escalation fetch → content-type
//! dispatch → post-processing (query filter, quick answer, declarative
//! extraction, distillation) → result assembly. Long-lived services (cache,
//! governor, DNS, browser) are created once at process start and travel in
//! [`PeelServices`].

pub mod dispatch;
pub mod feed;
pub mod pipeline;
pub mod services;

pub use dispatch::dispatch_outcome;
pub use pipeline::{peel, PipelineConfig};
pub use services::PeelServices;
