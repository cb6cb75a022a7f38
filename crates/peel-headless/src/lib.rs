//! Headless browser support for the escalation ladder.
//!
//! Implements the `PageRenderer` contract from `peel-fetch` on top of
//! chromiumoxide: a pool of warmed browsers for ordinary renders, exclusive
//! profile-backed launches for persistent sessions, stealth patches from
//! `peel-stealth`, and page-action execution.

pub mod actions;
pub mod launcher;
pub mod pool;
pub mod renderer;

pub use launcher::{launch_browser, LaunchOptions};
pub use pool::{BrowserPool, PoolConfig};
pub use renderer::ChromiumRenderer;
