//! Fetch layer: HTTP client construction, the per-host governor, the DNS
//! pre-resolver and the escalation ladder that walks simple → browser →
//! stealth until a rung yields real content.

pub mod client;
pub mod dns;
pub mod escalation;
pub mod governor;

pub use client::{build_client, ClientConfig};
pub use dns::PreResolver;
pub use escalation::{
    EscalationConfig, EscalationFetcher, PageRenderer, RenderRequest, RenderedPage,
};
pub use governor::{GovernorConfig, HostGovernor};
