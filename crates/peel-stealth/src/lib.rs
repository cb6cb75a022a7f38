//! Anti-bot challenge detection and evasion.
//!
//! Two halves: a detector that scores HTML for bot-protection signatures
//! (used by the escalation fetcher to decide when a response is a challenge
//! page rather than content), and the stealth configuration applied to the
//! browser rung (user-agent rotation, launch flags, navigator patches).

pub mod config;
pub mod detector;
pub mod evasion;
pub mod user_agent;

pub use config::{StealthConfig, StealthPreset};
pub use detector::{detect_challenge, visible_text, ChallengeKind, ChallengeVerdict};
pub use evasion::{stealth_init_script, stealth_launch_flags};
pub use user_agent::{realistic_headers, RotationStrategy, UserAgentRotator};
