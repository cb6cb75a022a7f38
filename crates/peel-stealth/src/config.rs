//! Stealth configuration for the browser rung.

use crate::user_agent::RotationStrategy;
use serde::{Deserialize, Serialize};

/// How aggressively the browser rung hides automation markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StealthPreset {
    /// Plain headless browser, no patches.
    None,
    /// Hide `navigator.webdriver`, normalise Accept-Language.
    #[default]
    Medium,
    /// Medium plus faked plugins, languages and automation-flag launch args.
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StealthConfig {
    pub preset: StealthPreset,
    pub rotation: RotationStrategy,
    /// Accept-Language sent by both rungs; normalised so the simple and
    /// browser rungs never disagree mid-escalation.
    pub accept_language: String,
    /// Extra Chromium launch flags appended after the preset's own.
    #[serde(default)]
    pub extra_flags: Vec<String>,
}

impl Default for StealthConfig {
    fn default() -> Self {
        Self {
            preset: StealthPreset::Medium,
            rotation: RotationStrategy::Random,
            accept_language: "en-US,en;q=0.9".to_string(),
            extra_flags: Vec::new(),
        }
    }
}

impl StealthConfig {
    pub fn high() -> Self {
        Self {
            preset: StealthPreset::High,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_medium() {
        let config = StealthConfig::default();
        assert_eq!(config.preset, StealthPreset::Medium);
        assert_eq!(config.accept_language, "en-US,en;q=0.9");
    }

    #[test]
    fn serde_roundtrip() {
        let config = StealthConfig::high();
        let json = serde_json::to_string(&config).unwrap();
        let back: StealthConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.preset, StealthPreset::High);
    }
}
