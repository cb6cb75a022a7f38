//! Navigator patches and launch flags for the stealth rung.

use crate::config::{StealthConfig, StealthPreset};

/// JS evaluated on every new document before page scripts run. Hides the
/// webdriver marker and, at the high preset, fakes the plugin and language
/// surfaces detection scripts probe.
pub fn stealth_init_script(config: &StealthConfig) -> String {
    let mut script = String::new();
    if config.preset == StealthPreset::None {
        return script;
    }

    script.push_str(
        "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });\n",
    );
    script.push_str(&format!(
        "Object.defineProperty(navigator, 'languages', {{ get: () => {} }});\n",
        languages_literal(&config.accept_language)
    ));

    if config.preset == StealthPreset::High {
        script.push_str(
            "Object.defineProperty(navigator, 'plugins', {\n  get: () => [\n    { name: 'PDF Viewer', filename: 'internal-pdf-viewer' },\n    { name: 'Chrome PDF Viewer', filename: 'internal-pdf-viewer' },\n    { name: 'Native Client', filename: 'internal-nacl-plugin' }\n  ]\n});\n",
        );
        script.push_str(
            "window.chrome = window.chrome || { runtime: {} };\n",
        );
        script.push_str(
            "const origQuery = navigator.permissions && navigator.permissions.query;\nif (origQuery) {\n  navigator.permissions.query = (params) =>\n    params.name === 'notifications'\n      ? Promise.resolve({ state: Notification.permission })\n      : origQuery(params);\n}\n",
        );
    }
    script
}

/// Chromium launch flags per preset, with the caller's extras appended.
pub fn stealth_launch_flags(config: &StealthConfig) -> Vec<String> {
    let mut flags = vec![
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        format!("--lang={}", primary_language(&config.accept_language)),
    ];
    if config.preset != StealthPreset::None {
        flags.push("--disable-blink-features=AutomationControlled".to_string());
    }
    if config.preset == StealthPreset::High {
        flags.push("--disable-infobars".to_string());
        flags.push("--window-size=1920,1080".to_string());
    }
    flags.extend(config.extra_flags.iter().cloned());
    flags
}

/// `"en-US,en;q=0.9"` -> `['en-US', 'en']` as a JS array literal.
fn languages_literal(accept_language: &str) -> String {
    let langs: Vec<String> = accept_language
        .split(',')
        .filter_map(|part| {
            let lang = part.split(';').next()?.trim();
            (!lang.is_empty()).then(|| format!("'{lang}'"))
        })
        .collect();
    format!("[{}]", langs.join(", "))
}

fn primary_language(accept_language: &str) -> &str {
    accept_language
        .split([',', ';'])
        .next()
        .unwrap_or("en-US")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_preset_emits_no_script() {
        let config = StealthConfig {
            preset: StealthPreset::None,
            ..Default::default()
        };
        assert!(stealth_init_script(&config).is_empty());
        let flags = stealth_launch_flags(&config);
        assert!(!flags
            .iter()
            .any(|f| f.contains("AutomationControlled")));
    }

    #[test]
    fn medium_hides_webdriver() {
        let script = stealth_init_script(&StealthConfig::default());
        assert!(script.contains("webdriver"));
        assert!(script.contains("['en-US', 'en']"));
        assert!(!script.contains("plugins"));
    }

    #[test]
    fn high_fakes_plugins_and_adds_flags() {
        let config = StealthConfig::high();
        let script = stealth_init_script(&config);
        assert!(script.contains("PDF Viewer"));
        assert!(script.contains("window.chrome"));

        let flags = stealth_launch_flags(&config);
        assert!(flags.iter().any(|f| f == "--disable-infobars"));
        assert!(flags.iter().any(|f| f == "--lang=en-US"));
    }

    #[test]
    fn extra_flags_appended_last() {
        let config = StealthConfig {
            extra_flags: vec!["--proxy-server=http://127.0.0.1:8888".into()],
            ..Default::default()
        };
        let flags = stealth_launch_flags(&config);
        assert_eq!(
            flags.last().map(String::as_str),
            Some("--proxy-server=http://127.0.0.1:8888")
        );
    }
}
