//! Challenge-page detection.
//!
//! Seven vendor scorers run over the same `(html, status)` pair, each
//! accumulating additive weights capped at 1.0. The highest score wins; a
//! page is a challenge iff that score reaches the 0.7 threshold. Pages with
//! substantial visible text suppress every scorer except the empty-shell
//! one, so an article that merely mentions "CAPTCHA" never trips the
//! detector.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const CHALLENGE_THRESHOLD: f64 = 0.7;

/// Visible-text suppression bounds.
const SUPPRESS_TEXT_CHARS: usize = 1500;
const SUPPRESS_TEXT_CHARS_LONG_HTML: usize = 600;
const SUPPRESS_HTML_LEN: usize = 5000;

/// Empty-shell shape: big document, almost no text.
const SHELL_MIN_HTML: usize = 10_000;
const SHELL_MAX_TEXT: usize = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChallengeKind {
    Cloudflare,
    Perimeterx,
    Akamai,
    Datadome,
    Incapsula,
    GenericBlock,
    EmptyShell,
}

impl std::fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChallengeKind::Cloudflare => "cloudflare",
            ChallengeKind::Perimeterx => "perimeterx",
            ChallengeKind::Akamai => "akamai",
            ChallengeKind::Datadome => "datadome",
            ChallengeKind::Incapsula => "incapsula",
            ChallengeKind::GenericBlock => "generic-block",
            ChallengeKind::EmptyShell => "empty-shell",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeVerdict {
    pub is_challenge: bool,
    pub kind: Option<ChallengeKind>,
    /// 0.0 .. 1.0, the winning scorer's total.
    pub confidence: f64,
    /// Signature names that contributed, for logs and API diagnostics.
    pub details: Vec<String>,
}

impl ChallengeVerdict {
    fn clean() -> Self {
        Self {
            is_challenge: false,
            kind: None,
            confidence: 0.0,
            details: Vec::new(),
        }
    }
}

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("static regex"));
static SCRIPT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>|<noscript\b.*?</noscript>")
        .expect("static regex")
});
static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("static regex"));

/// Strip script/style blocks and tags, collapse whitespace. Good enough for
/// length heuristics; the readability engine does the real text extraction.
pub fn visible_text(html: &str) -> String {
    let no_scripts = SCRIPT_RE.replace_all(html, " ");
    let no_tags = TAG_RE.replace_all(&no_scripts, " ");
    no_tags.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn page_title(html: &str) -> String {
    TITLE_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_lowercase())
        .unwrap_or_default()
}

/// One additive scorer. Weights accumulate and cap at 1.0.
struct Scorer {
    kind: ChallengeKind,
    score: f64,
    details: Vec<String>,
}

impl Scorer {
    fn new(kind: ChallengeKind) -> Self {
        Self {
            kind,
            score: 0.0,
            details: Vec::new(),
        }
    }

    fn add(&mut self, weight: f64, signature: &str) {
        self.score = (self.score + weight).min(1.0);
        self.details.push(signature.to_string());
    }

    fn add_if(&mut self, condition: bool, weight: f64, signature: &str) {
        if condition {
            self.add(weight, signature);
        }
    }
}

fn blockish_status(status: u16) -> bool {
    matches!(status, 403 | 429 | 503)
}

/// Score `(html, status)` against all vendor signatures.
pub fn detect_challenge(html: &str, status: u16) -> ChallengeVerdict {
    let lower = html.to_lowercase();
    let title = page_title(html);
    let text = visible_text(html);
    let text_len = text.chars().count();
    let small_body = html.len() < 2000;

    // A 404 with a not-found-looking title is a missing page, not a wall.
    if status == 404 && (title.contains("not found") || title.contains("404")) {
        return ChallengeVerdict::clean();
    }

    // Long articles that merely mention a vendor are not challenges. Only
    // the empty-shell scorer survives suppression.
    let suppressed = text_len > SUPPRESS_TEXT_CHARS
        || (text_len > SUPPRESS_TEXT_CHARS_LONG_HTML && html.len() > SUPPRESS_HTML_LEN);

    let mut scorers: Vec<Scorer> = Vec::with_capacity(7);

    if !suppressed {
        let mut cf = Scorer::new(ChallengeKind::Cloudflare);
        cf.add_if(lower.contains("cf-browser-verification"), 0.5, "cf-browser-verification");
        cf.add_if(lower.contains("cf-chl"), 0.4, "cf-chl token");
        cf.add_if(
            lower.contains("challenges.cloudflare.com") || lower.contains("turnstile"),
            0.4,
            "turnstile script",
        );
        cf.add_if(lower.contains("cdn-cgi/"), 0.3, "cdn-cgi path");
        cf.add_if(lower.contains("ray id"), 0.3, "ray id");
        cf.add_if(title.contains("just a moment"), 0.4, "just-a-moment title");
        cf.add_if(
            lower.contains("checking your browser"),
            0.3,
            "checking-your-browser text",
        );
        cf.add_if(
            blockish_status(status) && small_body && lower.contains("cloudflare"),
            0.3,
            "block status with cloudflare body",
        );
        scorers.push(cf);

        let mut px = Scorer::new(ChallengeKind::Perimeterx);
        px.add_if(
            lower.contains("perimeterx") || lower.contains("px-captcha"),
            0.5,
            "perimeterx marker",
        );
        px.add_if(lower.contains("_pxhd") || lower.contains("_px3"), 0.4, "px cookie seed");
        px.add_if(lower.contains("press & hold"), 0.4, "press-and-hold prompt");
        px.add_if(
            blockish_status(status) && small_body && lower.contains("human"),
            0.2,
            "block status with human-check body",
        );
        scorers.push(px);

        let mut ak = Scorer::new(ChallengeKind::Akamai);
        ak.add_if(
            lower.contains("_abck") || lower.contains("ak_bmsc"),
            0.5,
            "akamai sensor cookie",
        );
        ak.add_if(lower.contains("akamai"), 0.3, "akamai marker");
        ak.add_if(title.contains("access denied"), 0.4, "access-denied title");
        ak.add_if(lower.contains("reference #"), 0.3, "reference id");
        scorers.push(ak);

        let mut dd = Scorer::new(ChallengeKind::Datadome);
        dd.add_if(lower.contains("datadome"), 0.6, "datadome marker");
        dd.add_if(
            lower.contains("geo.captcha-delivery.com"),
            0.5,
            "captcha-delivery host",
        );
        dd.add_if(
            blockish_status(status) && small_body && lower.contains("blocked"),
            0.2,
            "block status with blocked body",
        );
        scorers.push(dd);

        let mut inc = Scorer::new(ChallengeKind::Incapsula);
        inc.add_if(
            lower.contains("_incapsula_resource"),
            0.6,
            "incapsula resource",
        );
        inc.add_if(
            lower.contains("incapsula") || lower.contains("imperva"),
            0.5,
            "incapsula marker",
        );
        inc.add_if(
            lower.contains("request unsuccessful"),
            0.4,
            "request-unsuccessful text",
        );
        scorers.push(inc);

        let mut generic = Scorer::new(ChallengeKind::GenericBlock);
        generic.add_if(title.contains("access denied"), 0.5, "access-denied title");
        generic.add_if(
            lower.contains("you have been blocked"),
            0.5,
            "blocked banner",
        );
        generic.add_if(
            lower.contains("unusual traffic"),
            0.4,
            "unusual-traffic banner",
        );
        generic.add_if(
            lower.contains("verify you are human") || lower.contains("verify you're human"),
            0.4,
            "human-verification prompt",
        );
        generic.add_if(
            lower.contains("captcha") && (lower.contains("<form") || lower.contains("data-sitekey")),
            0.3,
            "captcha form",
        );
        generic.add_if(
            blockish_status(status) && small_body,
            0.3,
            "block status with small body",
        );
        scorers.push(generic);
    }

    let mut shell = Scorer::new(ChallengeKind::EmptyShell);
    if html.len() >= SHELL_MIN_HTML && text_len < SHELL_MAX_TEXT {
        shell.add(0.8, "huge html with no visible text");
        shell.add_if(
            lower.contains("id=\"root\"") || lower.contains("id=\"app\"") || lower.contains("id=\"__next\""),
            0.2,
            "bare spa mount point",
        );
    }

    let mut winner = shell;
    for scorer in scorers {
        if scorer.score > winner.score {
            winner = scorer;
        }
    }

    if winner.score >= CHALLENGE_THRESHOLD {
        ChallengeVerdict {
            is_challenge: true,
            kind: Some(winner.kind),
            confidence: winner.score,
            details: winner.details,
        }
    } else {
        ChallengeVerdict {
            is_challenge: false,
            kind: None,
            confidence: winner.score,
            details: winner.details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloudflare_challenge_page_scores_high() {
        let html = format!(
            "<html><head><title>Just a moment...</title></head><body>\
             <div class=\"cf-browser-verification\">Checking your browser</div>{}</body></html>",
            " ".repeat(100)
        );
        assert!(html.len() < 2000);
        let verdict = detect_challenge(&html, 503);
        assert!(verdict.is_challenge);
        assert_eq!(verdict.kind, Some(ChallengeKind::Cloudflare));
        assert!(verdict.confidence >= 0.7);
    }

    #[test]
    fn long_article_mentioning_challenges_is_suppressed() {
        let body = "The phrase Just a moment and even the word CAPTCHA appear \
                    in this long article about anti-bot vendors like cloudflare. "
            .repeat(40);
        let html = format!("<html><body><article><p>{body}</p></article></body></html>");
        assert!(visible_text(&html).chars().count() > 1500);
        let verdict = detect_challenge(&html, 200);
        assert!(!verdict.is_challenge);
    }

    #[test]
    fn not_found_page_is_never_a_challenge() {
        let html = "<html><head><title>404 Not Found</title></head>\
                    <body>Access denied? No, just missing.</body></html>";
        let verdict = detect_challenge(html, 404);
        assert!(!verdict.is_challenge);
        assert_eq!(verdict.confidence, 0.0);
    }

    #[test]
    fn empty_shell_detected_even_with_long_html() {
        let html = format!(
            "<html><body><div id=\"root\"></div><script>{}</script></body></html>",
            "var x = 1;".repeat(2000)
        );
        let verdict = detect_challenge(&html, 200);
        assert!(verdict.is_challenge);
        assert_eq!(verdict.kind, Some(ChallengeKind::EmptyShell));
    }

    #[test]
    fn perimeterx_press_and_hold() {
        let html = "<html><body><div id=\"px-captcha\">Press & Hold to confirm you \
                    are a human</div></body></html>";
        let verdict = detect_challenge(html, 403);
        assert!(verdict.is_challenge);
        assert_eq!(verdict.kind, Some(ChallengeKind::Perimeterx));
    }

    #[test]
    fn ordinary_page_scores_low() {
        let html = "<html><head><title>Weather today</title></head>\
                    <body><p>Sunny with light winds.</p></body></html>";
        let verdict = detect_challenge(html, 200);
        assert!(!verdict.is_challenge);
        assert!(verdict.confidence < 0.7);
    }

    #[test]
    fn visible_text_strips_scripts_and_tags() {
        let html = "<html><body><script>var hidden = 1;</script>\
                    <style>p { color: red }</style><p>shown  text</p></body></html>";
        assert_eq!(visible_text(html), "shown text");
    }
}
