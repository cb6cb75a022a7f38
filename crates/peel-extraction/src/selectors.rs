//! Shared chrome/content classification tables.
//!
//! These lists drive both readability pruning and markdown conversion: the
//! same element is junk (or protected) in both places.

use scraper::ElementRef;

/// Tags that never carry article content.
pub const JUNK_TAGS: &[&str] = &[
    "nav", "footer", "aside", "header", "script", "style", "iframe", "form", "noscript",
    "svg", "button", "input", "select", "textarea",
];

/// Class/id fragments that denote page chrome.
pub const JUNK_PATTERNS: &[&str] = &[
    "sidebar", "cookie", "banner", "advert", "-ad-", "ad-slot", "popup", "social", "share",
    "breadcrumb", "newsletter", "signup", "related", "comments", "comment-list", "toc",
    "consent", "gdpr", "vote", "post-menu", "share-button", "edit-link", "toast", "snackbar",
    "back-to-top", "skip-link", "promo", "subscribe", "paywall", "masthead", "site-header",
    "site-footer", "menu-item", "dropdown", "modal", "overlay",
];

/// Class/id fragments that mark real content; these win over junk matches.
pub const CONTENT_PATTERNS: &[&str] = &[
    "article", "post-content", "entry-content", "story", "prose", "markdown-body",
    "post-body", "article-body", "main-content",
];

/// Tags the pruning passes must never drop, whatever their density.
pub const DENSITY_SAFE_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "pre", "code", "blockquote", "table", "thead",
    "tbody", "tr", "td", "th", "ul", "ol", "li",
];

fn attr_matches(value: &str, patterns: &[&str]) -> bool {
    let lower = value.to_lowercase();
    patterns.iter().any(|p| lower.contains(p))
}

pub fn is_density_safe(tag: &str) -> bool {
    DENSITY_SAFE_TAGS.contains(&tag)
}

/// Hidden via inline style, the `hidden` attribute or aria-hidden.
pub fn is_hidden(element: &ElementRef) -> bool {
    let value = element.value();
    if value.attr("hidden").is_some() {
        return true;
    }
    if value.attr("aria-hidden") == Some("true") {
        return true;
    }
    if let Some(style) = value.attr("style") {
        let style = style.to_lowercase().replace(' ', "");
        if style.contains("display:none") || style.contains("visibility:hidden") {
            return true;
        }
    }
    false
}

/// Chrome test for one element: junk tag, junk class/id (unless a content
/// pattern protects it), or hidden. Density-safe tags are never junk.
pub fn is_junk(element: &ElementRef) -> bool {
    let value = element.value();
    let tag = value.name();

    if is_density_safe(tag) {
        return is_hidden(element);
    }
    if JUNK_TAGS.contains(&tag) {
        return true;
    }
    if is_hidden(element) {
        return true;
    }

    let class_attr = value.attr("class").unwrap_or_default();
    let id_attr = value.attr("id").unwrap_or_default();
    let combined = format!("{class_attr} {id_attr}");

    if attr_matches(&combined, CONTENT_PATTERNS) {
        return false;
    }
    attr_matches(&combined, JUNK_PATTERNS)
}
