//! JSON-LD first-class extraction.
//!
//! Structured data beats scraping when a page carries it: every
//! `application/ld+json` script is parsed, `@graph` and array forms are
//! flattened, and supported types render through fixed markdown templates.
//! The result is preferred over the DOM pipeline only when complete and
//! non-empty.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

/// Supported schema.org types, matched case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonLdKind {
    Recipe,
    Product,
    Article,
    FaqPage,
    HowTo,
    Event,
    LocalBusiness,
    Review,
}

impl JsonLdKind {
    fn from_type(type_name: &str) -> Option<Self> {
        match type_name.to_lowercase().as_str() {
            "recipe" => Some(Self::Recipe),
            "product" => Some(Self::Product),
            "article" | "newsarticle" | "blogposting" | "techarticle" => Some(Self::Article),
            "faqpage" => Some(Self::FaqPage),
            "howto" => Some(Self::HowTo),
            "event" => Some(Self::Event),
            "localbusiness" => Some(Self::LocalBusiness),
            "review" => Some(Self::Review),
            _ => None,
        }
    }
}

static ISO_DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^P(?:(\d+)D)?T?(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").expect("static regex"));

/// `PT20M` -> `20 min`, `PT1H30M` -> `1 h 30 min`.
fn human_duration(iso: &str) -> Option<String> {
    let caps = ISO_DURATION_RE.captures(iso.trim())?;
    let days: u64 = caps.get(1).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    let hours: u64 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    let mins: u64 = caps.get(3).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days} d"));
    }
    if hours > 0 {
        parts.push(format!("{hours} h"));
    }
    if mins > 0 {
        parts.push(format!("{mins} min"));
    }
    (!parts.is_empty()).then(|| parts.join(" "))
}

fn str_of(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| match v {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
}

fn name_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Object(_) => str_of(value, "name"),
        Value::Array(items) => items.first().and_then(name_of),
        _ => None,
    }
}

fn strings_of(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Object(_) => str_of(item, "text").or_else(|| str_of(item, "name")),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn rating_line(value: &Value) -> Option<String> {
    let rating = value
        .get("aggregateRating")
        .or_else(|| value.get("reviewRating"))?;
    let score = str_of(rating, "ratingValue")?;
    let count = str_of(rating, "ratingCount").or_else(|| str_of(rating, "reviewCount"));
    Some(match count {
        Some(count) => format!("Rating: {score} ({count} ratings)"),
        None => format!("Rating: {score}"),
    })
}

/// Flatten `@graph` wrappers and top-level arrays into candidate objects.
fn flatten(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.into_iter().flat_map(flatten).collect(),
        Value::Object(ref map) => {
            if let Some(graph) = map.get("@graph") {
                flatten(graph.clone())
            } else {
                vec![value]
            }
        }
        _ => Vec::new(),
    }
}

fn kind_of(value: &Value) -> Option<JsonLdKind> {
    match value.get("@type")? {
        Value::String(s) => JsonLdKind::from_type(s),
        Value::Array(types) => types
            .iter()
            .filter_map(|t| t.as_str())
            .find_map(JsonLdKind::from_type),
        _ => None,
    }
}

/// Extract markdown from the first supported, complete JSON-LD object on
/// the page. Returns `None` when nothing renders to a usable document.
pub fn extract_jsonld(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("script[type='application/ld+json']").ok()?;

    for script in document.select(&selector) {
        let raw: String = script.text().collect();
        let Ok(parsed) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };
        for candidate in flatten(parsed) {
            let Some(kind) = kind_of(&candidate) else {
                continue;
            };
            if let Some(markdown) = render(kind, &candidate) {
                debug!(?kind, "json-ld extraction succeeded");
                return Some(markdown);
            }
        }
    }
    None
}

fn render(kind: JsonLdKind, value: &Value) -> Option<String> {
    let markdown = match kind {
        JsonLdKind::Recipe => render_recipe(value)?,
        JsonLdKind::Product => render_product(value)?,
        JsonLdKind::Article => render_article(value)?,
        JsonLdKind::FaqPage => render_faq(value)?,
        JsonLdKind::HowTo => render_howto(value)?,
        JsonLdKind::Event => render_event(value)?,
        JsonLdKind::LocalBusiness => render_local_business(value)?,
        JsonLdKind::Review => render_review(value)?,
    };
    let trimmed = markdown.trim().to_string();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn render_recipe(value: &Value) -> Option<String> {
    let name = str_of(value, "name")?;
    let ingredients = strings_of(value, "recipeIngredient");
    let instructions = strings_of(value, "recipeInstructions");
    // A recipe without both lists is incomplete; let the DOM pipeline try.
    if ingredients.is_empty() && instructions.is_empty() {
        return None;
    }

    let mut out = format!("# {name}\n");
    if let Some(description) = str_of(value, "description") {
        out.push_str(&format!("\n{description}\n"));
    }
    for (key, label) in [
        ("prepTime", "Prep time"),
        ("cookTime", "Cook time"),
        ("totalTime", "Total time"),
    ] {
        if let Some(duration) = str_of(value, key).and_then(|d| human_duration(&d)) {
            out.push_str(&format!("\n**{label}:** {duration}"));
        }
    }
    if let Some(servings) = str_of(value, "recipeYield") {
        out.push_str(&format!("\n**Servings:** {servings}"));
    }
    if !ingredients.is_empty() {
        out.push_str("\n\n## Ingredients\n\n");
        for ingredient in &ingredients {
            out.push_str(&format!("- {ingredient}\n"));
        }
    }
    if !instructions.is_empty() {
        out.push_str("\n## Instructions\n\n");
        for (i, step) in instructions.iter().enumerate() {
            out.push_str(&format!("{}. {step}\n", i + 1));
        }
    }
    if let Some(rating) = rating_line(value) {
        out.push_str(&format!("\n{rating}\n"));
    }
    Some(out)
}

fn render_product(value: &Value) -> Option<String> {
    let name = str_of(value, "name")?;
    let mut out = format!("# {name}\n");
    if let Some(description) = str_of(value, "description") {
        out.push_str(&format!("\n{description}\n"));
    }
    if let Some(brand) = value.get("brand").and_then(name_of) {
        out.push_str(&format!("\n**Brand:** {brand}"));
    }
    let offer = match value.get("offers") {
        Some(Value::Array(offers)) => offers.first(),
        Some(offer @ Value::Object(_)) => Some(offer),
        _ => None,
    };
    if let Some(offer) = offer {
        if let Some(price) = str_of(offer, "price") {
            let currency = str_of(offer, "priceCurrency").unwrap_or_default();
            out.push_str(&format!("\n**Price:** {price} {currency}").trim_end());
        }
        if let Some(availability) = str_of(offer, "availability") {
            let availability = availability
                .rsplit('/')
                .next()
                .unwrap_or(&availability)
                .to_string();
            out.push_str(&format!("\n**Availability:** {availability}"));
        }
    }
    if let Some(rating) = rating_line(value) {
        out.push_str(&format!("\n\n{rating}\n"));
    }
    Some(out)
}

fn render_article(value: &Value) -> Option<String> {
    let headline = str_of(value, "headline").or_else(|| str_of(value, "name"))?;
    let body = str_of(value, "articleBody");
    let description = str_of(value, "description");
    // Headline alone is not a usable article.
    body.as_ref().or(description.as_ref())?;

    let mut out = format!("# {headline}\n");
    if let Some(author) = value.get("author").and_then(name_of) {
        out.push_str(&format!("\n**Author:** {author}"));
    }
    if let Some(published) = str_of(value, "datePublished") {
        out.push_str(&format!("\n**Published:** {published}"));
    }
    out.push('\n');
    match body {
        Some(body) => out.push_str(&format!("\n{body}\n")),
        None => {
            if let Some(description) = description {
                out.push_str(&format!("\n{description}\n"));
            }
        }
    }
    Some(out)
}

fn render_faq(value: &Value) -> Option<String> {
    let questions = match value.get("mainEntity") {
        Some(Value::Array(items)) => items.clone(),
        Some(single @ Value::Object(_)) => vec![single.clone()],
        _ => return None,
    };
    let title = str_of(value, "name").unwrap_or_else(|| "FAQ".to_string());
    let mut out = format!("# {title}\n");
    let mut rendered = 0;
    for question in &questions {
        let Some(q) = str_of(question, "name") else {
            continue;
        };
        let answer = question
            .pointer("/acceptedAnswer/text")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .trim()
            .to_string();
        out.push_str(&format!("\n## {q}\n"));
        if !answer.is_empty() {
            out.push_str(&format!("\n{answer}\n"));
        }
        rendered += 1;
    }
    (rendered > 0).then_some(out)
}

fn render_howto(value: &Value) -> Option<String> {
    let name = str_of(value, "name")?;
    let steps = strings_of(value, "step");
    if steps.is_empty() {
        return None;
    }
    let mut out = format!("# {name}\n");
    if let Some(description) = str_of(value, "description") {
        out.push_str(&format!("\n{description}\n"));
    }
    if let Some(total) = str_of(value, "totalTime").and_then(|d| human_duration(&d)) {
        out.push_str(&format!("\n**Total time:** {total}\n"));
    }
    out.push_str("\n## Steps\n\n");
    for (i, step) in steps.iter().enumerate() {
        out.push_str(&format!("{}. {step}\n", i + 1));
    }
    Some(out)
}

fn render_event(value: &Value) -> Option<String> {
    let name = str_of(value, "name")?;
    let mut out = format!("# {name}\n");
    if let Some(start) = str_of(value, "startDate") {
        out.push_str(&format!("\n**Starts:** {start}"));
    }
    if let Some(end) = str_of(value, "endDate") {
        out.push_str(&format!("\n**Ends:** {end}"));
    }
    if let Some(location) = value.get("location").and_then(name_of) {
        out.push_str(&format!("\n**Location:** {location}"));
    }
    out.push('\n');
    if let Some(description) = str_of(value, "description") {
        out.push_str(&format!("\n{description}\n"));
    }
    Some(out)
}

fn render_local_business(value: &Value) -> Option<String> {
    let name = str_of(value, "name")?;
    let mut out = format!("# {name}\n");
    if let Some(address) = value.get("address").and_then(|a| match a {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Object(_) => {
            let parts: Vec<String> = ["streetAddress", "addressLocality", "postalCode"]
                .iter()
                .filter_map(|k| str_of(a, k))
                .collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }) {
        out.push_str(&format!("\n**Address:** {address}"));
    }
    if let Some(phone) = str_of(value, "telephone") {
        out.push_str(&format!("\n**Phone:** {phone}"));
    }
    let hours = strings_of(value, "openingHours");
    if !hours.is_empty() {
        out.push_str(&format!("\n**Hours:** {}", hours.join("; ")));
    }
    out.push('\n');
    if let Some(description) = str_of(value, "description") {
        out.push_str(&format!("\n{description}\n"));
    }
    if let Some(rating) = rating_line(value) {
        out.push_str(&format!("\n{rating}\n"));
    }
    Some(out)
}

fn render_review(value: &Value) -> Option<String> {
    let item = value.get("itemReviewed").and_then(name_of)?;
    let mut out = format!("# Review: {item}\n");
    if let Some(author) = value.get("author").and_then(name_of) {
        out.push_str(&format!("\n**Reviewer:** {author}"));
    }
    if let Some(rating) = rating_line(value) {
        out.push_str(&format!("\n**{rating}**"));
    }
    out.push('\n');
    if let Some(body) = str_of(value, "reviewBody") {
        out.push_str(&format!("\n{body}\n"));
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with(jsonld: &str) -> String {
        format!(
            "<html><head><script type=\"application/ld+json\">{jsonld}</script></head>\
             <body><p>fallback body</p></body></html>"
        )
    }

    #[test]
    fn recipe_template_renders_all_fields() {
        let html = page_with(
            r#"{"@type":"Recipe","name":"Chocolate Chip Cookies",
                "recipeIngredient":["2 cups flour","1 cup sugar"],
                "recipeInstructions":[{"@type":"HowToStep","text":"Preheat oven to 375°F."},
                                       {"@type":"HowToStep","text":"Mix and bake."}],
                "prepTime":"PT20M",
                "aggregateRating":{"ratingValue":"4.8","ratingCount":"1234"}}"#,
        );
        let md = extract_jsonld(&html).expect("recipe should render");
        assert!(md.contains("# Chocolate Chip Cookies"));
        assert!(md.contains("2 cups flour"));
        assert!(md.contains("Preheat oven"));
        assert!(md.contains("20 min"));
        assert!(md.contains("4.8"));
        assert!(md.contains("1234"));
    }

    #[test]
    fn graph_wrapper_is_flattened() {
        let html = page_with(
            r#"{"@graph":[{"@type":"WebSite","name":"site"},
                {"@type":"NewsArticle","headline":"Graph Headline","articleBody":"The body."}]}"#,
        );
        let md = extract_jsonld(&html).expect("article in graph");
        assert!(md.contains("# Graph Headline"));
        assert!(md.contains("The body."));
    }

    #[test]
    fn incomplete_objects_fall_through() {
        // Headline with no body or description is not usable.
        let html = page_with(r#"{"@type":"Article","headline":"Only a headline"}"#);
        assert!(extract_jsonld(&html).is_none());

        let html = page_with(r#"{"@type":"Recipe","name":"Empty recipe"}"#);
        assert!(extract_jsonld(&html).is_none());
    }

    #[test]
    fn faq_renders_questions_as_sections() {
        let html = page_with(
            r#"{"@type":"FAQPage","mainEntity":[
                {"@type":"Question","name":"Is it free?",
                 "acceptedAnswer":{"@type":"Answer","text":"Yes, entirely."}},
                {"@type":"Question","name":"Does it sync?",
                 "acceptedAnswer":{"@type":"Answer","text":"Every hour."}}]}"#,
        );
        let md = extract_jsonld(&html).expect("faq");
        assert!(md.contains("## Is it free?"));
        assert!(md.contains("Yes, entirely."));
        assert!(md.contains("## Does it sync?"));
    }

    #[test]
    fn product_price_and_availability() {
        let html = page_with(
            r#"{"@type":"Product","name":"Widget","brand":{"name":"Acme"},
                "offers":{"price":"19.99","priceCurrency":"USD",
                          "availability":"https://schema.org/InStock"}}"#,
        );
        let md = extract_jsonld(&html).expect("product");
        assert!(md.contains("# Widget"));
        assert!(md.contains("**Brand:** Acme"));
        assert!(md.contains("19.99 USD"));
        assert!(md.contains("**Availability:** InStock"));
    }

    #[test]
    fn malformed_jsonld_is_skipped() {
        let html = page_with(r#"{"@type": "Recipe", not json at all"#);
        assert!(extract_jsonld(&html).is_none());
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(human_duration("PT20M").as_deref(), Some("20 min"));
        assert_eq!(human_duration("PT1H30M").as_deref(), Some("1 h 30 min"));
        assert_eq!(human_duration("P1DT2H").as_deref(), Some("1 d 2 h"));
        assert_eq!(human_duration("nonsense"), None);
    }

    #[test]
    fn type_array_is_recognised() {
        let html = page_with(
            r#"{"@type":["TechArticle","Article"],"headline":"Typed","articleBody":"B."}"#,
        );
        assert!(extract_jsonld(&html).is_some());
    }
}
