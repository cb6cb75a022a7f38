//! End-to-end pipeline runs against a fixture server.

use peel_pipeline::{peel, PeelServices};
use peel_types::{content_fingerprint, FetchMethod, PeelError, PeelRequest};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn article_page() -> String {
    let paragraphs: String = (0..6)
        .map(|i| {
            format!(
                "<p>Paragraph {i} of the article, long enough for the readability \
                 scorer to find meaningful prose to keep in the result.</p>"
            )
        })
        .collect();
    format!(
        "<html><head><title>Fixture</title>\
         <meta property=\"og:title\" content=\"Fixture Article\">\
         <meta property=\"og:description\" content=\"A fixture for pipeline tests.\">\
         </head><body><nav>chrome to drop</nav>\
         <article><h1>Fixture Article</h1>{paragraphs}\
         <a href=\"/related\">related</a>\
         <a href=\"mailto:x@example.com\">mail</a></article></body></html>"
    )
}

async fn mount_article(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(article_page()),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn html_article_satisfies_result_invariants() {
    let server = MockServer::start().await;
    mount_article(&server).await;

    let services = PeelServices::build_for_tests(None).unwrap();
    let request = PeelRequest::new(format!("{}/article", server.uri()));
    let result = peel(&services, &request).await.unwrap();

    // tokens > 0 on a 200 with non-empty body
    assert!(result.tokens > 0);
    // fingerprint = 16-hex prefix of sha256(content)
    assert_eq!(result.fingerprint, content_fingerprint(&result.content));
    assert_eq!(result.fingerprint.len(), 16);
    // links are http(s) only, sorted, deduped
    assert!(result
        .links
        .iter()
        .all(|l| l.starts_with("http://") || l.starts_with("https://")));
    let mut sorted = result.links.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted, result.links);
    // method is the strategy that produced the bytes
    assert_eq!(result.method, FetchMethod::Simple);
    assert_eq!(result.title.as_deref(), Some("Fixture Article"));
    assert!(result.content.contains("# Fixture Article"));
    assert!(!result.content.contains("chrome to drop"));
}

#[tokio::test]
async fn cache_hit_is_byte_identical() {
    let server = MockServer::start().await;
    mount_article(&server).await;

    let services = PeelServices::build_for_tests(None).unwrap();
    let request = PeelRequest::new(format!("{}/article", server.uri()));

    let first = peel(&services, &request).await.unwrap();
    let second = peel(&services, &request).await.unwrap();

    assert_eq!(first.content, second.content);
    assert_eq!(first.fingerprint, second.fingerprint);
    // only one real fetch happened
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn no_cache_refetches_with_identical_content() {
    let server = MockServer::start().await;
    mount_article(&server).await;

    let services = PeelServices::build_for_tests(None).unwrap();
    let mut request = PeelRequest::new(format!("{}/article", server.uri()));
    request.no_cache = true;

    let first = peel(&services, &request).await.unwrap();
    let second = peel(&services, &request).await.unwrap();
    assert_eq!(first.content, second.content);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn question_filters_and_answers() {
    let server = MockServer::start().await;
    let page = "<html><head><title>Prices</title></head><body><article>\
        <h1>Travel notes</h1>\
        <p>The city has many museums and they are mostly free on Sundays.</p>\
        <p>Hotel prices range from 90 to 240 euros per night in the old town.</p>\
        <p>Local food is inexpensive and portions are generous everywhere.</p>\
        <p>Trams run all night on weekends which is quite convenient.</p>\
        </article></body></html>";
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(page),
        )
        .mount(&server)
        .await;

    let services = PeelServices::build_for_tests(None).unwrap();
    let mut request = PeelRequest::new(server.uri());
    request.question = Some("how much do hotels cost".to_string());
    let result = peel(&services, &request).await.unwrap();

    assert!(result.content.contains("Hotel prices"));
    assert!(result.metadata.contains_key("filterKept"));
}

#[tokio::test]
async fn max_tokens_truncates_with_notice() {
    let server = MockServer::start().await;
    mount_article(&server).await;

    let services = PeelServices::build_for_tests(None).unwrap();
    let mut request = PeelRequest::new(format!("{}/article", server.uri()));
    request.max_tokens = Some(40);
    let result = peel(&services, &request).await.unwrap();

    assert!(result.content.contains("[Content truncated to ~40 tokens]"));
    assert!(result.tokens <= 80);
}

#[tokio::test]
async fn validation_failures_short_circuit() {
    let services = PeelServices::build_for_tests(None).unwrap();

    let long_url = format!("https://example.com/{}", "a".repeat(3000));
    let err = peel(&services, &PeelRequest::new(long_url)).await.unwrap_err();
    assert!(matches!(err, PeelError::Validation { .. }));

    let err = peel(&services, &PeelRequest::new("ftp://example.com/x"))
        .await
        .unwrap_err();
    assert!(matches!(err, PeelError::Validation { .. }));
}

#[tokio::test]
async fn json_body_dispatches_to_json_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string(r#"{"name":"peel","docs":"https://example.com/docs"}"#),
        )
        .mount(&server)
        .await;

    let services = PeelServices::build_for_tests(None).unwrap();
    let result = peel(&services, &PeelRequest::new(server.uri())).await.unwrap();
    assert_eq!(result.quality, 1.0);
    assert!(result.content.contains("\"name\": \"peel\""));
    assert_eq!(result.links, vec!["https://example.com/docs"]);
}

#[tokio::test]
async fn extract_css_fields_populate_extracted() {
    let server = MockServer::start().await;
    let page = "<html><body><article>\
        <h1 class=\"product-name\">Fancy Kettle</h1>\
        <span class=\"price\">$49</span>\
        <p>A kettle description long enough to clear readability minimums and \
        provide a little bit of honest prose about boiling water.</p>\
        </article></body></html>";
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(page),
        )
        .mount(&server)
        .await;

    let services = PeelServices::build_for_tests(None).unwrap();
    let mut request = PeelRequest::new(server.uri());
    let mut css = std::collections::HashMap::new();
    css.insert("name".to_string(), ".product-name".to_string());
    css.insert("price".to_string(), ".price".to_string());
    request.extract = Some(peel_types::ExtractConfig {
        css,
        prompt: None,
        schema: None,
    });

    let result = peel(&services, &request).await.unwrap();
    let extracted = result.extracted.expect("extracted fields");
    assert_eq!(extracted.get("name"), Some(&serde_json::json!("Fancy Kettle")));
    assert_eq!(extracted.get("price"), Some(&serde_json::json!("$49")));
}
