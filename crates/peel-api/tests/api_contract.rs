//! API contract tests driven through the router without a socket.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use peel_api::state::{AppState, AuthConfig};
use peel_api::build_router;
use peel_pipeline::PeelServices;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn state(auth: AuthConfig) -> AppState {
    let services = PeelServices::build_for_tests(None).expect("services");
    AppState::new(services, auth)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_is_open_even_with_keys() {
    let router = build_router(state(AuthConfig {
        api_keys: vec!["wp_k".into()],
    }));
    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn fetch_requires_key_when_configured() {
    let router = build_router(state(AuthConfig {
        api_keys: vec!["wp_secret".into()],
    }));

    let response = router
        .clone()
        .oneshot(post_json(
            "/v1/fetch",
            serde_json::json!({"url": "https://example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "auth_error");
    assert!(body["requestId"].is_string());
}

#[tokio::test]
async fn fetch_validation_maps_to_400() {
    let router = build_router(state(AuthConfig::default()));
    let response = router
        .oneshot(post_json(
            "/v1/fetch",
            serde_json::json!({"url": "ftp://example.com/x"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn fetch_returns_peel_result() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(format!(
                    "<html><head><title>T</title></head><body><article><h1>T</h1>{}</article></body></html>",
                    "<p>A paragraph with enough words to extract properly here.</p>".repeat(4)
                )),
        )
        .mount(&upstream)
        .await;

    let router = build_router(state(AuthConfig::default()));
    let response = router
        .oneshot(post_json(
            "/v1/fetch",
            serde_json::json!({"url": format!("{}/page", upstream.uri())}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = body_json(response).await;
    assert!(body["tokens"].as_u64().unwrap() > 0);
    assert_eq!(body["method"], "simple");
    assert_eq!(body["fingerprint"].as_str().unwrap().len(), 16);
}

#[tokio::test]
async fn unknown_job_is_404() {
    let router = build_router(state(AuthConfig::default()));
    let response = router
        .oneshot(
            Request::get("/v1/jobs/not-a-job")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn scrape_facade_wraps_success_envelope() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(format!(
                    "<html><body><article>{}</article></body></html>",
                    "<p>Body words for the scrape facade test to extract.</p>".repeat(4)
                )),
        )
        .mount(&upstream)
        .await;

    let router = build_router(state(AuthConfig::default()));
    let response = router
        .oneshot(post_json(
            "/v1/scrape",
            serde_json::json!({"url": upstream.uri()}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert!(body["data"]["markdown"].as_str().unwrap().contains("Body words"));
}

#[tokio::test]
async fn watch_reports_change_tracking() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(format!(
                    "<html><body><article>{}</article></body></html>",
                    "<p>Stable content for the watch endpoint contract.</p>".repeat(4)
                )),
        )
        .mount(&upstream)
        .await;

    let router = build_router(state(AuthConfig::default()));
    let body = serde_json::json!({"url": upstream.uri()});

    let first = body_json(
        router
            .clone()
            .oneshot(post_json("/v1/watch", body.clone()))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(first["changeTracking"]["changed"], false);
    assert!(first["changeTracking"]["previousFingerprint"].is_null());

    let second = body_json(router.oneshot(post_json("/v1/watch", body)).await.unwrap()).await;
    assert_eq!(second["changeTracking"]["changed"], false);
    assert_eq!(
        second["changeTracking"]["previousFingerprint"],
        first["fingerprint"]
    );
}

#[tokio::test]
async fn scrape_facade_reports_failure_without_http_error() {
    let router = build_router(state(AuthConfig::default()));
    let response = router
        .oneshot(post_json(
            "/v1/scrape",
            serde_json::json!({"url": "not a url"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}
