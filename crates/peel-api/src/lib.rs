//! HTTP API for the peel pipeline.

pub mod agent;
pub mod auth;
pub mod errors;
pub mod handlers;
pub mod search;
pub mod state;

use axum::http::Request;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use state::AppState;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Request id: propagated from `x-request-id` or freshly minted.
pub fn request_id<B>(request: &Request<B>) -> String {
    request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Assemble the router with middleware layers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/fetch", post(handlers::fetch))
        .route("/v1/search", post(handlers::search))
        .route("/v1/crawl", post(handlers::crawl_start))
        .route("/v1/crawl/:id", get(handlers::job_status))
        .route("/v1/jobs/:id", get(handlers::job_status))
        .route("/v1/map", post(handlers::map_urls))
        .route("/v1/answer", post(handlers::answer))
        .route("/v1/extract", post(handlers::extract))
        .route("/v1/deep-fetch", post(handlers::deep_fetch))
        .route("/v1/watch", post(handlers::watch))
        .route("/v1/scrape", post(handlers::scrape))
        .route("/v1/agent", post(agent::agent))
        .route("/health", get(handlers::health))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(120)))
        .with_state(state)
}
