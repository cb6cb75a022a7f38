//! peel-api server binary.

use anyhow::{Context, Result};
use clap::Parser;
use peel_api::state::{AppState, AuthConfig};
use peel_fetch::PageRenderer;
use peel_headless::{BrowserPool, ChromiumRenderer, PoolConfig};
use peel_pipeline::{PeelServices, PipelineConfig};
use peel_stealth::StealthConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "peel-api")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Web-understanding API service")]
struct Args {
    /// Bind address.
    #[arg(long, env = "PEEL_BIND", default_value = "0.0.0.0:8080")]
    bind: String,

    /// Result cache TTL in seconds.
    #[arg(long, env = "CACHE_TTL")]
    cache_ttl: Option<u64>,

    /// Disable the headless browser rungs.
    #[arg(long, env = "PEEL_NO_BROWSER")]
    no_browser: bool,

    /// Warm browser pool size.
    #[arg(long, env = "BROWSER_POOL_SIZE", default_value_t = 4)]
    browser_pool_size: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,peel=debug".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = PipelineConfig::default();
    if let Some(ttl) = args.cache_ttl {
        config.cache.ttl_secs = ttl;
    }

    // The browser renderer is wired by the binary so library consumers can
    // run pipeline-only deployments.
    let renderer: Option<Arc<dyn PageRenderer>> = if args.no_browser {
        None
    } else {
        let stealth = StealthConfig::default();
        let pool = BrowserPool::new(
            PoolConfig {
                max_size: args.browser_pool_size,
                ..Default::default()
            },
            stealth.clone(),
        );
        pool.spawn_sweeper(Duration::from_secs(30));
        Some(Arc::new(ChromiumRenderer::new(pool, stealth)))
    };

    let services = PeelServices::build(config, renderer)
        .await
        .map_err(|e| anyhow::anyhow!("service wiring failed: {e}"))?;
    let state = AppState::new(services, AuthConfig::from_env());
    let router = peel_api::build_router(state);

    let addr: SocketAddr = args.bind.parse().context("invalid bind address")?;
    info!(%addr, "peel-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind failed")?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("server error")?;
    Ok(())
}
