//! peel — fetch a URL and print clean, LLM-ready content.

use base64::Engine;
use clap::{Parser, Subcommand};
use peel_api::state::{AppState, AuthConfig};
use peel_pipeline::{peel, PeelServices, PipelineConfig};
use peel_types::{OutputFormat, PeelError, PeelRequest};
use std::collections::HashMap;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "peel")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Turn any URL into clean markdown, text or structured data")]
struct Cli {
    /// URL to peel (default command).
    url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,

    /// Force the headless browser rung.
    #[arg(long)]
    render: bool,

    /// Force the stealth browser rung.
    #[arg(long)]
    stealth: bool,

    /// Extra wait after page load, in milliseconds.
    #[arg(long, value_name = "MS")]
    wait: Option<u64>,

    /// Whole-request timeout in milliseconds.
    #[arg(long, value_name = "MS")]
    timeout: Option<u64>,

    /// CSS selector to reduce the page to.
    #[arg(long)]
    selector: Option<String>,

    /// CSS selectors to drop (repeatable).
    #[arg(long)]
    exclude: Vec<String>,

    /// Capture a screenshot; optional output path.
    #[arg(long, num_args = 0..=1, default_missing_value = "screenshot.png", value_name = "PATH")]
    screenshot: Option<String>,

    /// Full-page screenshot instead of the viewport.
    #[arg(long)]
    full_page: bool,

    /// Output format: markdown, text, html or json.
    #[arg(long, default_value = "markdown")]
    format: String,

    /// Extra request header, `Key: Value` (repeatable).
    #[arg(long = "header", value_name = "HEADER")]
    headers: Vec<String>,

    /// Cookie string (repeatable).
    #[arg(long = "cookie", value_name = "COOKIE")]
    cookies: Vec<String>,

    /// Question for BM25 filtering and quick-answer.
    #[arg(long)]
    question: Option<String>,

    /// Hard token ceiling for the output.
    #[arg(long, value_name = "N")]
    max_tokens: Option<usize>,

    /// Smart-distillation token budget.
    #[arg(long, value_name = "N")]
    budget: Option<usize>,

    /// Suppress progress output.
    #[arg(long, short = 's')]
    silent: bool,

    /// Emit the full PeelResult as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Search and print hits (paste URLs with the default provider).
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        count: usize,
    },
    /// Peel every URL listed in a file, one per line.
    Batch { file: String },
    /// Crawl same-host links starting from a URL.
    Crawl {
        url: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Run the HTTP API server.
    Serve {
        #[arg(long, env = "PEEL_BIND", default_value = "0.0.0.0:8080")]
        bind: String,
    },
}

/// CLI exit codes: 0 success, 1 failure, 2 validation, 3 feature-gated,
/// 4 quota exhausted.
fn exit_code_for(error: &PeelError) -> u8 {
    match error {
        PeelError::Validation { .. } => 2,
        PeelError::FeatureGated { .. } => 3,
        PeelError::Quota { .. } => 4,
        _ => 1,
    }
}

fn parse_format(raw: &str) -> Result<(OutputFormat, bool), PeelError> {
    match raw {
        "markdown" | "md" => Ok((OutputFormat::Markdown, false)),
        "text" => Ok((OutputFormat::Text, false)),
        "html" => Ok((OutputFormat::Html, false)),
        "json" => Ok((OutputFormat::Markdown, true)),
        other => Err(PeelError::validation(format!(
            "unknown format {other:?}, expected markdown|text|html|json"
        ))),
    }
}

fn parse_headers(raw: &[String]) -> Result<HashMap<String, String>, PeelError> {
    let mut headers = HashMap::new();
    for entry in raw {
        let Some((key, value)) = entry.split_once(':') else {
            return Err(PeelError::validation(format!(
                "header {entry:?} must be `Key: Value`"
            )));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(PeelError::validation(format!("empty header name in {entry:?}")));
        }
        headers.insert(key.to_string(), value.trim().to_string());
    }
    Ok(headers)
}

fn request_from(cli: &Cli, url: &str) -> Result<(PeelRequest, bool), PeelError> {
    let (format, as_json) = parse_format(&cli.format)?;
    let request = PeelRequest {
        url: url.to_string(),
        format,
        render: cli.render,
        stealth: cli.stealth,
        wait_ms: cli.wait,
        timeout_ms: cli.timeout,
        selector: cli.selector.clone(),
        exclude: cli.exclude.clone(),
        screenshot: cli.screenshot.is_some(),
        screenshot_full_page: cli.full_page,
        headers: parse_headers(&cli.headers)?,
        cookies: cli.cookies.clone(),
        question: cli.question.clone(),
        max_tokens: cli.max_tokens,
        budget: cli.budget,
        ..Default::default()
    };
    Ok((request, as_json || cli.json))
}

async fn peel_one(services: &std::sync::Arc<PeelServices>, cli: &Cli, url: &str) -> Result<(), PeelError> {
    let (request, as_json) = request_from(cli, url)?;
    let result = peel(services, &request).await?;

    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result)
                .map_err(|e| PeelError::internal(e.to_string()))?
        );
    } else {
        println!("{}", result.content);
        if !cli.silent {
            eprintln!(
                "— {} tokens · {} · quality {:.2} · {} ms",
                result.tokens, result.method, result.quality, result.elapsed_ms
            );
        }
    }

    if let (Some(path), Some(shot)) = (&cli.screenshot, &result.screenshot) {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(shot)
            .map_err(|e| PeelError::internal(format!("screenshot decode: {e}")))?;
        std::fs::write(path, bytes)
            .map_err(|e| PeelError::internal(format!("screenshot write: {e}")))?;
        if !cli.silent {
            eprintln!("— screenshot saved to {path}");
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), PeelError> {
    let services = PeelServices::build(PipelineConfig::default(), None)
        .await?;

    match (&cli.command, &cli.url) {
        (Some(Command::Serve { bind }), _) => {
            let state = AppState::new(services, AuthConfig::from_env());
            let router = peel_api::build_router(state);
            let addr: std::net::SocketAddr = bind
                .parse()
                .map_err(|_| PeelError::validation(format!("invalid bind address {bind:?}")))?;
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|e| PeelError::internal(format!("bind: {e}")))?;
            if !cli.silent {
                eprintln!("peel serving on {addr}");
            }
            axum_serve(listener, router).await
        }
        (Some(Command::Search { query, count }), _) => {
            let provider = peel_api::search::NoneProvider::new(true);
            use peel_api::search::SearchProvider;
            let hits = provider.search(query, *count).await?;
            for hit in hits {
                println!("{}", hit.url);
            }
            Ok(())
        }
        (Some(Command::Batch { file }), _) => {
            let listing = std::fs::read_to_string(file)
                .map_err(|e| PeelError::validation(format!("cannot read {file:?}: {e}")))?;
            let mut failures = 0usize;
            for line in listing.lines().map(str::trim).filter(|l| !l.is_empty() && !l.starts_with('#')) {
                if let Err(error) = peel_one(&services, &cli, line).await {
                    failures += 1;
                    eprintln!("error: {line}: {error}");
                }
            }
            if failures > 0 {
                return Err(PeelError::internal(format!("{failures} of batch failed")));
            }
            Ok(())
        }
        (Some(Command::Crawl { url, limit }), _) => {
            let (request, _) = request_from(&cli, url)?;
            let seed = peel(&services, &request).await?;
            let host = url::Url::parse(url).ok().and_then(|u| u.host_str().map(String::from));
            println!("{}", seed.url);
            let mut printed = 1usize;
            for link in &seed.links {
                if printed >= *limit {
                    break;
                }
                let same_host = host.as_deref().is_some_and(|h| {
                    url::Url::parse(link)
                        .ok()
                        .and_then(|u| u.host_str().map(|lh| lh == h))
                        .unwrap_or(false)
                });
                if !same_host {
                    continue;
                }
                match peel(&services, &PeelRequest::new(link)).await {
                    Ok(result) => {
                        println!("{}", result.url);
                        printed += 1;
                    }
                    Err(error) => eprintln!("error: {link}: {error}"),
                }
            }
            Ok(())
        }
        (None, Some(url)) => peel_one(&services, &cli, url).await,
        (None, None) => Err(PeelError::validation(
            "pass a URL or a subcommand; see --help",
        )),
    }
}

async fn axum_serve(
    listener: tokio::net::TcpListener,
    router: axum::Router,
) -> Result<(), PeelError> {
    axum::serve(listener, router)
        .await
        .map_err(|e| PeelError::internal(format!("server: {e}")))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.silent { "error" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(exit_code_for(&error))
        }
    }
}
