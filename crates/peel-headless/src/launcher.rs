//! Browser process launch.

use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use peel_stealth::{stealth_launch_flags, StealthConfig};
use peel_types::{PeelError, Result};
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub stealth: StealthConfig,
    /// Persistent profile directory; ephemeral temp dir when absent.
    pub profile_dir: Option<PathBuf>,
    pub proxy: Option<String>,
}

/// A running browser plus the handler task that pumps its CDP event loop.
pub struct LaunchedBrowser {
    pub browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
}

impl LaunchedBrowser {
    /// Close the browser and stop the event pump.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "browser close failed");
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}

/// Launch a headless Chromium with the stealth flag set applied.
pub async fn launch_browser(options: &LaunchOptions) -> Result<LaunchedBrowser> {
    let mut args = stealth_launch_flags(&options.stealth);
    args.push("--disable-dev-shm-usage".to_string());
    args.push("--no-sandbox".to_string());
    if let Some(proxy) = &options.proxy {
        args.push(format!("--proxy-server={proxy}"));
    }

    let mut builder = BrowserConfig::builder().args(args.iter().map(String::as_str));
    if let Some(profile) = &options.profile_dir {
        builder = builder.user_data_dir(profile);
    }
    let config = builder
        .build()
        .map_err(|e| PeelError::internal(format!("browser config: {e}")))?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| PeelError::internal(format!("browser launch failed: {e}")))?;

    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                debug!(error = %e, "cdp handler event error");
            }
        }
    });

    debug!(profile = ?options.profile_dir, "browser launched");
    Ok(LaunchedBrowser {
        browser,
        handler_task,
    })
}
