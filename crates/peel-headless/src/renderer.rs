//! The `PageRenderer` implementation over chromiumoxide.

use crate::actions::run_actions;
use crate::pool::BrowserPool;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use peel_fetch::{PageRenderer, RenderRequest, RenderedPage};
use peel_stealth::{stealth_init_script, StealthConfig, StealthPreset};
use peel_types::{CancellationSignal, PeelError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_NAV_TIMEOUT: Duration = Duration::from_secs(30);
const SETTLE_AFTER_NAV: Duration = Duration::from_millis(300);

pub struct ChromiumRenderer {
    pool: Arc<BrowserPool>,
    stealth: StealthConfig,
}

impl ChromiumRenderer {
    pub fn new(pool: Arc<BrowserPool>, stealth: StealthConfig) -> Self {
        Self { pool, stealth }
    }

    async fn render_on_page(
        &self,
        page: &Page,
        request: &RenderRequest,
        cancel: &CancellationSignal,
    ) -> Result<RenderedPage> {
        if let Some(user_agent) = &request.user_agent {
            page.set_user_agent(user_agent.as_str())
                .await
                .map_err(|e| PeelError::internal(format!("set user agent: {e}")))?;
        }

        if !request.headers.is_empty() {
            let map: serde_json::Map<String, serde_json::Value> = request
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            page.execute(SetExtraHttpHeadersParams::new(Headers::new(
                serde_json::Value::Object(map),
            )))
            .await
            .map_err(|e| PeelError::internal(format!("extra headers: {e}")))?;
        }

        let stealth_config = if request.stealth {
            StealthConfig {
                preset: StealthPreset::High,
                ..self.stealth.clone()
            }
        } else {
            self.stealth.clone()
        };
        let script = stealth_init_script(&stealth_config);
        if !script.is_empty() {
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(script))
                .await
                .map_err(|e| PeelError::internal(format!("init script: {e}")))?;
        }

        let nav_timeout = cancel
            .remaining()
            .map(|r| r.min(DEFAULT_NAV_TIMEOUT))
            .unwrap_or(DEFAULT_NAV_TIMEOUT);
        let navigation = async {
            page.goto(request.url.as_str())
                .await
                .map_err(|e| PeelError::network(format!("navigate: {e}")))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| PeelError::network(format!("navigation wait: {e}")))?;
            Ok::<(), PeelError>(())
        };
        tokio::time::timeout(nav_timeout, navigation)
            .await
            .map_err(|_| PeelError::timeout("browser navigation"))??;

        if let Some(wait_ms) = request.wait_ms {
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        } else {
            tokio::time::sleep(SETTLE_AFTER_NAV).await;
        }

        cancel.check()?;
        run_actions(page, &request.actions, cancel).await?;

        let html = page
            .content()
            .await
            .map_err(|e| PeelError::internal(format!("page content: {e}")))?;
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| request.url.clone());

        let screenshot = if request.screenshot {
            let params = ScreenshotParams::builder()
                .full_page(request.screenshot_full_page)
                .build();
            Some(
                page.screenshot(params)
                    .await
                    .map_err(|e| PeelError::internal(format!("screenshot: {e}")))?,
            )
        } else {
            None
        };

        debug!(bytes = html.len(), "page rendered");
        Ok(RenderedPage {
            final_url,
            html,
            status: 200,
            screenshot,
        })
    }
}

#[async_trait]
impl PageRenderer for ChromiumRenderer {
    #[instrument(skip(self, request, cancel), fields(url = %request.url, stealth = request.stealth))]
    async fn render(
        &self,
        request: &RenderRequest,
        cancel: &CancellationSignal,
    ) -> Result<RenderedPage> {
        cancel.check()?;

        // Profile-backed sessions are exclusive and never pooled.
        if let Some(profile) = &request.profile_dir {
            let (launched, _guard) = self
                .pool
                .checkout_profile(PathBuf::from(profile), request.proxy.as_deref())
                .await?;
            let result = self.render_with(&launched, request, cancel).await;
            launched.close().await;
            return result;
        }

        let launched = self.pool.checkout(request.proxy.as_deref()).await?;
        let result = self.render_with(&launched, request, cancel).await;
        match &result {
            // A cancelled or failed render leaves the page in an unknown
            // state; do not return that browser to the pool.
            Ok(_) if request.proxy.is_none() => self.pool.checkin(launched).await,
            _ => self.pool.discard(launched).await,
        }
        result
    }
}

impl ChromiumRenderer {
    async fn render_with(
        &self,
        launched: &crate::launcher::LaunchedBrowser,
        request: &RenderRequest,
        cancel: &CancellationSignal,
    ) -> Result<RenderedPage> {
        let page = launched
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| PeelError::internal(format!("new page: {e}")))?;

        let result = self.render_on_page(&page, request, cancel).await;
        if let Err(e) = page.close().await {
            debug!(error = %e, "page close failed");
        }
        result
    }
}
