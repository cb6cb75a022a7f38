//! Page-action script execution.

use chromiumoxide::Page;
use peel_types::{CancellationSignal, PageAction, PeelError, Result};
use std::time::Duration;
use tracing::{debug, warn};

const FIND_POLL: Duration = Duration::from_millis(100);
const DEFAULT_WAIT_FOR: Duration = Duration::from_secs(10);

/// Run the caller's action script in order. A failed non-optional action
/// fails the fetch; optional actions log and continue.
pub async fn run_actions(
    page: &Page,
    actions: &[PageAction],
    cancel: &CancellationSignal,
) -> Result<()> {
    for action in actions {
        cancel.check()?;
        match run_one(page, action, cancel).await {
            Ok(()) => {}
            Err(error) if action.is_optional() => {
                warn!(?action, error = %error, "optional action failed, continuing");
            }
            Err(error) => return Err(error),
        }
    }
    Ok(())
}

async fn run_one(page: &Page, action: &PageAction, cancel: &CancellationSignal) -> Result<()> {
    match action {
        PageAction::Click { selector, .. } => {
            let element = wait_for_element(page, selector, DEFAULT_WAIT_FOR, cancel).await?;
            element
                .click()
                .await
                .map_err(|e| PeelError::internal(format!("click {selector:?}: {e}")))?;
            debug!(selector, "clicked");
        }
        PageAction::Type { selector, text, .. } => {
            let element = wait_for_element(page, selector, DEFAULT_WAIT_FOR, cancel).await?;
            element
                .click()
                .await
                .map_err(|e| PeelError::internal(format!("focus {selector:?}: {e}")))?;
            element
                .type_str(text)
                .await
                .map_err(|e| PeelError::internal(format!("type into {selector:?}: {e}")))?;
            debug!(selector, "typed");
        }
        PageAction::WaitFor { selector, ms, .. } => {
            if let Some(ms) = ms {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            if let Some(selector) = selector {
                wait_for_element(page, selector, DEFAULT_WAIT_FOR, cancel).await?;
            }
        }
        PageAction::Scroll {
            pixels, to_element, ..
        } => {
            if let Some(selector) = to_element {
                let element = wait_for_element(page, selector, DEFAULT_WAIT_FOR, cancel).await?;
                element
                    .scroll_into_view()
                    .await
                    .map_err(|e| PeelError::internal(format!("scroll to {selector:?}: {e}")))?;
            } else {
                let delta = pixels.unwrap_or(800);
                page.evaluate(format!("window.scrollBy(0, {delta})"))
                    .await
                    .map_err(|e| PeelError::internal(format!("scroll: {e}")))?;
            }
        }
        PageAction::Hover { selector, .. } => {
            let element = wait_for_element(page, selector, DEFAULT_WAIT_FOR, cancel).await?;
            element
                .hover()
                .await
                .map_err(|e| PeelError::internal(format!("hover {selector:?}: {e}")))?;
        }
        PageAction::Press { key, .. } => {
            let body = wait_for_element(page, "body", DEFAULT_WAIT_FOR, cancel).await?;
            body.press_key(key)
                .await
                .map_err(|e| PeelError::internal(format!("press {key:?}: {e}")))?;
        }
    }
    Ok(())
}

/// Poll for a selector until it appears, the timeout passes, or the request
/// is cancelled.
async fn wait_for_element(
    page: &Page,
    selector: &str,
    timeout: Duration,
    cancel: &CancellationSignal,
) -> Result<chromiumoxide::element::Element> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        cancel.check()?;
        if let Ok(element) = page.find_element(selector).await {
            return Ok(element);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(PeelError::timeout(format!("waiting for {selector:?}")));
        }
        tokio::time::sleep(FIND_POLL).await;
    }
}
