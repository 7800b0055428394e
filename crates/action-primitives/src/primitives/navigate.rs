//! Navigate primitive - open a URL and let it settle

use cdp_adapter::PageDriver;
use stepwright_core_types::ExecCtx;
use tracing::{info, warn};

use crate::config::ExecutorConfig;
use crate::errors::ActionError;
use crate::primitives::pause;
use crate::types::Completion;

/// Navigates to `url`, waits for the load event and a short settle period.
///
/// Fails when the URL has no supported scheme, the browser reports an error, or
/// the tab is still on `about:blank` afterwards.
pub async fn execute_navigate(
    page: &dyn PageDriver,
    ctx: &ExecCtx,
    config: &ExecutorConfig,
    url: &str,
) -> Result<Completion, ActionError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ActionError::InvalidPlan("URL cannot be empty".to_string()));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") && !url.starts_with("file://") {
        return Err(ActionError::InvalidPlan(format!("Invalid URL scheme: {}", url)));
    }
    ctx.ensure_active()?;

    info!(action_id = %ctx.action_id, url = %url, "navigating");
    if let Err(err) = page.goto(url, config.navigation_timeout()).await {
        warn!(action_id = %ctx.action_id, url = %url, error = %err, "navigation failed");
        return Err(ActionError::NavigationFailed(format!("{}: {}", url, err)));
    }
    pause(ctx, config.navigate_settle()).await?;

    let landed = page.url().await?;
    if landed == "about:blank" {
        return Err(ActionError::NavigationFailed(format!(
            "{}: page stayed on about:blank",
            url
        )));
    }
    let mut completion = Completion::by("goto").with_detail(format!("landed on {}", landed));
    completion.navigated = true;
    Ok(completion)
}
