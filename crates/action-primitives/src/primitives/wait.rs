//! Wait primitive - fixed pauses and page-load waits

use std::time::Duration;

use cdp_adapter::PageDriver;
use stepwright_core_types::{ExecCtx, WaitMode};
use tracing::{debug, info, warn};

use crate::config::ExecutorConfig;
use crate::errors::ActionError;
use crate::primitives::pause;
use crate::types::Completion;

/// Waits according to `mode`, or for the configured default when there is none.
///
/// Element-visible waits are degraded to a fixed pause of their duration. A page
/// that does not report load within the timeout is logged, not failed.
pub async fn execute_wait(
    page: &dyn PageDriver,
    ctx: &ExecCtx,
    config: &ExecutorConfig,
    mode: Option<&WaitMode>,
) -> Result<Completion, ActionError> {
    ctx.ensure_active()?;
    let detail = match mode {
        Some(WaitMode::Duration { ms }) => {
            info!(action_id = %ctx.action_id, ms, "waiting");
            pause(ctx, Duration::from_millis(*ms)).await?;
            format!("waited {} ms", ms)
        }
        Some(WaitMode::ElementVisible { ms }) => {
            debug!(action_id = %ctx.action_id, ms, "element wait degraded to a fixed pause");
            pause(ctx, Duration::from_millis(*ms)).await?;
            format!("waited {} ms for an element", ms)
        }
        Some(WaitMode::PageLoad { timeout_ms }) => {
            let timeout = Duration::from_millis(*timeout_ms).min(ctx.remaining_time());
            match page.wait_for_load(timeout).await {
                Ok(()) => "page loaded".to_string(),
                Err(err) => {
                    warn!(action_id = %ctx.action_id, error = %err, "page load wait ended early");
                    format!("page load not confirmed: {}", err)
                }
            }
        }
        None => {
            pause(ctx, Duration::from_millis(config.default_wait_ms)).await?;
            format!("waited {} ms", config.default_wait_ms)
        }
    };
    Ok(Completion::by("wait").with_detail(detail))
}
