//! Executor building blocks.
//!
//! One module per action family. Every strategy returns a plain
//! `Result<(), AdapterError>`; [`try_strategy`] folds it into "landed", "page
//! navigated" or "failed, logged, move on".

pub mod click;
pub mod download;
pub mod dropdown;
pub mod navigate;
pub mod type_text;
pub mod upload;
pub mod verify;
pub mod wait;

use std::future::Future;
use std::time::Duration;

use cdp_adapter::{AdapterError, AnchorDescriptor, ElementInfo, PageQuery};
use stepwright_core_types::ExecCtx;
use tracing::{debug, info, warn};

use crate::errors::ActionError;
use crate::metrics;
use crate::types::Landing;

/// Runs one strategy. `Ok(None)` means it failed and the failure was recorded.
pub(crate) async fn try_strategy<F>(
    action: &'static str,
    strategy: &str,
    ctx: &ExecCtx,
    failures: &mut Vec<String>,
    attempt: F,
) -> Result<Option<Landing>, ActionError>
where
    F: Future<Output = Result<(), AdapterError>>,
{
    ctx.ensure_active()?;
    debug!(action, strategy, step = ctx.step, "trying strategy");
    match attempt.await {
        Ok(()) => {
            metrics::record_strategy(action, strategy, "ok");
            info!(action, strategy, step = ctx.step, "strategy succeeded");
            Ok(Some(Landing::Completed))
        }
        Err(err) if err.is_navigation_interrupted() => {
            metrics::record_strategy(action, strategy, "navigated");
            info!(action, strategy, step = ctx.step, "page navigated during input");
            Ok(Some(Landing::Navigated))
        }
        Err(err) => {
            metrics::record_strategy(action, strategy, "failed");
            warn!(action, strategy, step = ctx.step, error = %err, "strategy failed");
            failures.push(format!("{}: {}", strategy, err));
            Ok(None)
        }
    }
}

/// Sleeps unless the step is cancelled first.
pub(crate) async fn pause(ctx: &ExecCtx, duration: Duration) -> Result<(), ActionError> {
    if duration.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = ctx.cancel_token.cancelled() => Err(ActionError::Interrupted("step cancelled".into())),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// First visible match over `anchors`, in order. Query errors count as misses.
pub(crate) async fn first_visible<'a>(
    page: &(impl PageQuery + ?Sized),
    anchors: &'a [AnchorDescriptor],
) -> Option<(&'a AnchorDescriptor, ElementInfo)> {
    for anchor in anchors {
        match page.find_visible(anchor).await {
            Ok(Some(element)) => return Some((anchor, element)),
            Ok(None) => {}
            Err(err) => debug!(anchor = %anchor, error = %err, "probe failed"),
        }
    }
    None
}

/// Up to `limit` visible matches of `anchor`.
pub(crate) async fn visible_matches(
    page: &(impl PageQuery + ?Sized),
    anchor: &AnchorDescriptor,
    limit: usize,
) -> Vec<ElementInfo> {
    match page.query(anchor).await {
        Ok(found) => found.into_iter().filter(|el| el.visible).take(limit).collect(),
        Err(err) => {
            debug!(anchor = %anchor, error = %err, "probe failed");
            Vec::new()
        }
    }
}

/// Selector-safe single-quoted text.
pub(crate) fn quote(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\'', "\\'")
}
