//! Bounded fan-out for read-only page probes.
//!
//! Probes start in priority order with at most `workers` in flight and their
//! results are consumed in that same order, so the winner is always the
//! highest-priority hit. Every wait is bounded by the step deadline.

use cdp_adapter::{ElementInfo, PageQuery};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use stepwright_core_types::ExecCtx;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

use crate::errors::LocatorError;
use crate::types::SelectorCandidate;

pub const DEFAULT_PROBE_WORKERS: usize = 4;

/// One pending probe.
pub type Probe<'f, T> = BoxFuture<'f, Option<T>>;

/// First `Some` among `probes`, in input order.
pub async fn first_in_order<'f, T>(
    ctx: &ExecCtx,
    workers: usize,
    probes: Vec<Probe<'f, T>>,
) -> Result<Option<T>, LocatorError>
where
    T: Send + 'f,
{
    let deadline = Instant::from_std(ctx.deadline);
    let mut results = stream::iter(probes).buffered(workers.max(1));
    loop {
        let next = tokio::select! {
            _ = ctx.cancel_token.cancelled() => return Err(LocatorError::Cancelled),
            next = timeout_at(deadline, results.next()) => next,
        };
        match next {
            Ok(Some(Some(hit))) => return Ok(Some(hit)),
            Ok(Some(None)) => continue,
            Ok(None) => return Ok(None),
            Err(_) => {
                return Err(LocatorError::Timeout(
                    "step deadline reached while probing".into(),
                ))
            }
        }
    }
}

/// First visible element accepted by `accept`, scanning `candidates` in order.
pub async fn probe_selectors<'a, A>(
    page: &'a dyn PageQuery,
    ctx: &ExecCtx,
    workers: usize,
    candidates: &'a [SelectorCandidate],
    accept: A,
) -> Result<Option<(&'a SelectorCandidate, ElementInfo)>, LocatorError>
where
    A: Fn(&ElementInfo) -> bool + Sync,
{
    let accept = &accept;
    let mut probes: Vec<Probe<'_, (&'a SelectorCandidate, ElementInfo)>> =
        Vec::with_capacity(candidates.len());
    for candidate in candidates {
        probes.push(
            async move {
                match page.query(&candidate.anchor).await {
                    Ok(elements) => elements
                        .into_iter()
                        .find(|el| el.visible && accept(el))
                        .map(|el| (candidate, el)),
                    Err(err) => {
                        debug!(selector = %candidate.anchor, error = %err, "selector probe failed");
                        None
                    }
                }
            }
            .boxed(),
        );
    }
    first_in_order(ctx, workers, probes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn winner_follows_input_order_not_completion_order() {
        let ctx = ExecCtx::with_budget(1, Duration::from_secs(5));
        let probes: Vec<Probe<'_, usize>> = [40u64, 5, 1]
            .into_iter()
            .enumerate()
            .map(|(i, ms)| {
                async move {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    (i > 0).then_some(i)
                }
                .boxed()
            })
            .collect();
        let hit = first_in_order(&ctx, 4, probes).await.unwrap();
        assert_eq!(hit, Some(1));
    }

    fn sleepers(count: usize, ms: u64) -> Vec<Probe<'static, ()>> {
        (0..count)
            .map(|_| {
                async move {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Some(())
                }
                .boxed()
            })
            .collect()
    }

    #[tokio::test]
    async fn deadline_bounds_the_scan() {
        let ctx = ExecCtx::with_budget(1, Duration::from_millis(20));
        let err = first_in_order(&ctx, 2, sleepers(3, 5_000)).await.unwrap_err();
        assert!(matches!(err, LocatorError::Timeout(_)));
    }

    #[tokio::test]
    async fn cancellation_stops_the_scan() {
        let ctx = ExecCtx::with_budget(1, Duration::from_secs(5));
        ctx.cancel_token.cancel();
        let err = first_in_order(&ctx, 2, sleepers(3, 50)).await.unwrap_err();
        assert!(matches!(err, LocatorError::Cancelled));
    }
}
