use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::ActionId;

/// Reason an [`ExecCtx`] refused to continue.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CtxError {
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Execution context threaded through every resolver tier and executor strategy.
///
/// Holds the absolute deadline of the current step and a cooperative cancellation
/// token, so a step can be aborted mid-resolution when the overall run times out.
#[derive(Clone, Debug)]
pub struct ExecCtx {
    /// Step this context belongs to (1-based)
    pub step: usize,

    /// Deadline for the whole step
    pub deadline: Instant,

    /// Cancellation token shared with the owning session
    pub cancel_token: CancellationToken,

    /// Unique identifier for tracing and correlation
    pub action_id: ActionId,
}

impl ExecCtx {
    pub fn new(step: usize, deadline: Instant, cancel_token: CancellationToken) -> Self {
        Self {
            step,
            deadline,
            cancel_token,
            action_id: ActionId::new(),
        }
    }

    /// Context with a deadline `budget` from now and a fresh token.
    pub fn with_budget(step: usize, budget: Duration) -> Self {
        Self::new(step, Instant::now() + budget, CancellationToken::new())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    pub fn is_timeout(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn remaining_time(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Fails fast when the step was cancelled or ran out of time.
    pub fn ensure_active(&self) -> Result<(), CtxError> {
        if self.is_cancelled() {
            return Err(CtxError::Cancelled);
        }
        if self.is_timeout() {
            return Err(CtxError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Child context sharing cancellation, with a deadline no later than the parent's.
    pub fn child(&self, budget: Duration) -> Self {
        let deadline = std::cmp::min(self.deadline, Instant::now() + budget);
        Self {
            step: self.step,
            deadline,
            cancel_token: self.cancel_token.child_token(),
            action_id: self.action_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_deadline_is_reported() {
        let ctx = ExecCtx::new(1, Instant::now(), CancellationToken::new());
        assert!(ctx.is_timeout());
        assert_eq!(ctx.ensure_active(), Err(CtxError::DeadlineExceeded));
    }

    #[test]
    fn cancellation_wins_over_deadline() {
        let ctx = ExecCtx::with_budget(3, Duration::from_secs(30));
        assert!(ctx.ensure_active().is_ok());
        ctx.cancel_token.cancel();
        assert_eq!(ctx.ensure_active(), Err(CtxError::Cancelled));
    }

    #[test]
    fn child_never_outlives_parent() {
        let parent = ExecCtx::with_budget(1, Duration::from_millis(50));
        let child = parent.child(Duration::from_secs(60));
        assert!(child.deadline <= parent.deadline);
        parent.cancel_token.cancel();
        assert!(child.is_cancelled());
    }
}
