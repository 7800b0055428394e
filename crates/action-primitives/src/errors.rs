//! Error types for the action executor

use cdp_adapter::{AdapterError, AdapterErrorKind};
use stepwright_core_types::CtxError;
use thiserror::Error;

/// Errors surfaced by executor operations.
///
/// Individual strategy failures never show up here; they are logged and the next
/// strategy runs. Only exhaustion, a page in the wrong state or a hard page error
/// becomes an `ActionError`.
#[derive(Debug, Error, Clone)]
pub enum ActionError {
    /// Every strategy for the action failed
    #[error("All {action} strategies failed: {attempts}")]
    StrategyExhausted { action: String, attempts: String },

    /// The page is not in the state the step expects
    #[error("Context mismatch: {0}")]
    ContextMismatch(String),

    #[error("Target not found: {0}")]
    NotFound(String),

    /// Typed value did not read back. Only character counts are carried.
    #[error("Input mismatch: expected {expected_chars} chars, got {actual_chars}")]
    ValueMismatch {
        expected_chars: usize,
        actual_chars: usize,
    },

    #[error("Verification '{kind}' failed: {detail}")]
    VerificationFailed { kind: String, detail: String },

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// Step was cancelled
    #[error("Operation interrupted: {0}")]
    Interrupted(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    /// Page or protocol failure outside any strategy loop
    #[error("Page error: {0}")]
    Page(String),

    /// Plan is missing data the action needs
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),
}

impl ActionError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, ActionError::Timeout(_) | ActionError::Page(_))
    }

    /// Get error severity level (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            ActionError::InvalidPlan(_) => 3,
            ActionError::NavigationFailed(_) | ActionError::Page(_) => 2,
            ActionError::StrategyExhausted { .. }
            | ActionError::ContextMismatch(_)
            | ActionError::NotFound(_)
            | ActionError::Timeout(_) => 1,
            _ => 0,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ActionError::StrategyExhausted { .. } => "strategy_exhausted",
            ActionError::ContextMismatch(_) => "context_mismatch",
            ActionError::NotFound(_) => "not_found",
            ActionError::ValueMismatch { .. } => "value_mismatch",
            ActionError::VerificationFailed { .. } => "verification_failed",
            ActionError::NavigationFailed(_) => "navigation_failed",
            ActionError::Interrupted(_) => "interrupted",
            ActionError::Timeout(_) => "timeout",
            ActionError::Page(_) => "page",
            ActionError::InvalidPlan(_) => "invalid_plan",
        }
    }
}

impl From<AdapterError> for ActionError {
    fn from(err: AdapterError) -> Self {
        match err.kind {
            AdapterErrorKind::TargetNotFound => ActionError::NotFound(err.to_string()),
            AdapterErrorKind::NavTimeout => ActionError::Timeout(err.to_string()),
            _ => ActionError::Page(err.to_string()),
        }
    }
}

impl From<CtxError> for ActionError {
    fn from(err: CtxError) -> Self {
        match err {
            CtxError::Cancelled => ActionError::Interrupted("step cancelled".into()),
            CtxError::DeadlineExceeded => ActionError::Timeout("step deadline exceeded".into()),
        }
    }
}
