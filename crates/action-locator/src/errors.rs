//! Error types for target resolution

use cdp_adapter::AdapterError;
use stepwright_core_types::CtxError;
use thiserror::Error;

/// Locator error enumeration
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// Every tier ran without producing a validated target
    #[error("Could not resolve '{target}': {attempts}")]
    ResolutionExhausted { target: String, attempts: String },

    /// Candidate point lies outside the viewport (plus margin)
    #[error("Point ({x:.0}, {y:.0}) is outside the viewport")]
    OutOfViewport { x: f64, y: f64 },

    /// Candidate point does not land on something the action can use
    #[error("Element at ({x:.0}, {y:.0}) is not interactive: {detail}")]
    NonInteractiveTarget { x: f64, y: f64, detail: String },

    /// Vision model failed on every attempt
    #[error("Vision call failed after {attempts} attempt(s): {reason}")]
    VisionCallFailed { attempts: usize, reason: String },

    /// Step was cancelled by its owner
    #[error("Resolution cancelled")]
    Cancelled,

    /// Step deadline passed during resolution
    #[error("Resolution timeout: {0}")]
    Timeout(String),

    /// Page query failed
    #[error("Page error: {0}")]
    Page(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LocatorError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, LocatorError::Timeout(_) | LocatorError::Page(_))
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::Internal(_) => 3,
            LocatorError::Page(_) | LocatorError::Timeout(_) | LocatorError::VisionCallFailed { .. } => {
                2
            }
            LocatorError::ResolutionExhausted { .. }
            | LocatorError::OutOfViewport { .. }
            | LocatorError::NonInteractiveTarget { .. } => 1,
            LocatorError::Cancelled => 0,
        }
    }

    /// Short label used for metrics and failure summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            LocatorError::ResolutionExhausted { .. } => "exhausted",
            LocatorError::OutOfViewport { .. } => "out_of_viewport",
            LocatorError::NonInteractiveTarget { .. } => "non_interactive",
            LocatorError::VisionCallFailed { .. } => "vision_failed",
            LocatorError::Cancelled => "cancelled",
            LocatorError::Timeout(_) => "timeout",
            LocatorError::Page(_) => "page",
            LocatorError::Internal(_) => "internal",
        }
    }
}

impl From<AdapterError> for LocatorError {
    fn from(err: AdapterError) -> Self {
        LocatorError::Page(err.to_string())
    }
}

impl From<CtxError> for LocatorError {
    fn from(err: CtxError) -> Self {
        match err {
            CtxError::Cancelled => LocatorError::Cancelled,
            CtxError::DeadlineExceeded => LocatorError::Timeout("step deadline exceeded".into()),
        }
    }
}
