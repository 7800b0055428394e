use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error kinds surfaced by page adapters.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq, Serialize, Deserialize)]
pub enum AdapterErrorKind {
    #[error("navigation timed out")]
    NavTimeout,
    #[error("navigation interrupted the operation")]
    NavigationInterrupted,
    #[error("cdp i/o failure")]
    CdpIo,
    #[error("target element not found")]
    TargetNotFound,
    #[error("element not clickable")]
    NotClickable,
    #[error("browser launch failed")]
    Launch,
    #[error("internal error")]
    Internal,
}

/// Enriched error metadata passed back to higher layers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub hint: Option<String>,
    pub retriable: bool,
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for AdapterError {}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind) -> Self {
        Self {
            kind,
            hint: None,
            retriable: false,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn retriable(mut self, flag: bool) -> Self {
        self.retriable = flag;
        self
    }

    pub fn not_found(hint: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::TargetNotFound).with_hint(hint)
    }

    pub fn internal(hint: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Internal).with_hint(hint)
    }

    /// Classifies a raw protocol failure message.
    ///
    /// A destroyed execution context means the page navigated underneath the
    /// command, which callers treat as evidence that the input landed.
    pub fn from_protocol(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        let kind = if lower.contains("execution context was destroyed")
            || lower.contains("cannot find context with specified id")
            || lower.contains("inspected target navigated")
        {
            AdapterErrorKind::NavigationInterrupted
        } else if lower.contains("timeout") || lower.contains("timed out") {
            AdapterErrorKind::NavTimeout
        } else {
            AdapterErrorKind::CdpIo
        };
        let retriable = matches!(kind, AdapterErrorKind::CdpIo);
        Self::new(kind).with_hint(message).retriable(retriable)
    }

    pub fn is_navigation_interrupted(&self) -> bool {
        self.kind == AdapterErrorKind::NavigationInterrupted
    }
}

impl From<chromiumoxide::error::CdpError> for AdapterError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AdapterError::from_protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_destroyed_context_as_navigation() {
        let err = AdapterError::from_protocol(
            "Execution context was destroyed, most likely because of a navigation",
        );
        assert!(err.is_navigation_interrupted());
        assert!(!err.retriable);
    }

    #[test]
    fn display_includes_hint() {
        let err = AdapterError::not_found("css:#missing");
        assert_eq!(err.to_string(), "target element not found: css:#missing");
    }
}
