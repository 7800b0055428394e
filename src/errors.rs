//! Error types for plan loading and session setup

use thiserror::Error;

/// Errors raised before a run starts. Step failures are never errors here; they are
/// recorded in the step's `StepExecutionResult`.
#[derive(Debug, Error, Clone)]
pub enum StepwrightError {
    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid plan {source_name}: {message}")]
    PlanParse {
        source_name: String,
        message: String,
    },

    #[error("Plan '{0}' has no steps")]
    EmptyPlan(String),

    #[error("Step {step} is invalid: {reason}")]
    InvalidStep { step: usize, reason: String },

    #[error("Invalid base url '{url}': {message}")]
    BaseUrl { url: String, message: String },

    #[error("Credentials file {path}: {message}")]
    Credentials { path: String, message: String },

    /// Model client could not be built
    #[error("Model client error: {0}")]
    Llm(String),

    #[error("Browser error: {0}")]
    Browser(String),
}

impl StepwrightError {
    pub fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        StepwrightError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, StepwrightError::Io { .. } | StepwrightError::Browser(_))
    }

    /// Get error severity level (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            StepwrightError::Browser(_) => 3,
            StepwrightError::PlanParse { .. }
            | StepwrightError::EmptyPlan(_)
            | StepwrightError::InvalidStep { .. }
            | StepwrightError::BaseUrl { .. }
            | StepwrightError::Io { .. }
            | StepwrightError::Credentials { .. } => 2,
            StepwrightError::Llm(_) => 1,
        }
    }
}

impl From<stepwright_llm::LlmError> for StepwrightError {
    fn from(err: stepwright_llm::LlmError) -> Self {
        StepwrightError::Llm(err.to_string())
    }
}

impl From<cdp_adapter::AdapterError> for StepwrightError {
    fn from(err: cdp_adapter::AdapterError) -> Self {
        StepwrightError::Browser(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_errors_are_not_retried() {
        let err = StepwrightError::InvalidStep {
            step: 3,
            reason: "type step without text".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.severity(), 2);
        assert_eq!(err.to_string(), "Step 3 is invalid: type step without text");
    }

    #[test]
    fn io_errors_keep_the_path() {
        let err = StepwrightError::io(
            std::path::Path::new("plans/login.yaml"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.to_string().contains("plans/login.yaml"));
        assert!(err.is_retryable());
    }
}
