use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum LlmError {
    #[error("missing API key")]
    MissingApiKey,

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// Transport-level failure before a response arrived
    #[error("request failed: {0}")]
    Request(String),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request timed out: {0}")]
    Timeout(String),

    /// Response arrived but could not be understood
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("image preparation failed: {0}")]
    Image(String),
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Request(_) | LlmError::Timeout(_) | LlmError::InvalidResponse(_) => true,
            LlmError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// 0=low, 1=medium, 2=high, 3=critical
    pub fn severity(&self) -> u8 {
        match self {
            LlmError::MissingApiKey | LlmError::Client(_) => 3,
            LlmError::Status { .. } | LlmError::Image(_) => 2,
            LlmError::Request(_) | LlmError::Timeout(_) | LlmError::InvalidResponse(_) => 1,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(err.to_string())
        } else if err.is_decode() {
            LlmError::InvalidResponse(err.to_string())
        } else {
            LlmError::Request(err.to_string())
        }
    }
}

impl From<perceiver_visual::VisualError> for LlmError {
    fn from(err: perceiver_visual::VisualError) -> Self {
        LlmError::Image(err.to_string())
    }
}
