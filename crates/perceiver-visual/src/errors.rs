//! Error types for visual perceiver operations
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum VisualError {
    /// Screenshot file could not be read or written
    #[error("screenshot io error: {0}")]
    Io(String),

    #[error("image processing error: {0}")]
    ImageProcessing(String),

    /// Viewport metrics could not be read from the page
    #[error("viewport unavailable: {0}")]
    Viewport(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl VisualError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Viewport(_) | Self::Io(_))
    }

    pub fn severity(&self) -> u8 {
        match self {
            Self::Viewport(_) => 1,
            Self::InvalidInput(_) => 1,
            Self::Io(_) | Self::ImageProcessing(_) => 2,
        }
    }
}

impl From<std::io::Error> for VisualError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<image::ImageError> for VisualError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing(err.to_string())
    }
}
