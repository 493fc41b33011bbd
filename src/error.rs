//! Common error types for the image generation engine

use thiserror::Error;

/// Engine-wide error type
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider error: {message}")]
    Provider {
        status: Option<u16>,
        message: String,
    },

    #[error("Image download failed: {0}")]
    Download(String),

    #[error("Generation failed for page {index}: {message}")]
    Generation { index: u32, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid base64 payload: {0}")]
    Decode(String),
}

impl EngineError {
    /// Create a provider error carrying an HTTP status classification.
    pub fn provider(status: impl Into<Option<u16>>, message: impl Into<String>) -> Self {
        Self::Provider {
            status: status.into(),
            message: message.into(),
        }
    }

    /// True if this failure signals rate limiting (status 429 or a
    /// message mentioning "rate"), which selects the slower backoff curve.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::Provider { status, message } => {
                *status == Some(429)
                    || message.contains("429")
                    || message.to_lowercase().contains("rate")
            }
            Self::HttpClient(e) => e
                .status()
                .map(|s| s.as_u16() == 429)
                .unwrap_or(false),
            _ => false,
        }
    }

    /// The HTTP status behind this error, where one applies.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => *status,
            Self::HttpClient(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, EngineError>;
