//! Structured error types for sellflow
//!
//! Library-level failures get a typed enum; binary code and filesystem
//! plumbing stay on `anyhow` with context.

use std::time::Duration;
use thiserror::Error;

/// Primary error type for sellflow operations
#[derive(Error, Debug)]
pub enum SellflowError {
    /// Network/connection error (channel or HTTP)
    #[error("connection failed: {message}")]
    ConnectionFailed { message: String },

    /// Submission endpoint returned a non-success status
    #[error("submission failed: {status} - {message}")]
    SubmissionFailed { status: u16, message: String },

    /// LLM provider returned an error
    #[error("provider error: {status} - {message}")]
    ProviderError { status: u16, message: String },

    /// Operation timed out
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Notification channel was closed before the operation finished
    #[error("notification channel closed")]
    ChannelClosed,

    /// Invalid configuration
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Missing required config
    #[error("missing required configuration: {key}")]
    MissingConfig { key: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl SellflowError {
    /// Check if error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } => true,
            Self::Timeout { .. } => true,
            Self::ProviderError { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::Io(io_err) => matches!(
                io_err.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
            ),
            Self::SubmissionFailed { .. }
            | Self::ChannelClosed
            | Self::InvalidConfig { .. }
            | Self::MissingConfig { .. }
            | Self::Json { .. }
            | Self::Http { .. } => false,
        }
    }
}

impl From<serde_json::Error> for SellflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<reqwest::Error> for SellflowError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                duration: Duration::from_secs(0),
            }
        } else if err.is_connect() {
            Self::ConnectionFailed {
                message: err.to_string(),
            }
        } else {
            Self::Http(err.to_string())
        }
    }
}

/// Result type alias using SellflowError
pub type Result<T> = std::result::Result<T, SellflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SellflowError::ConnectionFailed {
            message: "refused".to_string()
        }
        .is_retryable());

        assert!(SellflowError::ProviderError {
            status: 503,
            message: "overloaded".to_string()
        }
        .is_retryable());

        assert!(!SellflowError::ProviderError {
            status: 401,
            message: "bad key".to_string()
        }
        .is_retryable());

        assert!(!SellflowError::SubmissionFailed {
            status: 422,
            message: "bad body".to_string()
        }
        .is_retryable());

        assert!(!SellflowError::ChannelClosed.is_retryable());
    }
}
