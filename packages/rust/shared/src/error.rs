//! Error types for CybVector.
//!
//! Library crates use [`CybVectorError`] via `thiserror`.
//! The CLI app wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all CybVector operations.
#[derive(Debug, thiserror::Error)]
pub enum CybVectorError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level failure (connect, timeout, TLS, body read).
    #[error("network error: {0}")]
    Network(String),

    /// A lookup or model backend answered with a non-success status.
    #[error("{source_name} returned HTTP {status}: {body}")]
    Backend {
        source_name: String,
        status: u16,
        body: String,
    },

    /// Language-model call failed or returned an unusable response.
    #[error("completion error: {0}")]
    Completion(String),

    /// Response body could not be decoded.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CybVectorError>;

impl CybVectorError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Raw error text as a lookup backend would report it.
    ///
    /// For non-success responses this is the body the backend sent back,
    /// for everything else the rendered error message.
    pub fn detail(&self) -> String {
        match self {
            Self::Backend { body, .. } => body.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = CybVectorError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = CybVectorError::validation("empty entity");
        assert!(err.to_string().contains("empty entity"));
    }

    #[test]
    fn backend_detail_is_raw_body() {
        let err = CybVectorError::Backend {
            source_name: "VirusTotal".into(),
            status: 401,
            body: r#"{"error":{"code":"WrongCredentialsError"}}"#.into(),
        };
        assert!(err.to_string().starts_with("VirusTotal returned HTTP 401"));
        assert_eq!(err.detail(), r#"{"error":{"code":"WrongCredentialsError"}}"#);

        let err = CybVectorError::Network("connection refused".into());
        assert_eq!(err.detail(), "network error: connection refused");
    }
}
