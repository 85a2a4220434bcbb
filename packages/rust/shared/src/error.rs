//! Error types for logsweep.
//!
//! Library crates use [`LogsweepError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all logsweep operations.
#[derive(Debug, thiserror::Error)]
pub enum LogsweepError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The build server could not be reached or rejected our credentials.
    #[error("connection error: {0}")]
    Connection(String),

    /// The requested job, build, or log does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transient network failure (timeout, reset, body read).
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status from a collaborator.
    #[error("{url}: HTTP {status}")]
    Http { status: u16, url: String },

    /// Malformed response payload.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Notification delivery error.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LogsweepError>;

impl LogsweepError {
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

    /// Whether retrying the same request later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = LogsweepError::config("missing JENKINS_URL");
        assert_eq!(err.to_string(), "config error: missing JENKINS_URL");

        let err = LogsweepError::Http {
            status: 502,
            url: "https://ci.example.com/api/json".into(),
        };
        assert_eq!(err.to_string(), "https://ci.example.com/api/json: HTTP 502");
    }

    #[test]
    fn transient_classification() {
        assert!(LogsweepError::Network("reset".into()).is_transient());
        assert!(
            LogsweepError::Http {
                status: 503,
                url: "x".into()
            }
            .is_transient()
        );
        assert!(!LogsweepError::NotFound("build 7".into()).is_transient());
        assert!(!LogsweepError::Connection("401".into()).is_transient());
    }
}
