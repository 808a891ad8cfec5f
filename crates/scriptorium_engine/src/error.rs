//! Error types for engine collaborators and user-facing error codes.

use core::fmt;

/// Error raised by an interpreter engine while executing a unit's source.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The interpreter rejected or failed to execute the source.
    #[error("execution failed: {0}")]
    Execution(String),

    /// A background worker failed at runtime.
    #[error("worker error: {0}")]
    Worker(String),

    /// The worker terminated before confirming readiness.
    #[error("worker terminated before ready")]
    WorkerUnavailable,

    /// The engine does not support the requested execution mode.
    #[error("unsupported execution mode: {0}")]
    Unsupported(&'static str),
}

/// Error raised while fetching an external source reference.
///
/// Fetch failures are recoverable at the source-resolution layer: they are
/// reported to the unit's stderr channel and resolution falls through to the
/// unit's inline content.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// The remote endpoint answered with a non-success status.
    #[error("fetch of '{url}' failed with status {status}")]
    Status {
        /// The requested URL.
        url: String,
        /// The response status code.
        status: u16,
    },

    /// Transport-level failure before any response arrived.
    #[error("fetch of '{url}' failed: {reason}")]
    Transport {
        /// The requested URL.
        url: String,
        /// Human-readable failure reason.
        reason: String,
    },
}

/// Error raised while resolving a flavor's configuration.
///
/// A flavor whose config resolution carries an error is disabled fail-closed:
/// its element type is never registered, other flavors are unaffected.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config text was not valid JSON.
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A remote config reference could not be fetched.
    #[error("config fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The config parsed but violates a structural constraint.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// ErrorCode
// ─────────────────────────────────────────────────────────────────────────────

/// User-facing error code prefixed to messages written to a unit's stderr
/// channel, distinguishing error classes for embedders and their users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(&'static str);

impl ErrorCode {
    /// Formats a message with this code's prefix.
    #[must_use]
    pub fn message(&self, detail: impl fmt::Display) -> String {
        format!("({}): {detail}", self.0)
    }

    /// The bare code string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0)
    }
}

/// Well-known error codes.
pub mod codes {
    use super::ErrorCode;

    /// An upstream error was captured for a unit before it became ready;
    /// its body conflicts with the failed setup and is never executed.
    pub const CONFLICTING_CODE: ErrorCode = ErrorCode("SCR1001");

    /// A flavor's configuration failed to resolve.
    pub const BAD_CONFIG: ErrorCode = ErrorCode("SCR1002");

    /// An external source reference could not be fetched.
    pub const FETCH_FAILED: ErrorCode = ErrorCode("SCR1003");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_prefixes_message() {
        let msg = codes::CONFLICTING_CODE.message("setup failed earlier");
        assert_eq!(msg, "(SCR1001): setup failed earlier");
    }

    #[test]
    fn fetch_error_display() {
        let err = FetchError::Status {
            url: "https://example.test/app.py".into(),
            status: 404,
        };
        assert_eq!(
            err.to_string(),
            "fetch of 'https://example.test/app.py' failed with status 404"
        );
    }

    #[test]
    fn config_error_wraps_fetch() {
        let err = ConfigError::from(FetchError::Transport {
            url: "https://example.test/cfg.json".into(),
            reason: "connection refused".into(),
        });
        assert!(err.to_string().starts_with("config fetch failed"));
    }
}
