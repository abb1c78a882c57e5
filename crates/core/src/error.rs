//! Unified error types for titlescout.
//!
//! One taxonomy shared by the fetch layer, the cache, and the source
//! adapters. Which failures the fetch layer re-attempts is decided by its
//! response classifier; errors here carry the status, reason, and attempt
//! counts that decision produces.

use tokio_rusqlite::rusqlite;

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(s) => format!(" (status {s})"),
        None => String::new(),
    }
}

/// Unified error type for the titlescout backend.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request was blocked before or during the fetch: disabled client,
    /// robots-disallowed path, or an anti-scraping response (403/429/503,
    /// interstitial content).
    #[error("blocked: {reason}{}", fmt_status(.status))]
    Blocked {
        /// HTTP status that triggered the block, if one was received.
        status: Option<u16>,
        reason: String,
        /// Server-provided Retry-After hint, in seconds.
        retry_after: Option<u64>,
    },

    /// A payload was malformed or missing an expected field. Never retried.
    #[error("parse error in {field}: {reason}")]
    Parse { field: String, reason: String },

    /// The remote resource does not exist. Never retried.
    #[error("not found: {query}")]
    NotFound { query: String },

    /// Non-2xx response outside the block taxonomy (e.g. 500 without a
    /// Retry-After). Retryable, but counted separately from blocks.
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// Transport-level failure (connect, TLS, redirect cap, read).
    #[error("transport error: {0}")]
    Transport(String),

    /// The request exceeded the configured timeout.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// The caller's cancellation signal fired. Propagated verbatim.
    #[error("operation cancelled")]
    Cancelled,

    /// The retry budget ran out. Wraps the last underlying cause.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<Error> },

    /// Invalid or unparsable URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Cache database operation failed.
    #[error("cache error: {0}")]
    Database(tokio_rusqlite::Error),

    /// Cache migration failed to apply.
    #[error("cache error: migration failed: {0}")]
    MigrationFailed(String),
}

impl Error {
    /// Convenience for a pre-flight block with no HTTP status.
    pub fn blocked(reason: impl Into<String>) -> Self {
        Error::Blocked { status: None, reason: reason.into(), retry_after: None }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_display() {
        let err = Error::Blocked { status: Some(429), reason: "rate limited".into(), retry_after: Some(2) };
        assert!(err.to_string().contains("rate limited"));
        assert!(err.to_string().contains("429"));

        let err = Error::blocked("robots-disallowed");
        assert!(!err.to_string().contains("status"));
    }

    #[test]
    fn test_exhaustion_wraps_cause() {
        let err = Error::RetriesExhausted {
            attempts: 4,
            last: Box::new(Error::Blocked { status: Some(429), reason: "rate limited".into(), retry_after: None }),
        };
        let msg = err.to_string();
        assert!(msg.contains("4 attempts"));
        assert!(msg.contains("rate limited"));
    }
}
