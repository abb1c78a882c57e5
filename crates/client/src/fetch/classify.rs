//! Anti-block response classification.
//!
//! A pure mapping from an HTTP response to a tagged outcome that drives the
//! retry state machine: return, backoff-and-retry, or abort. Scraped sources
//! routinely answer blocked clients with 403/429/503 or with an interstitial
//! page served as the wrong content type; both are retryable blocks rather
//! than hard failures.

use reqwest::StatusCode;
use titlescout_core::Error;

/// Content type the caller expects for the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    Html,
    Json,
    Any,
}

impl Expected {
    fn matches(self, content_type: Option<&str>) -> bool {
        let Some(ct) = content_type else {
            // No Content-Type at all is suspicious only when we expect one.
            return self == Expected::Any;
        };
        let ct = ct.to_ascii_lowercase();
        match self {
            Expected::Html => ct.contains("text/html") || ct.contains("application/xhtml"),
            Expected::Json => ct.contains("application/json") || ct.contains("+json"),
            Expected::Any => true,
        }
    }
}

/// Tagged outcome of classifying one response.
#[derive(Debug)]
pub enum Classification {
    /// 2xx with the expected content type.
    Success,
    /// Anti-scraping block: retry with backoff, counted as blocked.
    RetryableBlock {
        status: u16,
        reason: &'static str,
        /// Retry-After hint in seconds, if the server sent one.
        retry_after: Option<u64>,
    },
    /// Other non-2xx: retry with backoff, counted separately from blocks.
    RetryableHttp { status: u16 },
    /// Not worth retrying; surfaced to the caller immediately.
    Fatal(Error),
}

/// Classify a response by status, content type, and Retry-After hint.
///
/// `url` only feeds error context (the NotFound query).
pub fn classify(url: &str, status: StatusCode, content_type: Option<&str>, retry_after: Option<u64>, expected: Expected) -> Classification {
    match status.as_u16() {
        403 => Classification::RetryableBlock { status: 403, reason: "access forbidden", retry_after },
        429 => Classification::RetryableBlock { status: 429, reason: "rate limited", retry_after },
        503 => Classification::RetryableBlock { status: 503, reason: "service unavailable", retry_after },
        404 => Classification::Fatal(Error::NotFound { query: url.to_string() }),
        s if status.is_success() => {
            if expected.matches(content_type) {
                Classification::Success
            } else {
                // Likely an interstitial or CAPTCHA page in place of the
                // real resource.
                Classification::RetryableBlock { status: s, reason: "unexpected content type", retry_after: None }
            }
        }
        s => Classification::RetryableHttp { status: s },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_statuses() {
        for status in [403u16, 429, 503] {
            let c = classify(
                "https://movie.douban.com/subject/1",
                StatusCode::from_u16(status).unwrap(),
                Some("text/html"),
                None,
                Expected::Html,
            );
            assert!(matches!(c, Classification::RetryableBlock { status: s, .. } if s == status));
        }
    }

    #[test]
    fn test_retry_after_hint_is_kept() {
        let c = classify("u", StatusCode::TOO_MANY_REQUESTS, None, Some(7), Expected::Any);
        match c {
            Classification::RetryableBlock { retry_after, .. } => assert_eq!(retry_after, Some(7)),
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn test_success_with_expected_type() {
        let c = classify("u", StatusCode::OK, Some("text/html; charset=utf-8"), None, Expected::Html);
        assert!(matches!(c, Classification::Success));

        let c = classify("u", StatusCode::OK, Some("application/json"), None, Expected::Json);
        assert!(matches!(c, Classification::Success));
    }

    #[test]
    fn test_content_type_mismatch_is_block() {
        let c = classify("u", StatusCode::OK, Some("text/plain"), None, Expected::Html);
        assert!(matches!(c, Classification::RetryableBlock { reason: "unexpected content type", .. }));

        let c = classify("u", StatusCode::OK, None, None, Expected::Json);
        assert!(matches!(c, Classification::RetryableBlock { .. }));
    }

    #[test]
    fn test_any_accepts_everything() {
        let c = classify("u", StatusCode::OK, Some("image/png"), None, Expected::Any);
        assert!(matches!(c, Classification::Success));

        let c = classify("u", StatusCode::OK, None, None, Expected::Any);
        assert!(matches!(c, Classification::Success));
    }

    #[test]
    fn test_404_is_fatal_not_found() {
        let c = classify("https://example.com/missing", StatusCode::NOT_FOUND, None, None, Expected::Any);
        match c {
            Classification::Fatal(Error::NotFound { query }) => assert!(query.contains("missing")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_other_errors_are_retryable_http() {
        let c = classify("u", StatusCode::INTERNAL_SERVER_ERROR, None, None, Expected::Any);
        assert!(matches!(c, Classification::RetryableHttp { status: 500 }));

        let c = classify("u", StatusCode::BAD_GATEWAY, None, None, Expected::Any);
        assert!(matches!(c, Classification::RetryableHttp { status: 502 }));
    }
}
