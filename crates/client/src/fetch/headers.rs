//! Identifying-header rotation.
//!
//! Scraped sources fingerprint clients by User-Agent; a fixed pool of
//! realistic desktop browser values rotated round-robin (and rotated again on
//! every retry) keeps one stuck value from being throttled into uselessness.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed pool of realistic identifying headers.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
];

/// Round-robin cursor over the User-Agent pool.
#[derive(Debug, Default)]
pub struct HeaderPool {
    cursor: AtomicUsize,
}

impl HeaderPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next identifying header value.
    pub fn next_user_agent(&self) -> &'static str {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed);
        USER_AGENTS[idx % USER_AGENTS.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_is_round_robin() {
        let pool = HeaderPool::new();
        let first: Vec<_> = (0..USER_AGENTS.len()).map(|_| pool.next_user_agent()).collect();
        assert_eq!(first, USER_AGENTS);

        // Wraps back to the start.
        assert_eq!(pool.next_user_agent(), USER_AGENTS[0]);
    }

    #[test]
    fn test_pool_values_look_like_browsers() {
        for ua in USER_AGENTS {
            assert!(ua.starts_with("Mozilla/5.0"));
        }
    }
}
