//! Stable cache key generation for query-shaped lookups.
//!
//! Source-native identifiers (a Douban subject id, a TMDB movie id) are used
//! as cache keys directly. Free-text lookups hash the query instead so the
//! key stays a stable, bounded identifier.

use sha2::{Digest, Sha256};

/// Compute a stable cache key for a free-text query against a source.
pub fn query_key(source: &str, operation: &str, query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(b"\n");
    hasher.update(operation.as_bytes());
    hasher.update(b"\n");
    hasher.update(query.as_bytes());
    format!("{source}:{operation}:{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_stability() {
        let key1 = query_key("douban", "search", "霸王别姬");
        let key2 = query_key("douban", "search", "霸王别姬");
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_key_varies_by_operation() {
        let search = query_key("tmdb", "search_movie", "Inception");
        let detail = query_key("tmdb", "search_tv", "Inception");
        assert_ne!(search, detail);
    }

    #[test]
    fn test_key_varies_by_source() {
        assert_ne!(
            query_key("douban", "search", "Inception"),
            query_key("wikipedia", "search", "Inception")
        );
    }

    #[test]
    fn test_key_format() {
        let key = query_key("tmdb", "search_movie", "Inception");
        assert!(key.starts_with("tmdb:search_movie:"));
        let digest = key.rsplit(':').next().unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
