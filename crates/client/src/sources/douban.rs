//! Douban movie/TV adapter.
//!
//! Douban has no public API; subjects and search results are fetched as HTML
//! documents through the polite pipeline and cached aggressively. Subject
//! pages are near-immutable once published, hence the long TTL; search
//! result pages drift as new entries appear.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::fetch::{ClientConfig, SourceClient};
use titlescout_core::cache::{TtlCache, query_key};
use titlescout_core::Error;

const SUBJECT_BASE: &str = "https://movie.douban.com/subject";
const SEARCH_URL: &str = "https://search.douban.com/movie/subject_search";

const SUBJECT_TTL: Duration = Duration::from_secs(30 * 24 * 3600);
const SEARCH_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Douban scraper client.
pub struct DoubanClient {
    client: SourceClient,
    cache: Arc<TtlCache>,
}

impl DoubanClient {
    /// Conservative defaults for a site known to block eager scrapers:
    /// one request every two seconds, generous timeout, extra retry.
    pub fn default_config() -> ClientConfig {
        ClientConfig {
            requests_per_second: 0.5,
            timeout: Duration::from_secs(30),
            max_retries: 4,
            ..Default::default()
        }
    }

    pub fn new(cache: Arc<TtlCache>) -> Result<Self, Error> {
        Self::with_config(Self::default_config(), cache)
    }

    pub fn with_config(config: ClientConfig, cache: Arc<TtlCache>) -> Result<Self, Error> {
        Ok(Self { client: SourceClient::new(config)?, cache })
    }

    /// Fetch a subject page as HTML, by Douban subject id.
    pub async fn subject_html(&self, cancel: &CancellationToken, subject_id: &str) -> Result<String, Error> {
        let key = format!("douban:subject:{subject_id}");
        if let Some(html) = self.cache.get::<String>(&key).await? {
            return Ok(html);
        }

        let url = format!("{SUBJECT_BASE}/{subject_id}/");
        let response = self.client.get_html(cancel, &url).await?;
        let html = response.text();

        self.cache.set(&key, &html, SUBJECT_TTL).await?;
        Ok(html)
    }

    /// Fetch the search results page for a free-text query, as HTML.
    pub async fn search_html(&self, cancel: &CancellationToken, query: &str) -> Result<String, Error> {
        let key = query_key("douban", "search", query);
        if let Some(html) = self.cache.get::<String>(&key).await? {
            return Ok(html);
        }

        let url = Url::parse_with_params(SEARCH_URL, &[("search_text", query)])
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let response = self.client.get_html(cancel, url.as_str()).await?;
        let html = response.text();

        self.cache.set(&key, &html, SEARCH_TTL).await?;
        Ok(html)
    }

    /// Point-in-time copy of the underlying client's metrics.
    pub fn metrics(&self) -> crate::fetch::MetricsSnapshot {
        self.client.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_conservative() {
        let config = DoubanClient::default_config();
        assert_eq!(config.requests_per_second, 0.5);
        assert_eq!(config.max_retries, 4);
        assert!(config.respect_robots);
    }

    #[test]
    fn test_search_url_encodes_query() {
        let url = Url::parse_with_params(SEARCH_URL, &[("search_text", "霸王别姬 1993")]).unwrap();
        let s = url.as_str();
        assert!(s.starts_with("https://search.douban.com/movie/subject_search?search_text="));
        assert!(!s.contains(' '));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let cache = Arc::new(TtlCache::new(
            titlescout_core::CacheDb::open_in_memory().await.unwrap(),
            Duration::ZERO,
        ));
        cache
            .set("douban:subject:1291546", &"<html>cached</html>".to_string(), SUBJECT_TTL)
            .await
            .unwrap();

        // Disabled client: any network attempt would error immediately.
        let config = ClientConfig { enabled: false, ..DoubanClient::default_config() };
        let douban = DoubanClient::with_config(config, cache).unwrap();

        let cancel = CancellationToken::new();
        let html = douban.subject_html(&cancel, "1291546").await.unwrap();
        assert_eq!(html, "<html>cached</html>");
        assert_eq!(douban.metrics().total_requests, 0);
    }
}
