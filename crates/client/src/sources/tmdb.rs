//! TMDB (The Movie Database) adapter.
//!
//! Queries the TMDB v3 REST API with `api_key` query authentication and
//! returns typed search and detail payloads. Chinese metadata comes back
//! via `language=zh-CN` where TMDB has it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::fetch::{ClientConfig, SourceClient};
use titlescout_core::Error;
use titlescout_core::cache::{TtlCache, query_key};

const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";
const SEARCH_TTL: Duration = Duration::from_secs(7 * 24 * 3600);
const DETAIL_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// TMDB client configuration.
#[derive(Debug, Clone)]
pub struct TmdbConfig {
    /// v3 API key, sent as the `api_key` query parameter.
    pub api_key: String,
    /// Base URL (default: <https://api.themoviedb.org/3>).
    pub base_url: String,
    /// Preferred metadata language (default: zh-CN).
    pub language: String,
}

impl TmdbConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            language: "zh-CN".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchPage<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

/// One movie row from `search/movie`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieResult {
    pub id: u64,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub release_date: Option<String>,
    pub overview: Option<String>,
}

/// One series row from `search/tv`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvResult {
    pub id: u64,
    pub name: Option<String>,
    pub original_name: Option<String>,
    pub first_air_date: Option<String>,
    pub overview: Option<String>,
}

/// Full movie detail from `movie/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieDetail {
    pub id: u64,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub release_date: Option<String>,
    pub overview: Option<String>,
    pub runtime: Option<u32>,
    pub vote_average: Option<f64>,
    pub imdb_id: Option<String>,
    #[serde(default)]
    pub genres: Vec<Genre>,
}

/// Full series detail from `tv/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvDetail {
    pub id: u64,
    pub name: Option<String>,
    pub original_name: Option<String>,
    pub first_air_date: Option<String>,
    pub overview: Option<String>,
    pub number_of_seasons: Option<u32>,
    pub number_of_episodes: Option<u32>,
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub genres: Vec<Genre>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genre {
    pub id: u64,
    pub name: String,
}

/// TMDB API client.
pub struct TmdbClient {
    client: SourceClient,
    cache: Arc<TtlCache>,
    config: TmdbConfig,
}

impl TmdbClient {
    pub fn default_client_config() -> ClientConfig {
        ClientConfig {
            requests_per_second: 1.0,
            timeout: Duration::from_secs(10),
            max_retries: 3,
            // API host; robots gating is for scraped pages.
            respect_robots: false,
            ..Default::default()
        }
    }

    pub fn new(config: TmdbConfig, cache: Arc<TtlCache>) -> Result<Self, Error> {
        Self::with_client_config(config, Self::default_client_config(), cache)
    }

    pub fn with_client_config(
        config: TmdbConfig,
        client_config: ClientConfig,
        cache: Arc<TtlCache>,
    ) -> Result<Self, Error> {
        Ok(Self { client: SourceClient::new(client_config)?, cache, config })
    }

    fn endpoint(&self, path: &str, extra: &[(&str, &str)]) -> Result<Url, Error> {
        let mut params = vec![
            ("api_key", self.config.api_key.as_str()),
            ("language", self.config.language.as_str()),
        ];
        params.extend_from_slice(extra);
        Url::parse_with_params(&format!("{}/{path}", self.config.base_url), &params)
            .map_err(|e| Error::InvalidUrl(e.to_string()))
    }

    async fn cached_json<T>(&self, cancel: &CancellationToken, key: &str, url: Url, ttl: Duration) -> Result<T, Error>
    where
        T: Serialize + serde::de::DeserializeOwned,
    {
        if let Some(value) = self.cache.get::<T>(key).await? {
            return Ok(value);
        }
        let response = self.client.get_json(cancel, url.as_str()).await?;
        let value: T = response.json()?;
        self.cache.set(key, &value, ttl).await?;
        Ok(value)
    }

    /// Search movies by free-text query.
    pub async fn search_movie(&self, cancel: &CancellationToken, query: &str) -> Result<Vec<MovieResult>, Error> {
        let key = query_key("tmdb", "search_movie", query);
        if let Some(results) = self.cache.get::<Vec<MovieResult>>(&key).await? {
            return Ok(results);
        }
        let url = self.endpoint("search/movie", &[("query", query)])?;
        let response = self.client.get_json(cancel, url.as_str()).await?;
        let page: SearchPage<MovieResult> = response.json()?;
        self.cache.set(&key, &page.results, SEARCH_TTL).await?;
        Ok(page.results)
    }

    /// Search TV series by free-text query.
    pub async fn search_tv(&self, cancel: &CancellationToken, query: &str) -> Result<Vec<TvResult>, Error> {
        let key = query_key("tmdb", "search_tv", query);
        if let Some(results) = self.cache.get::<Vec<TvResult>>(&key).await? {
            return Ok(results);
        }
        let url = self.endpoint("search/tv", &[("query", query)])?;
        let response = self.client.get_json(cancel, url.as_str()).await?;
        let page: SearchPage<TvResult> = response.json()?;
        self.cache.set(&key, &page.results, SEARCH_TTL).await?;
        Ok(page.results)
    }

    /// Fetch full movie detail by TMDB id.
    pub async fn movie(&self, cancel: &CancellationToken, id: u64) -> Result<MovieDetail, Error> {
        let key = format!("tmdb:movie:{id}");
        let url = self.endpoint(&format!("movie/{id}"), &[])?;
        self.cached_json(cancel, &key, url, DETAIL_TTL).await
    }

    /// Fetch full series detail by TMDB id.
    pub async fn tv(&self, cancel: &CancellationToken, id: u64) -> Result<TvDetail, Error> {
        let key = format!("tmdb:tv:{id}");
        let url = self.endpoint(&format!("tv/{id}"), &[])?;
        self.cached_json(cancel, &key, url, DETAIL_TTL).await
    }

    pub fn metrics(&self) -> crate::fetch::MetricsSnapshot {
        self.client.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> TmdbClient {
        let cache = Arc::new(TtlCache::disabled());
        TmdbClient::new(TmdbConfig::new("secret"), cache).unwrap()
    }

    #[test]
    fn test_endpoint_carries_auth_and_language() {
        let client = test_client();
        let url = client.endpoint("search/movie", &[("query", "盗梦空间")]).unwrap();
        let s = url.as_str();
        assert!(s.starts_with("https://api.themoviedb.org/3/search/movie?"));
        assert!(s.contains("api_key=secret"));
        assert!(s.contains("language=zh-CN"));
        assert!(s.contains("query="));
    }

    #[test]
    fn test_search_page_deserializes() {
        let body = r#"{
            "page": 1,
            "results": [
                {"id": 27205, "title": "盗梦空间", "original_title": "Inception",
                 "release_date": "2010-07-15", "overview": "..."}
            ],
            "total_pages": 1,
            "total_results": 1
        }"#;
        let page: SearchPage<MovieResult> = serde_json::from_str(body).unwrap();
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].id, 27205);
        assert_eq!(page.results[0].original_title.as_deref(), Some("Inception"));
    }

    #[test]
    fn test_empty_results_default() {
        let page: SearchPage<MovieResult> = serde_json::from_str(r#"{"page": 1}"#).unwrap();
        assert!(page.results.is_empty());
    }

    #[test]
    fn test_detail_deserializes() {
        let body = r#"{
            "id": 27205,
            "title": "盗梦空间",
            "original_title": "Inception",
            "release_date": "2010-07-15",
            "runtime": 148,
            "vote_average": 8.4,
            "imdb_id": "tt1375666",
            "genres": [{"id": 28, "name": "动作"}, {"id": 878, "name": "科幻"}]
        }"#;
        let detail: MovieDetail = serde_json::from_str(body).unwrap();
        assert_eq!(detail.runtime, Some(148));
        assert_eq!(detail.genres.len(), 2);
        assert_eq!(detail.imdb_id.as_deref(), Some("tt1375666"));
    }
}
