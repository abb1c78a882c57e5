//! Chinese Wikipedia adapter.
//!
//! Uses the REST `page/summary` endpoint, which returns a compact JSON
//! document for a title. A missing page surfaces as [`Error::NotFound`]
//! straight from the classifier (the endpoint 404s), never as a retry.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::fetch::{ClientConfig, SourceClient};
use titlescout_core::Error;
use titlescout_core::cache::{TtlCache, query_key};

const BASE_URL: &str = "https://zh.wikipedia.org/api/rest_v1";
const SUMMARY_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Page summary as returned by the REST API (fields we keep).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSummary {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub extract: Option<String>,
    #[serde(default)]
    pub pageid: Option<u64>,
}

/// Wikipedia REST client.
pub struct WikipediaClient {
    client: SourceClient,
    cache: Arc<TtlCache>,
}

impl WikipediaClient {
    pub fn default_config() -> ClientConfig {
        ClientConfig {
            requests_per_second: 1.0,
            timeout: Duration::from_secs(15),
            max_retries: 3,
            // The REST API is not robots-gated the way scraped pages are.
            respect_robots: false,
            ..Default::default()
        }
    }

    pub fn new(cache: Arc<TtlCache>) -> Result<Self, Error> {
        Self::with_config(Self::default_config(), cache)
    }

    pub fn with_config(config: ClientConfig, cache: Arc<TtlCache>) -> Result<Self, Error> {
        Ok(Self { client: SourceClient::new(config)?, cache })
    }

    /// Fetch the summary for a page title.
    pub async fn summary(&self, cancel: &CancellationToken, title: &str) -> Result<PageSummary, Error> {
        let normalized = title.trim().replace(' ', "_");
        let key = query_key("wikipedia", "summary", &normalized);
        if let Some(summary) = self.cache.get::<PageSummary>(&key).await? {
            return Ok(summary);
        }

        let url = format!("{BASE_URL}/page/summary/{normalized}");
        let response = self.client.get_json(cancel, &url).await?;
        let summary: PageSummary = response.json()?;

        self.cache.set(&key, &summary, SUMMARY_TTL).await?;
        Ok(summary)
    }

    pub fn metrics(&self) -> crate::fetch::MetricsSnapshot {
        self.client.metrics()
    }
}
