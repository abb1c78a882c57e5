//! titlescout entry point.
//!
//! Resolves each command-line query against the configured sources and
//! prints JSON results on stdout. Logging goes to stderr so the output
//! stream stays machine-readable. Ctrl-C cancels in-flight lookups through
//! the shared cancellation token rather than killing the process mid-write.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use titlescout_client::{DoubanClient, TmdbClient, WikipediaClient};
use titlescout_client::sources::tmdb::TmdbConfig;
use titlescout_core::cache::{CacheDb, TtlCache};
use titlescout_core::{AppConfig, Error};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load().context("loading configuration")?;

    let cache = if config.cache_enabled {
        let db = CacheDb::open(&config.db_path)
            .await
            .with_context(|| format!("opening cache at {}", config.db_path.display()))?;
        Arc::new(TtlCache::new(db, config.cleanup_interval()))
    } else {
        Arc::new(TtlCache::disabled())
    };

    let queries: Vec<String> = std::env::args().skip(1).collect();
    if queries.is_empty() {
        eprintln!("usage: titlescout <query | douban:SUBJECT_ID>...");
        cache.close().await;
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling in-flight lookups");
            signal_cancel.cancel();
        }
    });

    // The robots toggle from configuration reaches every adapter; sources
    // that already opt out (API hosts) are unaffected.
    let douban = DoubanClient::with_config(
        DoubanClient::default_config().with_robots_toggle(config.respect_robots),
        cache.clone(),
    )?;
    let wikipedia = WikipediaClient::with_config(
        WikipediaClient::default_config().with_robots_toggle(config.respect_robots),
        cache.clone(),
    )?;
    let tmdb = match config.tmdb_api_key.as_deref() {
        Some(key) => Some(TmdbClient::with_client_config(
            TmdbConfig::new(key),
            TmdbClient::default_client_config().with_robots_toggle(config.respect_robots),
            cache.clone(),
        )?),
        None => {
            tracing::warn!("no TMDB API key configured; resolving against Wikipedia only");
            None
        }
    };

    let mut failures = 0usize;
    for query in &queries {
        match resolve(&cancel, query, &douban, &wikipedia, tmdb.as_ref()).await {
            Ok(result) => println!("{result}"),
            Err(Error::Cancelled) => break,
            Err(e) => {
                failures += 1;
                tracing::error!(query = %query, error = %e, "lookup failed");
            }
        }
    }

    cache.close().await;

    if failures > 0 {
        anyhow::bail!("{failures} of {} lookups failed", queries.len());
    }
    Ok(())
}

/// Resolve one query: `douban:ID` fetches the subject document directly;
/// free text goes to TMDB movie search when configured, with Wikipedia
/// summary as the fallback source.
async fn resolve(
    cancel: &CancellationToken,
    query: &str,
    douban: &DoubanClient,
    wikipedia: &WikipediaClient,
    tmdb: Option<&TmdbClient>,
) -> Result<String, Error> {
    if let Some(id) = query.strip_prefix("douban:") {
        let document = douban.subject_html(cancel, id).await?;
        return Ok(serde_json::json!({
            "query": query,
            "source": "douban",
            "document": document,
        })
        .to_string());
    }

    if let Some(tmdb) = tmdb {
        let movies = tmdb.search_movie(cancel, query).await?;
        if !movies.is_empty() {
            return Ok(serde_json::json!({
                "query": query,
                "source": "tmdb",
                "results": movies,
            })
            .to_string());
        }
    }

    let summary = wikipedia.summary(cancel, query).await?;
    Ok(serde_json::json!({
        "query": query,
        "source": "wikipedia",
        "summary": summary,
    })
    .to_string())
}
