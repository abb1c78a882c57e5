//! Typed cache facade and background reclamation.
//!
//! [`TtlCache`] is the handle the source adapters receive. It serializes
//! values to JSON, delegates to the [`CacheDb`] entry operations, and owns
//! the single background sweep task. Expiry visibility is decided by the
//! filtered read in the store; the sweep only reclaims storage.

use super::connection::CacheDb;
use super::store::CacheStats;
use crate::Error;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

/// Expiring key/value cache backed by SQLite.
///
/// Construct once at startup and inject into every adapter; there is no
/// process-wide instance. In disabled mode (no backing database) every
/// operation is a successful no-op, so callers never special-case an
/// absent cache.
pub struct TtlCache {
    db: Option<CacheDb>,
    shutdown: watch::Sender<bool>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl TtlCache {
    /// Create a cache over `db`, spawning the background sweep task.
    ///
    /// The sweep wakes every `sweep_interval` and batch-deletes expired rows.
    /// It is the sole mechanism by which expired rows that are never read
    /// again get reclaimed. A zero interval disables the sweep.
    pub fn new(db: CacheDb, sweep_interval: Duration) -> Self {
        let (shutdown, rx) = watch::channel(false);
        let sweeper = if sweep_interval.is_zero() {
            None
        } else {
            Some(spawn_sweeper(db.clone(), sweep_interval, rx))
        };
        Self { db: Some(db), shutdown, sweeper: Mutex::new(sweeper) }
    }

    /// Create a disabled cache: every operation succeeds and does nothing.
    pub fn disabled() -> Self {
        let (shutdown, _rx) = watch::channel(false);
        Self { db: None, shutdown, sweeper: Mutex::new(None) }
    }

    /// Whether a backing store is configured.
    pub fn is_enabled(&self) -> bool {
        self.db.is_some()
    }

    /// Look up `key`, deserializing the payload.
    ///
    /// Expired rows are misses. A payload that no longer deserializes is
    /// treated as a miss and removed, so a schema change in a source type
    /// invalidates old rows instead of erroring forever.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        let Some(db) = &self.db else { return Ok(None) };
        let Some(entry) = db.get_entry(key).await? else { return Ok(None) };

        match serde_json::from_str(&entry.payload) {
            Ok(value) => {
                tracing::debug!(key, "cache hit");
                Ok(Some(value))
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding undeserializable cache entry");
                db.delete_entry(key).await?;
                Ok(None)
            }
        }
    }

    /// Store `value` under `key` with the given TTL (full overwrite).
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), Error> {
        let Some(db) = &self.db else { return Ok(()) };
        let payload = serde_json::to_string(value).map_err(|e| Error::Parse {
            field: "cache payload".into(),
            reason: e.to_string(),
        })?;
        db.upsert_entry(key, payload, ttl).await
    }

    /// Remove `key` unconditionally.
    pub async fn delete(&self, key: &str) -> Result<(), Error> {
        match &self.db {
            Some(db) => db.delete_entry(key).await,
            None => Ok(()),
        }
    }

    /// Remove every entry unconditionally.
    pub async fn clear(&self) -> Result<(), Error> {
        match &self.db {
            Some(db) => db.clear_entries().await,
            None => Ok(()),
        }
    }

    /// Batch-remove all expired entries, returning the count removed.
    pub async fn delete_expired(&self) -> Result<u64, Error> {
        match &self.db {
            Some(db) => db.delete_expired_entries().await,
            None => Ok(0),
        }
    }

    /// Aggregate statistics; zeros in disabled mode.
    pub async fn stats(&self) -> Result<CacheStats, Error> {
        match &self.db {
            Some(db) => db.entry_stats().await,
            None => Ok(CacheStats { total: 0, valid: 0, expired: 0 }),
        }
    }

    /// Stop the background sweep and wait for the task to exit.
    ///
    /// Returns only once the sweep task has fully terminated; no background
    /// work survives this call. Safe to call again (a no-op the second time).
    pub async fn close(&self) {
        let _ = self.shutdown.send(true);
        let handle = self.sweeper.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

fn spawn_sweeper(db: CacheDb, interval: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                // Also fires with Err when the cache handle is dropped
                // without an explicit close.
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    match db.delete_expired_entries().await {
                        Ok(0) => {}
                        Ok(n) => tracing::debug!(removed = n, "cache sweep reclaimed expired entries"),
                        Err(e) => tracing::warn!(error = %e, "cache sweep failed"),
                    }
                }
            }
        }
        tracing::debug!("cache sweep task stopped");
    })
}
