//! TTL entry CRUD operations.
//!
//! All rows live in a single `entries` table keyed by an externally supplied
//! stable identifier (a source-native id or a query hash). Writes are full
//! upserts; reads filter expiry so an expired-but-not-yet-swept row is
//! reported as a miss and removed inline.

use super::connection::CacheDb;
use crate::Error;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A cached entry row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    /// Serialized JSON payload.
    pub payload: String,
    pub created_at: String,
    pub expires_at: String,
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: u64,
    pub valid: u64,
    pub expired: u64,
}

/// Floor for caller-supplied TTLs; keeps `expires_at` strictly after
/// `created_at`.
const MIN_TTL: Duration = Duration::from_secs(1);

/// Fixed-width RFC 3339 UTC timestamp so lexicographic order in SQL matches
/// chronological order.
pub(crate) fn now_str() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn expiry_str(ttl: Duration) -> String {
    (Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36500)))
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl CacheDb {
    /// Insert or fully overwrite the entry for `key`.
    ///
    /// Uses UPSERT semantics: every column of an existing row is replaced,
    /// never merged. A zero `ttl` is clamped to one second so the written
    /// row always has `expires_at > created_at`.
    pub async fn upsert_entry(&self, key: &str, payload: String, ttl: Duration) -> Result<(), Error> {
        let ttl = ttl.max(MIN_TTL);
        let key = key.to_string();
        let created_at = now_str();
        let expires_at = expiry_str(ttl);
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (key, payload, created_at, expires_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(key) DO UPDATE SET
                        payload = excluded.payload,
                        created_at = excluded.created_at,
                        expires_at = excluded.expires_at",
                    params![key, payload, created_at, expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the live entry for `key`.
    ///
    /// A row past its expiry is a miss even if still physically present; the
    /// read deletes it inline rather than leaving it for the sweep.
    pub async fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        let key = key.to_string();
        let now = now_str();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let result = conn.query_row(
                    "SELECT key, payload, created_at, expires_at FROM entries WHERE key = ?1",
                    params![key],
                    |row| {
                        Ok(CacheEntry {
                            key: row.get(0)?,
                            payload: row.get(1)?,
                            created_at: row.get(2)?,
                            expires_at: row.get(3)?,
                        })
                    },
                );

                match result {
                    Ok(entry) if entry.expires_at <= now => {
                        conn.execute("DELETE FROM entries WHERE key = ?1", params![entry.key])?;
                        Ok(None)
                    }
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the entry for `key`, expired or not.
    pub async fn delete_entry(&self, key: &str) -> Result<(), Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM entries WHERE key = ?1", params![key])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Remove every entry.
    pub async fn clear_entries(&self) -> Result<(), Error> {
        self.conn
            .call(|conn| -> Result<(), Error> {
                conn.execute("DELETE FROM entries", [])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Batch-remove all entries past expiry.
    ///
    /// Returns the number of deleted rows.
    pub async fn delete_expired_entries(&self) -> Result<u64, Error> {
        let now = now_str();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM entries WHERE expires_at <= ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Count total, valid, and expired entries.
    pub async fn entry_stats(&self) -> Result<CacheStats, Error> {
        let now = now_str();
        self.conn
            .call(move |conn| -> Result<CacheStats, Error> {
                let total: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
                let expired: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM entries WHERE expires_at <= ?1",
                    params![now],
                    |row| row.get(0),
                )?;
                Ok(CacheStats {
                    total: total as u64,
                    valid: (total - expired) as u64,
                    expired: expired as u64,
                })
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Insert a row whose expiry is already in the past, bypassing the TTL
    /// arithmetic in `upsert_entry`.
    async fn insert_expired(db: &CacheDb, key: &str) {
        let key = key.to_string();
        let past = (Utc::now() - chrono::Duration::hours(1)).to_rfc3339_opts(SecondsFormat::Micros, true);
        let created = (Utc::now() - chrono::Duration::hours(2)).to_rfc3339_opts(SecondsFormat::Micros, true);
        db.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (key, payload, created_at, expires_at) VALUES (?1, '\"stale\"', ?2, ?3)",
                    params![key, created, past],
                )?;
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.upsert_entry("douban:subject:1291546", "\"html\"".into(), Duration::from_secs(60))
            .await
            .unwrap();

        let entry = db.get_entry("douban:subject:1291546").await.unwrap().unwrap();
        assert_eq!(entry.payload, "\"html\"");
        assert!(entry.expires_at > entry.created_at);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_clamped() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.upsert_entry("k", "\"v\"".into(), Duration::ZERO).await.unwrap();

        let entry = db.get_entry("k").await.unwrap().unwrap();
        assert!(entry.expires_at > entry.created_at);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.get_entry("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_row_is_miss_and_deleted() {
        let db = CacheDb::open_in_memory().await.unwrap();
        insert_expired(&db, "stale-key").await;

        assert!(db.get_entry("stale-key").await.unwrap().is_none());

        // The read removed the row, not just filtered it.
        let stats = db.entry_stats().await.unwrap();
        assert_eq!(stats.total, 0);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_fully() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.upsert_entry("k", "\"v1\"".into(), Duration::from_secs(60)).await.unwrap();
        db.upsert_entry("k", "\"v2\"".into(), Duration::from_secs(120)).await.unwrap();

        let entry = db.get_entry("k").await.unwrap().unwrap();
        assert_eq!(entry.payload, "\"v2\"");

        let stats = db.entry_stats().await.unwrap();
        assert_eq!(stats.total, 1);
    }

    #[tokio::test]
    async fn test_delete_expired_leaves_live_rows() {
        let db = CacheDb::open_in_memory().await.unwrap();
        insert_expired(&db, "old-1").await;
        insert_expired(&db, "old-2").await;
        db.upsert_entry("fresh", "\"v\"".into(), Duration::from_secs(3600)).await.unwrap();

        let removed = db.delete_expired_entries().await.unwrap();
        assert_eq!(removed, 2);

        assert!(db.get_entry("fresh").await.unwrap().is_some());
        let stats = db.entry_stats().await.unwrap();
        assert_eq!(stats, CacheStats { total: 1, valid: 1, expired: 0 });
    }

    #[tokio::test]
    async fn test_stats_counts_expired() {
        let db = CacheDb::open_in_memory().await.unwrap();
        insert_expired(&db, "old").await;
        db.upsert_entry("fresh", "\"v\"".into(), Duration::from_secs(3600)).await.unwrap();

        let stats = db.entry_stats().await.unwrap();
        assert_eq!(stats, CacheStats { total: 2, valid: 1, expired: 1 });
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.upsert_entry("a", "\"1\"".into(), Duration::from_secs(60)).await.unwrap();
        db.upsert_entry("b", "\"2\"".into(), Duration::from_secs(60)).await.unwrap();

        db.delete_entry("a").await.unwrap();
        assert!(db.get_entry("a").await.unwrap().is_none());
        assert!(db.get_entry("b").await.unwrap().is_some());

        db.clear_entries().await.unwrap();
        assert_eq!(db.entry_stats().await.unwrap().total, 0);
    }
}
