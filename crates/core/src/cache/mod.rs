//! SQLite-backed TTL cache for source lookups.
//!
//! This module provides a persistent expiring key/value store using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Upsert writes (one live row per key)
//! - Expiry-filtered reads (an expired row is a miss, and is deleted inline)
//! - A background sweep task that reclaims expired rows
//! - Automatic schema migrations and WAL mode for concurrent access
//! - A disabled mode where every operation is a successful no-op

pub mod connection;
pub mod key;
pub mod migrations;
pub mod store;
pub mod sweep;

pub use crate::Error;

pub use connection::CacheDb;
pub use key::query_key;
pub use store::{CacheEntry, CacheStats};
pub use sweep::TtlCache;
