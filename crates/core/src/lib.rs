//! Core types and shared functionality for titlescout.
//!
//! This crate provides:
//! - TTL cache with SQLite backend and background reclamation
//! - Unified error types
//! - Layered application configuration

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheStats, TtlCache};
pub use config::AppConfig;
pub use error::Error;
