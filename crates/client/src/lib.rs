//! Client code for titlescout.
//!
//! This crate provides the polite remote-fetch layer (rate limiting,
//! robots.txt compliance, anti-block classification, retry with backoff)
//! and the source adapters built on top of it.

pub mod fetch;
pub mod sources;

pub use fetch::{ClientConfig, Expected, FetchResponse, MetricsSnapshot, SourceClient};
pub use sources::{DoubanClient, TmdbClient, WikipediaClient};
