//! Source adapters built on the polite fetch layer.
//!
//! Every adapter follows the same shape: it owns one [`SourceClient`]
//! configured for its site's tolerance, shares the injected [`TtlCache`],
//! and exposes documents or typed payloads. Field-extraction heuristics
//! (infobox parsing, filename detection, script conversion) live above this
//! boundary, not here.
//!
//! [`SourceClient`]: crate::fetch::SourceClient
//! [`TtlCache`]: titlescout_core::TtlCache

pub mod douban;
pub mod tmdb;
pub mod wikipedia;

pub use douban::DoubanClient;
pub use tmdb::{TmdbClient, TmdbConfig};
pub use wikipedia::WikipediaClient;
