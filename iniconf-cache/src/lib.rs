//! Single-flight TTL cache for iniconf sections.
//!
//! Generic loading cache: misses and expired keys are filled through a
//! loader, with at most one load per key in flight at a time.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod cache;

pub use cache::{CacheConfig, CacheStats, Loader, LoadingCache};
