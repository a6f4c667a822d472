//! # iniconf Store
//!
//! Cached, section-oriented access to an INI configuration file.
//!
//! Sections are loaded lazily from disk on first access, shared between
//! concurrent callers, and optionally refreshed once a time-to-live passes.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use iniconf_store::{ConfigOptions, ConfigStore, DEFAULT_SECTION_NAME};
//!
//! let options = ConfigOptions::default().with_ttl(Duration::from_secs(30));
//! let store = ConfigStore::new("/etc/app.ini", options)?;
//!
//! let db = store.section("database")?;
//! let host = db.get("host").map(String::as_str).unwrap_or("localhost");
//! let general = store.section(DEFAULT_SECTION_NAME)?;
//!
//! store.close()?;
//! # Ok::<(), iniconf_store::ConfError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod options;
mod store;

pub use options::{ConfigOptions, TTL_ENV_VAR};
pub use store::ConfigStore;

// Re-export what callers need without depending on the inner crates
pub use iniconf_cache::CacheStats;
pub use iniconf_core::{ConfError, Result, Section, DEFAULT_SECTION_NAME};
