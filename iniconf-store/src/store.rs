//! Config facade wiring the loading cache to the file loader.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument};

use iniconf_cache::{CacheConfig, CacheStats, LoadingCache};
use iniconf_core::error::{ConfError, Result};
use iniconf_core::traits::SectionSource;
use iniconf_core::types::{Section, SectionTable};
use iniconf_parser::FileLoader;

use crate::options::ConfigOptions;

/// Expected number of distinct sections in one file.
const INITIAL_SECTION_CAPACITY: usize = 16;

/// Cached access to the sections of one INI file.
///
/// Each store owns its cache. Sections are read from disk on first access
/// and, with a TTL, again once they go stale. Share it between threads with
/// an `Arc`.
pub struct ConfigStore {
    path: PathBuf,
    ttl: Option<Duration>,
    loader: FileLoader,
    cache: LoadingCache<Arc<Section>>,
}

impl ConfigStore {
    /// Creates a store for `path`. The file is not read until the first
    /// section is requested.
    ///
    /// # Errors
    ///
    /// `ConfError::InvalidConfig` if the options fail validation.
    pub fn new(path: impl AsRef<Path>, options: ConfigOptions) -> Result<Self> {
        options.validate()?;

        let path = path.as_ref().to_path_buf();
        let loader = FileLoader::new(&path);
        let cache_loader = loader.clone();
        let cache = LoadingCache::with_config(
            CacheConfig {
                ttl: options.ttl,
                initial_capacity: INITIAL_SECTION_CAPACITY,
            },
            move |name: &str| cache_loader.load_section(name).map(Arc::new),
        );

        info!(path = ?path, ttl = ?options.ttl, "Config store created");

        Ok(Self {
            path,
            ttl: options.ttl,
            loader,
            cache,
        })
    }

    /// Creates a store with default options (sections never expire).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(path, ConfigOptions::default())
    }

    /// Returns the key-value pairs of a section.
    ///
    /// Use [`DEFAULT_SECTION_NAME`](iniconf_core::DEFAULT_SECTION_NAME) for
    /// pairs that appear before any header.
    ///
    /// # Errors
    ///
    /// `Closed` after [`close`](Self::close); otherwise whatever the load
    /// produced: `Io`, `Parse`, or `SectionNotFound`. Errors are never
    /// cached.
    pub fn section(&self, name: &str) -> Result<Arc<Section>> {
        self.cache.get(name)
    }

    /// Returns one value from a section, or `None` if the key is absent.
    pub fn get(&self, section: &str, key: &str) -> Result<Option<String>> {
        Ok(self.section(section)?.get(key).cloned())
    }

    /// Reads and parses the whole file, bypassing the cache.
    #[instrument(skip(self), fields(path = ?self.path))]
    pub fn table(&self) -> Result<SectionTable> {
        if self.cache.is_closed() {
            return Err(ConfError::Closed);
        }
        self.loader.load_table()
    }

    /// Forces the next access to `name` to reload from disk.
    pub fn invalidate(&self, name: &str) -> bool {
        let dropped = self.cache.invalidate(name);
        debug!(section = name, dropped, "Section invalidated");
        dropped
    }

    /// Forces every section to reload on next access.
    pub fn invalidate_all(&self) {
        self.cache.clear();
        debug!("All sections invalidated");
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the configured time-to-live.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Returns true once the store has been closed.
    pub fn is_closed(&self) -> bool {
        self.cache.is_closed()
    }

    /// Releases every cached section. Later calls fail with `Closed`.
    pub fn close(&self) -> Result<()> {
        info!(path = ?self.path, "Closing config store");
        self.cache.close()
    }
}

impl Drop for ConfigStore {
    fn drop(&mut self) {
        let _ = self.cache.close();
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("path", &self.path)
            .field("ttl", &self.ttl)
            .field("closed", &self.cache.is_closed())
            .finish()
    }
}
