//! File-backed section loader.
//!
//! Every call re-reads and re-parses the whole backing file, so a fixed file
//! is picked up on the next call without any invalidation.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use iniconf_core::error::{ConfError, Result};
use iniconf_core::traits::SectionSource;
use iniconf_core::types::{Section, SectionTable};

use crate::parser::parse_bytes;

/// Loads sections from an INI file on disk.
#[derive(Clone, Debug)]
pub struct FileLoader {
    /// Path to the backing file
    path: PathBuf,
}

impl FileLoader {
    /// Creates a loader for the given path. The file is not touched until
    /// the first load.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_and_parse(&self) -> Result<SectionTable> {
        let bytes = std::fs::read(&self.path).map_err(|e| {
            warn!(path = ?self.path, error = %e, "Failed to read config file");
            ConfError::io(&self.path, e)
        })?;

        let table = parse_bytes(&bytes).map_err(|e| {
            warn!(path = ?self.path, error = %e, "Failed to parse config file");
            e
        })?;

        debug!(path = ?self.path, sections = table.len(), "Config file parsed");
        Ok(table)
    }
}

impl SectionSource for FileLoader {
    #[instrument(skip(self), fields(path = ?self.path))]
    fn load_section(&self, name: &str) -> Result<Section> {
        let mut table = self.read_and_parse()?;
        table
            .take(name)
            .ok_or_else(|| ConfError::SectionNotFound(name.to_string()))
    }

    #[instrument(skip(self), fields(path = ?self.path))]
    fn load_table(&self) -> Result<SectionTable> {
        self.read_and_parse()
    }
}
