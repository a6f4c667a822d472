//! Error types for iniconf.
//!
//! One `thiserror` enum covers construction, loading, parsing and lifecycle
//! failures. The enum is `Clone` because a single load outcome is handed to
//! every caller that waited on it.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Result type alias using `ConfError`.
pub type Result<T> = std::result::Result<T, ConfError>;

/// Main error type for all iniconf operations.
#[derive(Debug, Clone, Error)]
pub enum ConfError {
    // ═══════════════════════════════════════════════════════════════════════════
    // CONSTRUCTION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Options rejected at construction time.
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // LOAD ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The backing file could not be opened or read.
    #[error("I/O error reading {path:?}: {source}")]
    Io {
        /// Backing file path
        path: PathBuf,
        /// Underlying error, shared between waiters of one load
        #[source]
        source: Arc<std::io::Error>,
    },

    /// A line is neither blank, a comment, a header, nor a key-value pair.
    #[error("Invalid config line {line}: [{content}]")]
    Parse {
        /// 1-based line number
        line: usize,
        /// Offending line with the comment stripped and whitespace trimmed
        content: String,
    },

    /// The requested section is absent from the parsed file.
    #[error("No such section: {0:?}")]
    SectionNotFound(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // LIFECYCLE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Operation attempted after `close()`.
    #[error("Config store is closed")]
    Closed,

    /// A loader panicked while other callers were waiting on it.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConfError {
    /// Wraps an I/O error raised while reading `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfError::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Returns true if a later call may succeed without reconstructing the store.
    ///
    /// Failed loads are never cached, so fixing the file is enough.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConfError::Io { .. }
                | ConfError::Parse { .. }
                | ConfError::SectionNotFound(_)
                | ConfError::Internal(_)
        )
    }

    /// Returns true if the store has been closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, ConfError::Closed)
    }
}
