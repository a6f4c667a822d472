//! Common traits for iniconf.
//!
//! These traits define the seams between the cache and whatever produces
//! section data, so the cache can be driven by a file or by a test double.

use crate::error::Result;
use crate::types::{Section, SectionTable};

// ═══════════════════════════════════════════════════════════════════════════════
// SECTION SOURCE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Produces fresh section data on demand.
///
/// Implementations re-read their backing data on every call; caching is the
/// caller's job.
pub trait SectionSource: Send + Sync {
    /// Loads one section by name.
    ///
    /// Fails with `SectionNotFound` if the name is absent, or with the
    /// underlying read/parse error.
    fn load_section(&self, name: &str) -> Result<Section>;

    /// Loads every section.
    fn load_table(&self) -> Result<SectionTable>;
}
