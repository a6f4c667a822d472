//! # iniconf Core
//!
//! Core types, errors, and traits shared by the iniconf crates.
//!
//! - **Types**: [`Section`] and [`SectionTable`], the parsed shape of a file
//! - **Errors**: [`ConfError`], one taxonomy for every layer
//! - **Constants**: the default section name and comment marker
//! - **Traits**: [`SectionSource`], the seam between the cache and the file
//!
//! ## Example
//!
//! ```rust
//! use iniconf_core::{ConfError, DEFAULT_SECTION_NAME};
//!
//! let err = ConfError::SectionNotFound("db".into());
//! assert!(err.is_retryable());
//! assert_eq!(DEFAULT_SECTION_NAME, "General");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{ConfError, Result};
pub use traits::*;
pub use types::*;
