//! # iniconf Parser
//!
//! Turns INI text into a [`SectionTable`](iniconf_core::SectionTable) and
//! loads single sections from a backing file.
//!
//! - **Parser**: pure, line-oriented text processing
//! - **Loader**: re-reads and re-parses the whole file on every call
//!
//! ## Example
//!
//! ```rust
//! use iniconf_parser::parse;
//!
//! let table = parse("x = 1\n[db]\nhost = localhost ; primary\n").unwrap();
//! assert_eq!(table.get("General").unwrap()["x"], "1");
//! assert_eq!(table.get("db").unwrap()["host"], "localhost");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod loader;
mod parser;

pub use loader::FileLoader;
pub use parser::{parse, parse_bytes};
