//! Line-oriented INI parser.
//!
//! # Format
//!
//! ```text
//! top = level          ; lands in the default section
//! [database]
//! host = localhost     ; trailing comment
//! url = a=b            ; split at the first '=' only
//! ```
//!
//! Everything from the first `;` on a line is dropped, even inside quotes.
//! A malformed line anywhere fails the whole parse.

use iniconf_core::constants::{
    COMMENT_MARKER, DEFAULT_SECTION_NAME, KEY_VALUE_DELIMITER, SECTION_CLOSE, SECTION_OPEN,
};
use iniconf_core::error::{ConfError, Result};
use iniconf_core::types::SectionTable;

/// Classification of one line after comment stripping and trimming.
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Blank,
    Header(&'a str),
    Pair(&'a str, &'a str),
    Invalid(&'a str),
}

fn strip_comment(raw: &str) -> &str {
    match raw.find(COMMENT_MARKER) {
        Some(idx) => &raw[..idx],
        None => raw,
    }
}

fn classify(raw: &str) -> Line<'_> {
    let line = strip_comment(raw).trim();
    if line.is_empty() {
        return Line::Blank;
    }

    if let Some(inner) = line
        .strip_prefix(SECTION_OPEN)
        .and_then(|rest| rest.strip_suffix(SECTION_CLOSE))
    {
        if !inner.is_empty() && !inner.contains(SECTION_CLOSE) {
            return Line::Header(inner);
        }
    }

    if let Some((key, value)) = line.split_once(KEY_VALUE_DELIMITER) {
        let (key, value) = (key.trim(), value.trim());
        if !key.is_empty() && !value.is_empty() {
            return Line::Pair(key, value);
        }
    }

    Line::Invalid(line)
}

/// Parses INI text into a section table.
///
/// Pairs before the first header go to [`DEFAULT_SECTION_NAME`], which is
/// always present in the result. A repeated key within one section keeps the
/// last value. A section only exists once it has a pair, so a header
/// with no pairs does not appear in the result.
///
/// # Errors
///
/// `ConfError::Parse` for the first line that is neither blank, a comment,
/// a `[name]` header, nor a `key = value` pair with non-empty key and value.
pub fn parse(text: &str) -> Result<SectionTable> {
    let mut table = SectionTable::new();
    let mut current = DEFAULT_SECTION_NAME.to_string();

    for (idx, raw) in text.lines().enumerate() {
        match classify(raw) {
            Line::Blank => {}
            Line::Header(name) => current = name.to_string(),
            Line::Pair(key, value) => {
                table
                    .section_mut(&current)
                    .insert(key.to_string(), value.to_string());
            }
            Line::Invalid(content) => {
                return Err(ConfError::Parse {
                    line: idx + 1,
                    content: content.to_string(),
                });
            }
        }
    }

    Ok(table)
}

/// Parses raw file bytes.
///
/// Invalid UTF-8 is reported as `ConfError::Parse` on the line holding the
/// first bad byte.
pub fn parse_bytes(bytes: &[u8]) -> Result<SectionTable> {
    match std::str::from_utf8(bytes) {
        Ok(text) => parse(text),
        Err(e) => {
            let valid = e.valid_up_to();
            let line_start = bytes[..valid]
                .iter()
                .rposition(|&b| b == b'\n')
                .map_or(0, |pos| pos + 1);
            let line_end = bytes[valid..]
                .iter()
                .position(|&b| b == b'\n')
                .map_or(bytes.len(), |pos| valid + pos);
            let line = bytes[..valid].iter().filter(|&&b| b == b'\n').count() + 1;

            Err(ConfError::Parse {
                line,
                content: String::from_utf8_lossy(&bytes[line_start..line_end])
                    .trim()
                    .to_string(),
            })
        }
    }
}
