//! Well-known names and markers of the configuration file format.

/// Name of the implicit section holding pairs that appear before any
/// `[name]` header. Always present in a parsed table.
pub const DEFAULT_SECTION_NAME: &str = "General";

/// Starts a comment; everything from here to the end of the line is dropped.
/// There is no quoting, so this applies inside would-be quoted values too.
pub const COMMENT_MARKER: char = ';';

/// Separates a key from its value. Only the first occurrence on a line counts.
pub const KEY_VALUE_DELIMITER: char = '=';

/// Opens a section header.
pub const SECTION_OPEN: char = '[';

/// Closes a section header.
pub const SECTION_CLOSE: char = ']';
