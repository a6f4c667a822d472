//! Parsed configuration shapes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_SECTION_NAME;

/// Key-value pairs of one section. Keys are unique; order is not kept.
pub type Section = HashMap<String, String>;

/// Every section of one parsed file, keyed by case-sensitive name.
///
/// Built fresh on every parse. The default section is always present.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionTable {
    sections: HashMap<String, Section>,
}

impl SectionTable {
    /// Creates a table holding only the (empty) default section.
    pub fn new() -> Self {
        let mut sections = HashMap::new();
        sections.insert(DEFAULT_SECTION_NAME.to_string(), Section::new());
        Self { sections }
    }

    /// Returns the named section, if present.
    pub fn get(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    /// Removes and returns the named section, leaving the rest of the table.
    pub fn take(&mut self, name: &str) -> Option<Section> {
        self.sections.remove(name)
    }

    /// Returns true if a section with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    /// Returns the section for `name`, creating an empty one if needed.
    pub fn section_mut(&mut self, name: &str) -> &mut Section {
        self.sections.entry(name.to_string()).or_default()
    }

    /// Section names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sections.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of sections, including the default one.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Returns true if there are no sections. A parsed table always has the
    /// default one.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl Default for SectionTable {
    fn default() -> Self {
        Self::new()
    }
}
