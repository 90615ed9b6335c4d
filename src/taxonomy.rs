//! Tag taxonomy registry
//!
//! The taxonomy is a fixed, expert-authored list of tags supplied at
//! construction time. Tag names are NOT unique on their own: the same name
//! may appear under several groups ("Rules" under both "Kids phones" and
//! "Kids driving"), so group resolution takes the first occurrence in
//! taxonomy order.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Sentinel group for tags the model invents that the taxonomy doesn't know
pub const NO_TAG_GROUP: &str = "No Tag Group";

/// A single expert-defined tag: name, owning group, optional usage notes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub name: String,
    pub group: String,
    /// Free-form guidance on when to apply the tag; empty when the experts
    /// left none
    pub instructions: String,
}

impl TagRecord {
    pub fn new(
        name: impl Into<String>,
        group: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            instructions: instructions.into(),
        }
    }
}

/// Read-only registry over the tag list
///
/// Group lookups are case-insensitive and O(1): the name -> group map is
/// built once here instead of re-scanning the tag list per result row.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    tags: Vec<TagRecord>,
    group_by_name: HashMap<String, String>,
}

impl Taxonomy {
    pub fn new(tags: Vec<TagRecord>) -> Self {
        let mut group_by_name = HashMap::with_capacity(tags.len());
        for tag in &tags {
            // First occurrence wins for duplicate names across groups
            group_by_name
                .entry(tag.name.to_lowercase())
                .or_insert_with(|| tag.group.clone());
        }

        Self { tags, group_by_name }
    }

    /// All tag names, lower-cased and deduplicated, in taxonomy order
    pub fn vocabulary(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for tag in &self.tags {
            let lower = tag.name.to_lowercase();
            if seen.insert(lower.clone()) {
                names.push(lower);
            }
        }
        names
    }

    /// The subset of tags carrying non-empty usage instructions
    pub fn instructed(&self) -> impl Iterator<Item = &TagRecord> {
        self.tags.iter().filter(|tag| !tag.instructions.is_empty())
    }

    /// Resolve a tag name to its group, ignoring case
    pub fn group_for(&self, name: &str) -> Option<&str> {
        self.group_by_name
            .get(&name.to_lowercase())
            .map(String::as_str)
    }

    /// Resolve a tag name to its group, falling back to [`NO_TAG_GROUP`]
    pub fn group_or_default(&self, name: &str) -> &str {
        self.group_for(name).unwrap_or(NO_TAG_GROUP)
    }

    /// Number of tag records (duplicates included)
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
