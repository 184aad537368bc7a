use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A navigable sub-category of the archive
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Topic {
    pub name: String,
    pub href: String,
}

/// Main category name -> its sub-categories, as stored in `topics.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct TopicCatalog {
    pub categories: BTreeMap<String, Vec<Topic>>,
}

impl TopicCatalog {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn category_names(&self) -> Vec<&str> {
        self.categories.keys().map(String::as_str).collect()
    }

    pub fn topics(&self, category: &str) -> &[Topic] {
        self.categories.get(category).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A place the user may choose to save downloads under
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageLocation {
    pub label: String,
    pub path: PathBuf,
}
