//! TagSet - run-scoped string labels attached to every emitted point/record

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ordered, duplicate-free mapping of tag key to string value.
///
/// Built once per run; later inserts for an existing key overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet {
    entries: BTreeMap<String, String>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_order_is_stable() {
        let mut tags = TagSet::new();
        tags.insert("facility", "lab");
        tags.insert("appname", "tap");
        let keys: Vec<_> = tags.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["appname", "facility"]);
    }

    #[test]
    fn test_insert_overwrites_duplicates() {
        let mut tags = TagSet::new();
        tags.insert("host", "a");
        tags.insert("host", "b");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("host"), Some("b"));
    }
}
