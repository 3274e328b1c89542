//! Label to issue-number lookups remembered for one run.

use std::collections::HashMap;

/// Issue numbers keyed by tracker label.
///
/// Owned by the caller and passed to the reconciler explicitly; it lives
/// exactly as long as the caller keeps it. Only numbers are stored, never
/// issue contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueLookupCache {
    numbers: HashMap<String, u64>,
}

impl IssueLookupCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, label: &str) -> Option<u64> {
        self.numbers.get(label).copied()
    }

    pub fn insert(&mut self, label: impl Into<String>, issue_number: u64) {
        self.numbers.insert(label.into(), issue_number);
    }

    pub fn remove(&mut self, label: &str) -> Option<u64> {
        self.numbers.remove(label)
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    pub fn clear(&mut self) {
        self.numbers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let mut cache = IssueLookupCache::new();
        assert!(cache.is_empty());
        cache.insert("task:core/1", 4);
        assert_eq!(cache.get("task:core/1"), Some(4));
        assert_eq!(cache.get("task:core/2"), None);
        assert_eq!(cache.remove("task:core/1"), Some(4));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut cache = IssueLookupCache::new();
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
