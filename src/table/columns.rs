//! Ordered, append-only column registry.

use std::collections::HashSet;

/// Output columns in first-seen order. Grows, never shrinks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSet {
    names: Vec<String>,
    seen: HashSet<String>,
}

impl ColumnSet {
    /// Create a set from an initial ordered list; duplicates are dropped.
    pub fn new<I, S>(initial: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        for name in initial {
            set.insert(name);
        }
        set
    }

    /// Append a column if unseen. Returns true if it was new.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.seen.contains(&name) {
            return false;
        }
        self.seen.insert(name.clone());
        self.names.push(name);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.seen.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.names
    }

    /// True if every column of `self` is in `other` at the same position.
    pub fn is_prefix_of(&self, other: &ColumnSet) -> bool {
        other.names.starts_with(&self.names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_first_seen_order() {
        let mut columns = ColumnSet::new(["id"]);
        assert!(columns.insert("x"));
        assert!(columns.insert("y"));
        assert!(!columns.insert("x"));
        assert!(!columns.insert("id"));
        assert_eq!(columns.as_slice(), ["id", "x", "y"]);
    }

    #[test]
    fn test_new_drops_duplicates() {
        let columns = ColumnSet::new(["id", "a", "id", "b", "a"]);
        assert_eq!(columns.iter().collect::<Vec<_>>(), vec!["id", "a", "b"]);
        assert!(columns.contains("b"));
        assert!(!columns.contains("c"));
    }

    #[test]
    fn test_prefix() {
        let before = ColumnSet::new(["id", "x"]);
        let mut after = before.clone();
        after.insert("y");
        assert!(before.is_prefix_of(&after));
        assert!(!after.is_prefix_of(&before));
    }
}
