//! Dataset column sets

use std::collections::{BTreeSet, HashSet};

/// Column names valid for the dataset a query will run against
///
/// Owned by the caller; the validator only tests membership.
pub trait ColumnSet {
    fn contains_column(&self, name: &str) -> bool;
}

impl<C: ColumnSet + ?Sized> ColumnSet for &C {
    fn contains_column(&self, name: &str) -> bool {
        (**self).contains_column(name)
    }
}

impl ColumnSet for [String] {
    fn contains_column(&self, name: &str) -> bool {
        self.iter().any(|c| c == name)
    }
}

impl ColumnSet for [&str] {
    fn contains_column(&self, name: &str) -> bool {
        self.iter().any(|c| *c == name)
    }
}

impl<const N: usize> ColumnSet for [&str; N] {
    fn contains_column(&self, name: &str) -> bool {
        self.as_slice().contains_column(name)
    }
}

impl ColumnSet for Vec<String> {
    fn contains_column(&self, name: &str) -> bool {
        self.as_slice().contains_column(name)
    }
}

impl ColumnSet for Vec<&str> {
    fn contains_column(&self, name: &str) -> bool {
        self.as_slice().contains_column(name)
    }
}

impl ColumnSet for HashSet<String> {
    fn contains_column(&self, name: &str) -> bool {
        self.contains(name)
    }
}

impl ColumnSet for BTreeSet<String> {
    fn contains_column(&self, name: &str) -> bool {
        self.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_across_representations() {
        let owned = vec!["duration_ms".to_string(), "name".to_string()];
        let hashed: HashSet<String> = owned.iter().cloned().collect();
        let sorted: BTreeSet<String> = owned.iter().cloned().collect();

        assert!(owned.contains_column("name"));
        assert!(hashed.contains_column("duration_ms"));
        assert!(sorted.contains_column("name"));
        assert!(["duration_ms"].contains_column("duration_ms"));
        assert!(!owned.contains_column("Name"));
        assert!(!Vec::<&str>::new().contains_column(""));
    }
}
