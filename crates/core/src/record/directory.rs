//! Snapshot of known internal phone numbers.

use std::collections::HashSet;

/// Immutable set of internal phone numbers.
///
/// Loaded once from the storage collaborator at initialization. Refreshing it
/// means building a new directory, never mutating this one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDirectory {
    numbers: HashSet<String>,
}

impl UserDirectory {
    /// Builds a directory, dropping blank entries and surrounding whitespace.
    pub fn from_numbers<I, S>(numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let numbers = numbers
            .into_iter()
            .filter_map(|n| {
                let trimmed = n.as_ref().trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .collect();
        Self { numbers }
    }

    pub fn contains(&self, number: &str) -> bool {
        self.numbers.contains(number.trim())
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_numbers_skips_blank() {
        let dir = UserDirectory::from_numbers(["1001", " ", "", " 1002 "]);
        assert_eq!(dir.len(), 2);
        assert!(dir.contains("1002"));
        assert!(!dir.contains(""));
    }

    #[test]
    fn test_empty_directory() {
        let dir = UserDirectory::default();
        assert!(dir.is_empty());
        assert!(!dir.contains("1001"));
    }
}
