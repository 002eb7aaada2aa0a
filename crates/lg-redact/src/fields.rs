//! Case-insensitive field name sets.

use std::borrow::Cow;
use std::collections::HashSet;

/// Fold a field name for case-insensitive comparison.
///
/// Borrows when the name is already folded, which is the common case for
/// log field names.
pub(crate) fn fold_case(name: &str) -> Cow<'_, str> {
    if name.chars().any(char::is_uppercase) {
        Cow::Owned(name.to_lowercase())
    } else {
        Cow::Borrowed(name)
    }
}

/// A set of field names compared without regard to case.
///
/// Names are stored folded; iteration yields the folded form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    names: HashSet<String>,
}

impl FieldSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a name. Returns false if an equal name (ignoring case) was present.
    pub fn insert(&mut self, name: &str) -> bool {
        match fold_case(name) {
            Cow::Borrowed(folded) => {
                if self.names.contains(folded) {
                    false
                } else {
                    self.names.insert(folded.to_string())
                }
            }
            Cow::Owned(folded) => self.names.insert(folded),
        }
    }

    /// Check membership ignoring case.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(fold_case(name).as_ref())
    }

    /// Add every name from another set.
    pub fn extend_from(&mut self, other: &FieldSet) {
        for name in &other.names {
            if !self.names.contains(name) {
                self.names.insert(name.clone());
            }
        }
    }

    /// Iterate over the folded names.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Remove every name, keeping the allocation.
    pub fn clear(&mut self) {
        self.names.clear();
    }
}

impl<S: AsRef<str>> FromIterator<S> for FieldSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = FieldSet::new();
        for name in iter {
            set.insert(name.as_ref());
        }
        set
    }
}
