//! Change model.
//!
//! A [`Change`] is one path-addressed edit; a [`ChangeSet`] is the ordered
//! result of a diff. Both are plain data: they can be inspected, filtered,
//! persisted and applied later to any value of the same shape.

use std::fmt;

use crate::error::ChangeError;
use crate::path::Path;
use crate::value::Value;

/// Kind of edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A location that did not exist (or was nil) now holds a value
    Create,
    /// A value changed in place
    Update,
    /// A location was removed
    Delete,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One edit at one path.
///
/// `Create` carries no `from`, `Delete` carries no `to`. A change with an
/// `error` is ignored by the patcher.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub kind: ChangeKind,
    pub path: Path,
    pub from: Option<Value>,
    pub to: Option<Value>,
    pub error: Option<ChangeError>,
}

impl Change {
    pub fn create(path: Path, to: Value) -> Self {
        Self {
            kind: ChangeKind::Create,
            path,
            from: None,
            to: Some(to),
            error: None,
        }
    }

    pub fn update(path: Path, from: Value, to: Value) -> Self {
        Self {
            kind: ChangeKind::Update,
            path,
            from: Some(from),
            to: Some(to),
            error: None,
        }
    }

    pub fn delete(path: Path, from: Value) -> Self {
        Self {
            kind: ChangeKind::Delete,
            path,
            from: Some(from),
            to: None,
            error: None,
        }
    }

    /// Attach an error, marking the change as ignored.
    #[must_use]
    pub fn with_error(mut self, error: ChangeError) -> Self {
        self.error = Some(error);
        self
    }

    /// Check whether the change is flagged and will not be applied.
    #[inline]
    pub fn is_ignored(&self) -> bool {
        self.error.is_some()
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path)?;
        if let Some(error) = &self.error {
            write!(f, " (ignored: {error})")?;
        }
        Ok(())
    }
}

/// Ordered list of changes produced by one diff.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.changes.iter()
    }

    pub fn as_slice(&self) -> &[Change] {
        &self.changes
    }

    pub fn creates(&self) -> usize {
        self.count(ChangeKind::Create)
    }

    pub fn updates(&self) -> usize {
        self.count(ChangeKind::Update)
    }

    pub fn deletes(&self) -> usize {
        self.count(ChangeKind::Delete)
    }

    fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }

    /// Changes at or below `prefix`, in their original order.
    pub fn filter(&self, prefix: &Path) -> ChangeSet {
        self.changes
            .iter()
            .filter(|c| c.path.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Changes flagged with an error.
    pub fn ignored(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(|c| c.is_ignored())
    }
}

impl FromIterator<Change> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = Change>>(iter: I) -> Self {
        Self {
            changes: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<Change>> for ChangeSet {
    fn from(changes: Vec<Change>) -> Self {
        Self { changes }
    }
}

impl IntoIterator for ChangeSet {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ChangeSet {
        vec![
            Change::update(Path::root().field("a"), Value::from(1i64), Value::from(2i64)),
            Change::create(Path::root().field("b").index(0), Value::from("x")),
            Change::delete(Path::root().field("b").index(3), Value::from("y")),
            Change::update(Path::root().field("c"), Value::from(1i64), Value::from("z"))
                .with_error(ChangeError::shape("int", "string")),
        ]
        .into()
    }

    #[test]
    fn test_counts() {
        let set = sample();
        assert_eq!(set.len(), 4);
        assert_eq!(set.creates(), 1);
        assert_eq!(set.updates(), 2);
        assert_eq!(set.deletes(), 1);
        assert_eq!(set.ignored().count(), 1);
    }

    #[test]
    fn test_filter_by_prefix() {
        let set = sample();
        let under_b = set.filter(&Path::root().field("b"));
        assert_eq!(under_b.len(), 2);
        let prefix = Path::root().field("b");
        assert!(under_b.iter().all(|c| c.path.starts_with(&prefix)));
        assert_eq!(set.filter(&Path::root()).len(), 4);
    }

    #[test]
    fn test_display() {
        let set = sample();
        assert_eq!(set.as_slice()[1].to_string(), "create b[0]");
        assert_eq!(
            set.as_slice()[3].to_string(),
            "update c (ignored: shape mismatch: expected int, found string)"
        );
    }
}
