//! Paths into nested values.
//!
//! A [`Path`] is the sequence of steps from the root of a value to the
//! location a change applies to. Paths are values: appending a segment
//! returns a new path and leaves the original untouched, so a path stored
//! in a change is never affected by later traversal.

use std::fmt;

use compact_str::CompactString;
use smallvec::SmallVec;

use crate::key::{Key, MapKey};

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Record field by name
    Field(CompactString),
    /// Sequence element by position
    Index(usize),
    /// Map entry by encoded key
    Key(Key),
}

impl Segment {
    /// Short name of the segment kind, used in errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Field(_) => "field",
            Self::Index(_) => "index",
            Self::Key(_) => "key",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Index(i) => write!(f, "[{i}]"),
            Self::Key(key) => write!(f, "[{key}]"),
        }
    }
}

/// Location of a change, from the root outward.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(SmallVec<[Segment; 4]>);

impl Path {
    /// The empty path, addressing the root value itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// New path with `segment` appended.
    #[must_use]
    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    /// New path with a field segment appended.
    #[must_use]
    pub fn field(&self, name: impl Into<CompactString>) -> Self {
        self.child(Segment::Field(name.into()))
    }

    /// New path with an index segment appended.
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        self.child(Segment::Index(index))
    }

    /// New path with an encoded map key appended.
    #[must_use]
    pub fn key<K: MapKey>(&self, key: &K) -> Self {
        self.child(Segment::Key(key.encode_key()))
    }

    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Last segment, if any.
    pub fn last(&self) -> Option<&Segment> {
        self.0.last()
    }

    /// Check whether `prefix` is a leading part of this path.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("$");
        }
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 && matches!(segment, Segment::Field(_)) {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromIterator<Segment> for Path {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<Segment>> for Path {
    fn from(segments: Vec<Segment>) -> Self {
        Self(SmallVec::from_vec(segments))
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_leaves_parent_untouched() {
        let parent = Path::root().field("Map");
        let child = parent.key(&"bar".to_string());
        assert_eq!(parent.len(), 1);
        assert_eq!(child.len(), 2);
        assert!(child.starts_with(&parent));
        assert!(!parent.starts_with(&child));
    }

    #[test]
    fn test_display() {
        assert_eq!(Path::root().to_string(), "$");
        let path = Path::root()
            .field("Map")
            .key(&"bar".to_string())
            .field("data")
            .index(2);
        assert_eq!(path.to_string(), "Map[\"bar\"].data[2]");
        assert_eq!(Path::root().index(0).to_string(), "[0]");
    }

    #[test]
    fn test_collect() {
        let path: Path = vec![Segment::Field("a".into()), Segment::Index(1)]
            .into_iter()
            .collect();
        assert_eq!(path, Path::root().field("a").index(1));
        assert_eq!(path.last(), Some(&Segment::Index(1)));
    }
}
