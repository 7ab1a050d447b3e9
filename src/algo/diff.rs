//! Structural diff.
//!
//! Computes the path-addressed changes that turn one value into another.
//! Both sides are snapshotted into [`Value`]s and walked together.
//!
//! # Emission order
//!
//! Depth-first. Record fields follow the `from` declaration order (fields
//! only present in `to` come last), map entries ascending by encoded key,
//! sequence elements by index. Trailing sequence deletions are emitted from
//! the highest index down so they can be applied one by one.
//!
//! # Sequences
//!
//! With `slice_ordering` (the default), elements are compared position by
//! position. Without it, sequences are aligned as multisets: equal elements
//! match regardless of position, unmatched `from` elements are deleted and
//! unmatched `to` elements are appended after the survivors.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::{debug, trace};

use super::multiset;
use crate::change::{Change, ChangeSet};
use crate::error::{ChangeError, DiffError, DiffResult};
use crate::key::Key;
use crate::options::Options;
use crate::path::{Path, Segment};
use crate::reflect::Diffable;
use crate::value::{Record, Shape, Value};

// =============================================================================
// Public API
// =============================================================================

/// Diff two values with default options.
///
/// # Example
///
/// ```
/// use shapediff::{diff, ChangeKind};
///
/// let from = vec!["bar".to_string(), "bar2".to_string()];
/// let to = vec!["bar_updated".to_string(), "bar2".to_string()];
/// let changes = diff(&from, &to).unwrap();
/// assert_eq!(changes.len(), 1);
/// assert_eq!(changes.as_slice()[0].kind, ChangeKind::Update);
/// assert_eq!(changes.as_slice()[0].path.to_string(), "[0]");
/// ```
pub fn diff<T: Diffable + ?Sized>(from: &T, to: &T) -> DiffResult<ChangeSet> {
    diff_with_options(from, to, &Options::default())
}

/// Diff two values with custom options.
pub fn diff_with_options<T: Diffable + ?Sized>(
    from: &T,
    to: &T,
    options: &Options,
) -> DiffResult<ChangeSet> {
    diff_values(&from.to_value(), &to.to_value(), options)
}

/// Diff two snapshots directly.
///
/// Fails when the roots have incompatible shapes or nesting exceeds
/// `options.max_depth`. Incompatible shapes below the root are reported as
/// ignored updates instead.
pub fn diff_values(from: &Value, to: &Value, options: &Options) -> DiffResult<ChangeSet> {
    let mut ctx = DiffContext::new(options);
    ctx.diff_value(&Path::root(), from, to)?;
    debug!(
        changes = ctx.changes.len(),
        compared = ctx.stats.values_compared,
        mismatches = ctx.stats.shape_mismatches,
        "diff complete"
    );
    Ok(ctx.changes.into())
}

// =============================================================================
// Internal Context
// =============================================================================

#[derive(Debug, Default, Clone, Copy)]
struct DiffStats {
    values_compared: usize,
    shape_mismatches: usize,
}

struct DiffContext<'o> {
    changes: Vec<Change>,
    stats: DiffStats,
    options: &'o Options,
}

impl<'o> DiffContext<'o> {
    fn new(options: &'o Options) -> Self {
        Self {
            changes: Vec::new(),
            stats: DiffStats::default(),
            options,
        }
    }

    fn emit(&mut self, change: Change) {
        trace!(kind = %change.kind, path = %change.path, "change");
        self.changes.push(change);
    }

    fn enter(&mut self, path: &Path) -> DiffResult<()> {
        if path.len() > self.options.max_depth {
            return Err(DiffError::DepthExceeded {
                limit: self.options.max_depth,
                path: path.clone(),
            });
        }
        self.stats.values_compared += 1;
        Ok(())
    }

    fn diff_value(&mut self, path: &Path, from: &Value, to: &Value) -> DiffResult<()> {
        self.enter(path)?;

        match (from, to) {
            (Value::Null, Value::Null) => {}
            (Value::Null, to) => self.emit(Change::create(path.clone(), to.clone())),
            (from, Value::Null) => self.emit(Change::delete(path.clone(), from.clone())),
            (Value::Record(a), Value::Record(b)) => self.diff_records(path, a, b)?,
            (Value::Map(a), Value::Map(b)) => self.diff_maps(path, a, b)?,
            (Value::Seq(a), Value::Seq(b)) if self.options.slice_ordering => {
                self.diff_ordered(path, a, b)?
            }
            (Value::Seq(a), Value::Seq(b)) => self.diff_unordered(path, a, b),
            (a, b) if a.shape() == Shape::Primitive && b.shape() == Shape::Primitive => {
                if !a.same(b) {
                    self.emit(Change::update(path.clone(), a.clone(), b.clone()));
                }
            }
            (a, b) => {
                if path.is_root() {
                    return Err(DiffError::ShapeMismatch {
                        path: path.clone(),
                        from: a.kind(),
                        to: b.kind(),
                    });
                }
                debug!(path = %path, from = a.kind(), to = b.kind(), "shape mismatch");
                self.stats.shape_mismatches += 1;
                self.emit(
                    Change::update(path.clone(), a.clone(), b.clone())
                        .with_error(ChangeError::shape(a.kind(), b.kind())),
                );
            }
        }
        Ok(())
    }

    /// Diff a sequence element or map entry present on both sides.
    ///
    /// The position survives, so a nil transition is an UPDATE in place
    /// rather than a removal or insertion of the element.
    fn diff_element(&mut self, path: &Path, from: &Value, to: &Value) -> DiffResult<()> {
        if from.is_null() == to.is_null() {
            return self.diff_value(path, from, to);
        }
        self.enter(path)?;
        self.emit(Change::update(path.clone(), from.clone(), to.clone()));
        Ok(())
    }

    fn diff_records(&mut self, path: &Path, from: &Record, to: &Record) -> DiffResult<()> {
        for (name, a) in from.iter() {
            let child = path.field(name);
            match to.get(name) {
                Some(b) => self.diff_value(&child, a, b)?,
                None => self.emit(Change::delete(child, a.clone())),
            }
        }
        for (name, b) in to.iter() {
            if !from.contains(name) {
                self.emit(Change::create(path.field(name), b.clone()));
            }
        }
        Ok(())
    }

    /// Merge-walk both key sets in ascending order.
    fn diff_maps(
        &mut self,
        path: &Path,
        from: &BTreeMap<Key, Value>,
        to: &BTreeMap<Key, Value>,
    ) -> DiffResult<()> {
        let mut left = from.iter().peekable();
        let mut right = to.iter().peekable();

        loop {
            let order = match (left.peek(), right.peek()) {
                (None, None) => break,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some((ka, _)), Some((kb, _))) => ka.cmp(kb),
            };
            match order {
                Ordering::Less => {
                    if let Some((key, a)) = left.next() {
                        let child = path.child(Segment::Key(key.clone()));
                        self.emit(Change::delete(child, a.clone()));
                    }
                }
                Ordering::Greater => {
                    if let Some((key, b)) = right.next() {
                        let child = path.child(Segment::Key(key.clone()));
                        self.emit(Change::create(child, b.clone()));
                    }
                }
                Ordering::Equal => {
                    if let (Some((key, a)), Some((_, b))) = (left.next(), right.next()) {
                        let child = path.child(Segment::Key(key.clone()));
                        self.diff_element(&child, a, b)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn diff_ordered(&mut self, path: &Path, from: &[Value], to: &[Value]) -> DiffResult<()> {
        let common = from.len().min(to.len());

        for (i, (a, b)) in from.iter().zip(to).enumerate() {
            self.diff_element(&path.index(i), a, b)?;
        }
        for (i, b) in to.iter().enumerate().skip(common) {
            self.emit(Change::create(path.index(i), b.clone()));
        }
        // Highest index first so each removal leaves lower indices valid
        for i in (common..from.len()).rev() {
            self.emit(Change::delete(path.index(i), from[i].clone()));
        }
        Ok(())
    }

    fn diff_unordered(&mut self, path: &Path, from: &[Value], to: &[Value]) {
        let alignment = multiset::align(from, to);
        trace!(
            path = %path,
            matched = alignment.matched.len(),
            removed = alignment.removed.len(),
            added = alignment.added.len(),
            "multiset alignment"
        );
        if alignment.is_identity() {
            return;
        }

        for &i in alignment.removed.iter().rev() {
            self.emit(Change::delete(path.index(i), from[i].clone()));
        }
        let survivors = from.len() - alignment.removed.len();
        for (k, &j) in alignment.added.iter().enumerate() {
            self.emit(Change::create(path.index(survivors + k), to[j].clone()));
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
