//! Change application.
//!
//! Each change is applied independently by walking the live target along
//! the change path through [`Diffable::patch_at`]. A failing change is
//! recorded in the [`PatchLog`] and never stops the others.
//!
//! # Architecture
//!
//! ```text
//! patch(changes, target)
//!       |
//!       v
//! Step { change, options, pos }      // cursor into the change path
//!       |  target.patch_at(step)
//!       v
//! container routes segment[pos] -> child.patch_at(step.next())
//!       |
//!       v
//! leaf: Step::apply  -> PatchStatus  // returned, never shared state
//! ```

use tracing::debug;

use crate::change::{Change, ChangeKind, ChangeSet};
use crate::error::{ChangeError, DiffError, DiffResult};
use crate::options::Options;
use crate::path::Segment;
use crate::reflect::Diffable;

// =============================================================================
// Public Types
// =============================================================================

/// Outcome of applying one change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchStatus {
    /// The change was applied
    Applied,
    /// The change was skipped; see the entry's error
    Ignored,
    /// A map entry was removed and every remaining sibling is zero
    Deleted,
}

/// One change together with how applying it went.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchEntry {
    pub change: Change,
    pub status: PatchStatus,
    pub error: Option<ChangeError>,
}

/// Per-change outcomes of a patch call, in change order.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use]
pub struct PatchLog {
    entries: Vec<PatchEntry>,
}

impl PatchLog {
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PatchEntry> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[PatchEntry] {
        &self.entries
    }

    /// Number of applied changes (map removals reported as `Deleted` included).
    pub fn applied(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status != PatchStatus::Ignored)
            .count()
    }

    pub fn ignored(&self) -> usize {
        self.count(PatchStatus::Ignored)
    }

    pub fn deleted(&self) -> usize {
        self.count(PatchStatus::Deleted)
    }

    fn count(&self, status: PatchStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    /// Check whether any change was ignored.
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|e| e.error.is_some())
    }

    /// Ignored changes with their errors.
    pub fn errors(&self) -> impl Iterator<Item = (&Change, &ChangeError)> {
        self.entries
            .iter()
            .filter_map(|e| e.error.as_ref().map(|err| (&e.change, err)))
    }
}

impl<'a> IntoIterator for &'a PatchLog {
    type Item = &'a PatchEntry;
    type IntoIter = std::slice::Iter<'a, PatchEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// =============================================================================
// Step: patch cursor
// =============================================================================

/// Cursor into one change path during patching.
///
/// Containers read [`segment`](Self::segment) to pick a child and pass
/// [`next`](Self::next) down; the location where the path ends calls
/// [`apply`](Self::apply).
#[derive(Debug, Clone, Copy)]
pub struct Step<'a> {
    change: &'a Change,
    options: &'a Options,
    pos: usize,
}

impl<'a> Step<'a> {
    /// Cursor at the root of `change`'s path.
    pub fn new(change: &'a Change, options: &'a Options) -> Self {
        Self {
            change,
            options,
            pos: 0,
        }
    }

    #[inline]
    pub fn change(&self) -> &'a Change {
        self.change
    }

    #[inline]
    pub fn options(&self) -> &'a Options {
        self.options
    }

    /// Segment to resolve at this level; `None` once the path is exhausted.
    #[inline]
    pub fn segment(&self) -> Option<&'a Segment> {
        self.change.path.segments().get(self.pos)
    }

    /// The cursor one segment deeper.
    #[inline]
    #[must_use]
    pub fn next(self) -> Self {
        Self {
            pos: self.pos + 1,
            ..self
        }
    }

    /// Check whether the current segment is the last one of the path.
    #[inline]
    pub fn is_last(&self) -> bool {
        self.pos + 1 == self.change.path.len()
    }

    #[inline]
    pub fn is_delete(&self) -> bool {
        self.change.kind == ChangeKind::Delete
    }

    /// Check whether the child addressed by the current segment is to be removed.
    #[inline]
    pub fn removes_child(&self) -> bool {
        self.is_last() && self.is_delete()
    }

    /// Check whether absent entries and nil containers may be synthesized.
    #[inline]
    pub fn may_create(&self) -> bool {
        !self.is_delete() && !self.options.no_create
    }

    /// Check the current value against the recorded `from` when
    /// `omit_unequal` is set.
    ///
    /// A change without `from` (a CREATE) expects the zero value.
    pub fn verify<D: Diffable + ?Sized>(&self, current: &D) -> Result<(), ChangeError> {
        if !self.options.omit_unequal {
            return Ok(());
        }
        let matches = match &self.change.from {
            Some(expected) => expected.same(&current.to_value()),
            None => current.is_zero(),
        };
        if matches {
            Ok(())
        } else {
            Err(ChangeError::Conflict {
                found: current.to_value(),
            })
        }
    }

    /// Apply the change to the location the path ends at.
    pub fn apply<D: Diffable + ?Sized>(self, target: &mut D) -> Result<PatchStatus, ChangeError> {
        self.verify(target)?;
        match self.change.kind {
            ChangeKind::Create | ChangeKind::Update => {
                let to = self.change.to.as_ref().ok_or(ChangeError::MissingValue)?;
                target.set_value(to)?;
            }
            ChangeKind::Delete => target.reset(),
        }
        Ok(PatchStatus::Applied)
    }
}

// =============================================================================
// Public API
// =============================================================================

/// Apply `changes` to `target` with default options.
///
/// # Example
///
/// ```
/// use shapediff::{diff, patch};
///
/// let from = vec![1i64, 2, 3];
/// let to = vec![1i64, 5];
/// let changes = diff(&from, &to).unwrap();
///
/// let mut target = from.clone();
/// let log = patch(&changes, &mut target).unwrap();
/// assert_eq!(target, to);
/// assert!(!log.has_errors());
/// ```
pub fn patch<T: Diffable + ?Sized>(changes: &ChangeSet, target: &mut T) -> DiffResult<PatchLog> {
    patch_with_options(changes, target, &Options::default())
}

/// Apply `changes` to `target` with custom options.
///
/// Fails without touching `target` if any change path is deeper than
/// `options.max_depth`. Otherwise every change gets a log entry.
pub fn patch_with_options<T: Diffable + ?Sized>(
    changes: &ChangeSet,
    target: &mut T,
    options: &Options,
) -> DiffResult<PatchLog> {
    if let Some(change) = changes.iter().find(|c| c.path.len() > options.max_depth) {
        return Err(DiffError::DepthExceeded {
            limit: options.max_depth,
            path: change.path.clone(),
        });
    }

    let mut entries = Vec::with_capacity(changes.len());
    for change in changes {
        let outcome = match &change.error {
            Some(err) => Err(err.clone()),
            None => target.patch_at(Step::new(change, options)),
        };
        let (status, error) = match outcome {
            Ok(status) => (status, None),
            Err(err) => {
                debug!(kind = %change.kind, path = %change.path, error = %err, "change ignored");
                (PatchStatus::Ignored, Some(err))
            }
        };
        entries.push(PatchEntry {
            change: change.clone(),
            status,
            error,
        });
    }

    let log = PatchLog { entries };
    debug!(
        changes = log.len(),
        applied = log.applied(),
        ignored = log.ignored(),
        "patch complete"
    );
    Ok(log)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use super::*;
    use crate::algo::diff::{diff, diff_with_options};
    use crate::path::Path;
    use crate::value::{Record, Value};

    fn single(change: Change) -> ChangeSet {
        vec![change].into()
    }

    #[test]
    fn test_round_trip_sequence() {
        let from = vec!["bar".to_string(), "bar2".to_string()];
        let to = vec!["bar_updated".to_string(), "bar2".to_string()];
        let changes = diff(&from, &to).unwrap();
        assert_eq!(changes.len(), 1);

        let mut target = from.clone();
        let log = patch(&changes, &mut target).unwrap();
        assert_eq!(target, to);
        assert_eq!(log.applied(), 1);
    }

    #[test]
    fn test_empty_map_materializes_nested_create() {
        let from: HashMap<String, HashMap<String, i64>> = HashMap::new();
        let mut to = from.clone();
        to.insert(
            "k".to_string(),
            HashMap::from([("a".to_string(), 1), ("b".to_string(), 2)]),
        );

        let changes = diff(&from, &to).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.as_slice()[0].kind, ChangeKind::Create);
        assert_eq!(changes.as_slice()[0].path.to_string(), "[\"k\"]");

        let mut target = from.clone();
        patch(&changes, &mut target).unwrap();
        assert_eq!(target, to);
    }

    #[test]
    fn test_map_delete_removes_only_that_key() {
        let from = BTreeMap::from([
            (1u32, "a".to_string()),
            (2, "b".to_string()),
            (3, "c".to_string()),
        ]);
        let mut to = from.clone();
        to.remove(&2);

        let changes = diff(&from, &to).unwrap();
        let mut target = from.clone();
        let log = patch(&changes, &mut target).unwrap();
        assert_eq!(target, to);
        assert_eq!(log.as_slice()[0].status, PatchStatus::Applied);
    }

    #[test]
    fn test_map_delete_last_entry_reports_deleted() {
        let mut target = BTreeMap::from([("k".to_string(), 1i64)]);
        let change = Change::delete(Path::root().key(&"k".to_string()), Value::Int(1));
        let log = patch(&single(change), &mut target).unwrap();
        assert!(target.is_empty());
        assert_eq!(log.as_slice()[0].status, PatchStatus::Deleted);
        assert_eq!(log.deleted(), 1);
        assert_eq!(log.applied(), 1);
    }

    #[test]
    fn test_omit_unequal_conflict() {
        let mut target = vec![1i64, 9];
        let change = Change::update(Path::root().index(1), Value::Int(2), Value::Int(3));
        let opts = Options::default().with_omit_unequal(true);

        let log = patch_with_options(&single(change.clone()), &mut target, &opts).unwrap();
        assert_eq!(target, vec![1, 9]);
        assert_eq!(log.as_slice()[0].status, PatchStatus::Ignored);
        assert_eq!(
            log.as_slice()[0].error,
            Some(ChangeError::Conflict { found: Value::Int(9) })
        );

        // Without the check the update lands
        patch(&single(change), &mut target).unwrap();
        assert_eq!(target, vec![1, 3]);
    }

    #[test]
    fn test_omit_unequal_map_delete_restores_entry() {
        let mut target = BTreeMap::from([("k".to_string(), 5i64), ("j".to_string(), 1)]);
        let change = Change::delete(Path::root().key(&"k".to_string()), Value::Int(1));
        let opts = Options::default().with_omit_unequal(true);

        let log = patch_with_options(&single(change), &mut target, &opts).unwrap();
        assert_eq!(target, BTreeMap::from([("k".to_string(), 5), ("j".to_string(), 1)]));
        assert_eq!(
            log.as_slice()[0].error,
            Some(ChangeError::Conflict { found: Value::Int(5) })
        );
    }

    #[test]
    fn test_omit_unequal_sequence_delete_conflict() {
        let mut target = vec![1i64, 9, 4];
        let change = Change::delete(Path::root().index(1), Value::Int(2));
        let opts = Options::default().with_omit_unequal(true);

        let log = patch_with_options(&single(change), &mut target, &opts).unwrap();
        assert_eq!(target, vec![1, 9, 4]);
        assert_eq!(log.ignored(), 1);
    }

    #[test]
    fn test_omit_unequal_create_over_existing_value() {
        let mut target = HashMap::from([("k".to_string(), 4i64)]);
        let change = Change::create(Path::root().key(&"k".to_string()), Value::Int(1));
        let opts = Options::default().with_omit_unequal(true);

        let log = patch_with_options(&single(change.clone()), &mut target, &opts).unwrap();
        assert_eq!(target, HashMap::from([("k".to_string(), 4)]));
        assert_eq!(
            log.as_slice()[0].error,
            Some(ChangeError::Conflict { found: Value::Int(4) })
        );

        // A zero value counts as vacant
        target.insert("k".to_string(), 0);
        let log = patch_with_options(&single(change), &mut target, &opts).unwrap();
        assert!(!log.has_errors());
        assert_eq!(target.get("k"), Some(&1));
    }

    #[test]
    fn test_omit_unequal_accepts_nan_from() {
        let mut target = vec![f64::NAN];
        let change =
            Change::update(Path::root().index(0), Value::Float(f64::NAN), Value::Float(1.5));
        let opts = Options::default().with_omit_unequal(true);

        let log = patch_with_options(&single(change), &mut target, &opts).unwrap();
        assert!(!log.has_errors());
        assert_eq!(target, vec![1.5]);
    }

    #[test]
    fn test_sequence_elements_set_to_none_stay_in_place() {
        let from = vec![Some(1i64), Some(2), Some(3)];
        let to = vec![None, Some(2), Some(3)];
        let changes = diff(&from, &to).unwrap();
        assert_eq!(changes.deletes(), 0);

        let mut target = from.clone();
        let log = patch(&changes, &mut target).unwrap();
        assert!(!log.has_errors());
        assert_eq!(target, to);

        let mut target = to.clone();
        patch(&diff(&to, &from).unwrap(), &mut target).unwrap();
        assert_eq!(target, from);
    }

    #[test]
    fn test_map_entries_set_to_none_stay_in_place() {
        let from = HashMap::from([("k".to_string(), Some(1i64))]);
        let to = HashMap::from([("k".to_string(), None)]);
        let changes = diff(&from, &to).unwrap();
        assert_eq!(changes.updates(), 1);

        let mut target = from.clone();
        let log = patch(&changes, &mut target).unwrap();
        assert!(!log.has_errors());
        assert_eq!(target, to);
        assert_eq!(log.deleted(), 0);
    }

    #[test]
    fn test_only_positions_absent_from_target_are_removed() {
        let from = vec![Some(1i64), Some(2), Some(3)];
        let to = vec![None, Some(2)];
        let changes = diff(&from, &to).unwrap();
        assert_eq!(changes.deletes(), 1);
        let removed: Vec<_> = changes
            .iter()
            .filter(|c| c.kind == ChangeKind::Delete)
            .map(|c| c.path.to_string())
            .collect();
        assert_eq!(removed, vec!["[2]"]);

        let mut target = from.clone();
        patch(&changes, &mut target).unwrap();
        assert_eq!(target, to);

        let from = BTreeMap::from([("a".to_string(), Some(1i64)), ("b".to_string(), Some(2))]);
        let to = BTreeMap::from([("a".to_string(), None)]);
        let changes = diff(&from, &to).unwrap();
        assert_eq!(changes.deletes(), 1);
        assert_eq!(changes.updates(), 1);

        let mut target = from.clone();
        patch(&changes, &mut target).unwrap();
        assert_eq!(target, to);
    }

    #[test]
    fn test_no_create_leaves_map_untouched() {
        let mut target: HashMap<String, i64> = HashMap::new();
        let change = Change::create(Path::root().key(&"k".to_string()), Value::Int(1));
        let opts = Options::default().with_no_create(true);
        let log = patch_with_options(&single(change.clone()), &mut target, &opts).unwrap();
        assert!(target.is_empty());
        assert!(matches!(log.as_slice()[0].error, Some(ChangeError::MissingEntry { .. })));

        patch(&single(change), &mut target).unwrap();
        assert_eq!(target.get("k"), Some(&1));
    }

    #[test]
    fn test_failed_nested_step_leaves_no_placeholder() {
        let mut target: HashMap<String, Vec<i64>> = HashMap::new();
        let change = Change::create(
            Path::root().key(&"k".to_string()).index(4),
            Value::Int(1),
        );
        let log = patch(&single(change), &mut target).unwrap();
        assert!(target.is_empty());
        assert_eq!(
            log.as_slice()[0].error,
            Some(ChangeError::IndexOutOfRange { index: 4, len: 0 })
        );
    }

    #[test]
    fn test_option_materialized_and_reverted() {
        let mut target: Option<Vec<i64>> = None;
        let good = Change::create(Path::root().index(0), Value::Int(7));
        patch(&single(good), &mut target).unwrap();
        assert_eq!(target, Some(vec![7]));

        let mut target: Option<Vec<i64>> = None;
        let bad = Change::create(Path::root().index(2), Value::Int(7));
        let log = patch(&single(bad), &mut target).unwrap();
        assert!(target.is_none());
        assert!(log.has_errors());
    }

    #[test]
    fn test_key_decode_failure_is_ignored() {
        let mut target: HashMap<u8, i64> = HashMap::new();
        let change = Change::create(Path::root().key(&"x".to_string()), Value::Int(1));
        let log = patch(&single(change), &mut target).unwrap();
        assert!(matches!(log.as_slice()[0].error, Some(ChangeError::KeyDecode { .. })));
    }

    #[test]
    fn test_flagged_changes_not_applied() {
        let mut target = Value::Record(Record::new().with("x", 1i64));
        let change = Change::update(Path::root().field("x"), Value::Int(1), Value::Int(2))
            .with_error(ChangeError::shape("int", "record"));
        let log = patch(&single(change), &mut target).unwrap();
        assert_eq!(log.ignored(), 1);
        assert_eq!(target, Value::Record(Record::new().with("x", 1i64)));
    }

    #[test]
    fn test_depth_precheck_applies_nothing() {
        let mut target = vec![vec![1i64]];
        let changes: ChangeSet = vec![
            Change::update(Path::root().index(0).index(0), Value::Int(1), Value::Int(2)),
            Change::update(
                Path::root().index(0).index(0).index(0),
                Value::Int(1),
                Value::Int(2),
            ),
        ]
        .into();
        let opts = Options::default().with_max_depth(2);
        let err = patch_with_options(&changes, &mut target, &opts).unwrap_err();
        assert!(matches!(err, DiffError::DepthExceeded { limit: 2, .. }));
        assert_eq!(target, vec![vec![1]]);
    }

    #[test]
    fn test_unordered_round_trip_as_multiset() {
        let from = vec![1i64, 2, 3, 2];
        let to = vec![2i64, 4, 1];
        let opts = Options::lenient();
        let changes = diff_with_options(&from, &to, &opts).unwrap();

        let mut target = from.clone();
        let log = patch_with_options(&changes, &mut target, &opts).unwrap();
        assert!(!log.has_errors());
        let (mut got, mut want) = (target, to);
        got.sort();
        want.sort();
        assert_eq!(got, want);
    }

    #[test]
    fn test_dynamic_value_round_trip() {
        let from = Value::Record(
            Record::new()
                .with("tags", Value::from(vec![Value::from("a"), Value::from("b")]))
                .with("meta", Value::map_from([("x".to_string(), Value::from(1i64))])),
        );
        let to = Value::Record(
            Record::new()
                .with("tags", Value::from(vec![Value::from("a")]))
                .with(
                    "meta",
                    Value::map_from([
                        ("x".to_string(), Value::from(2i64)),
                        ("y".to_string(), Value::from(true)),
                    ]),
                ),
        );
        let changes = diff(&from, &to).unwrap();
        let mut target = from.clone();
        let log = patch(&changes, &mut target).unwrap();
        assert!(!log.has_errors());
        assert_eq!(target, to);
    }
}
