//! The structural capability.
//!
//! [`Diffable`] is what the engine needs from a type: a snapshot as a
//! [`Value`], assignment from a `Value`, a zero value, and the ability to
//! route a patch [`Step`] one path segment deeper. Records get it from
//! `#[derive(Diffable)]`; this module covers primitives, strings, `Option`,
//! `Box`, `Vec`, `HashMap`, `BTreeMap` and `Value` itself.
//!
//! # Container semantics
//!
//! | Container | Absent child on CREATE/UPDATE | DELETE of child |
//! |-----------|-------------------------------|-----------------|
//! | record | `FieldNotFound` | field reset to zero |
//! | map | zero placeholder, kept on success | entry removed |
//! | sequence | append at `len`, else out of range | element removed |
//! | `Option` / `Null` | empty container, kept on success | set to `None` / zero |
//!
//! Map entries are taken out as owned handles, patched, and written back;
//! a placeholder is only inserted when the nested step succeeded.

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use compact_str::CompactString;

use crate::algo::{PatchStatus, Step};
use crate::error::ChangeError;
use crate::key::{Key, MapKey};
use crate::path::Segment;
use crate::value::{Record, Value};

// =============================================================================
// Diffable
// =============================================================================

/// A type whose values can be diffed and patched structurally.
///
/// # Implementing by hand
///
/// Leaf types only need [`to_value`](Self::to_value),
/// [`set_value`](Self::set_value) and [`reset`](Self::reset); the default
/// [`patch_at`](Self::patch_at) applies the change when the path ends here
/// and reports a shape mismatch otherwise.
pub trait Diffable {
    /// Snapshot as a tagged value.
    fn to_value(&self) -> Value;

    /// Assign from a tagged value of a compatible shape.
    ///
    /// `Value::Null` resets to zero. On error the target may be partially
    /// assigned.
    fn set_value(&mut self, value: &Value) -> Result<(), ChangeError>;

    /// Reset to the zero value.
    fn reset(&mut self);

    /// Check whether this is the zero value.
    fn is_zero(&self) -> bool {
        self.to_value().is_zero()
    }

    /// Route a patch step: apply it here if the path ends, otherwise descend.
    fn patch_at(&mut self, step: Step<'_>) -> Result<PatchStatus, ChangeError> {
        match step.segment() {
            None => step.apply(self),
            Some(_) => Err(ChangeError::shape("container", self.to_value().kind())),
        }
    }
}

// =============================================================================
// Primitives
// =============================================================================

impl_diffable_int!(Int as i64: i8, i16, i32, i64, isize);
impl_diffable_int!(Uint as u64: u8, u16, u32, u64, usize);
impl_diffable_float!(f32, f64);

impl Diffable for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn set_value(&mut self, value: &Value) -> Result<(), ChangeError> {
        *self = match value {
            Value::Bool(b) => *b,
            Value::Null => false,
            other => return Err(ChangeError::shape("bool", other.kind())),
        };
        Ok(())
    }

    fn reset(&mut self) {
        *self = false;
    }
}

impl Diffable for char {
    fn to_value(&self) -> Value {
        let mut buf = [0u8; 4];
        let s: &str = self.encode_utf8(&mut buf);
        Value::Str(CompactString::from(s))
    }

    fn set_value(&mut self, value: &Value) -> Result<(), ChangeError> {
        *self = match value {
            Value::Str(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => c,
                    _ => return Err(ChangeError::shape("char", "multi-char string")),
                }
            }
            Value::Null => '\0',
            other => return Err(ChangeError::shape("char", other.kind())),
        };
        Ok(())
    }

    fn reset(&mut self) {
        *self = '\0';
    }

    fn is_zero(&self) -> bool {
        *self == '\0'
    }
}

impl Diffable for String {
    fn to_value(&self) -> Value {
        Value::Str(CompactString::from(self.as_str()))
    }

    fn set_value(&mut self, value: &Value) -> Result<(), ChangeError> {
        match value {
            Value::Str(s) => {
                self.clear();
                self.push_str(s);
            }
            Value::Null => self.clear(),
            other => return Err(ChangeError::shape("string", other.kind())),
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.clear();
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl Diffable for CompactString {
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }

    fn set_value(&mut self, value: &Value) -> Result<(), ChangeError> {
        match value {
            Value::Str(s) => *self = s.clone(),
            Value::Null => self.clear(),
            other => return Err(ChangeError::shape("string", other.kind())),
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.clear();
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

// =============================================================================
// Wrappers
// =============================================================================

impl<T: Diffable + Default> Diffable for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }

    fn set_value(&mut self, value: &Value) -> Result<(), ChangeError> {
        if value.is_null() {
            *self = None;
            return Ok(());
        }
        match self {
            Some(inner) => inner.set_value(value),
            None => {
                let mut inner = T::default();
                inner.set_value(value)?;
                *self = Some(inner);
                Ok(())
            }
        }
    }

    fn reset(&mut self) {
        *self = None;
    }

    fn is_zero(&self) -> bool {
        self.is_none()
    }

    fn patch_at(&mut self, step: Step<'_>) -> Result<PatchStatus, ChangeError> {
        let Some(segment) = step.segment() else {
            return step.apply(self);
        };
        match self {
            Some(inner) => inner.patch_at(step),
            None => {
                if !step.may_create() {
                    return Err(ChangeError::missing(segment));
                }
                let mut inner = T::default();
                let result = inner.patch_at(step);
                if result.is_ok() {
                    *self = Some(inner);
                }
                result
            }
        }
    }
}

impl<T: Diffable + ?Sized> Diffable for Box<T> {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }

    fn set_value(&mut self, value: &Value) -> Result<(), ChangeError> {
        (**self).set_value(value)
    }

    fn reset(&mut self) {
        (**self).reset();
    }

    fn is_zero(&self) -> bool {
        (**self).is_zero()
    }

    fn patch_at(&mut self, step: Step<'_>) -> Result<PatchStatus, ChangeError> {
        (**self).patch_at(step)
    }
}

// =============================================================================
// Sequences
// =============================================================================

impl<T: Diffable + Default> Diffable for Vec<T> {
    fn to_value(&self) -> Value {
        Value::Seq(self.iter().map(Diffable::to_value).collect())
    }

    fn set_value(&mut self, value: &Value) -> Result<(), ChangeError> {
        match value {
            Value::Seq(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    let mut element = T::default();
                    element.set_value(item)?;
                    out.push(element);
                }
                *self = out;
            }
            Value::Null => self.clear(),
            other => return Err(ChangeError::shape("sequence", other.kind())),
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.clear();
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn patch_at(&mut self, step: Step<'_>) -> Result<PatchStatus, ChangeError> {
        match step.segment() {
            None => step.apply(self),
            Some(Segment::Index(index)) => patch_element(self, *index, step),
            Some(other) => Err(ChangeError::shape("index", other.kind())),
        }
    }
}

/// Patch the element at `index`, or remove it when the change deletes it.
fn patch_element<T: Diffable + Default>(
    items: &mut Vec<T>,
    index: usize,
    step: Step<'_>,
) -> Result<PatchStatus, ChangeError> {
    let len = items.len();

    if step.removes_child() {
        let current = items
            .get(index)
            .ok_or(ChangeError::IndexOutOfRange { index, len })?;
        step.verify(current)?;
        items.remove(index);
        return Ok(PatchStatus::Applied);
    }

    if let Some(item) = items.get_mut(index) {
        return item.patch_at(step.next());
    }

    // Appending at the end is the only way to grow a sequence
    if index == len && step.may_create() {
        let mut item = T::default();
        let result = item.patch_at(step.next());
        if result.is_ok() {
            items.push(item);
        }
        return result;
    }

    Err(ChangeError::IndexOutOfRange { index, len })
}

// =============================================================================
// Maps
// =============================================================================

/// Owned-handle access to map entries.
trait Entries {
    type Key: MapKey;
    type Item: Diffable + Default;

    fn take(&mut self, key: &Self::Key) -> Option<Self::Item>;
    fn put(&mut self, key: Self::Key, item: Self::Item);
    fn all_zero(&self) -> bool;
}

impl<K, V, S> Entries for HashMap<K, V, S>
where
    K: MapKey + Eq + Hash,
    V: Diffable + Default,
    S: BuildHasher,
{
    type Key = K;
    type Item = V;

    fn take(&mut self, key: &K) -> Option<V> {
        self.remove(key)
    }

    fn put(&mut self, key: K, item: V) {
        self.insert(key, item);
    }

    fn all_zero(&self) -> bool {
        self.values().all(Diffable::is_zero)
    }
}

impl<K, V> Entries for BTreeMap<K, V>
where
    K: MapKey + Ord,
    V: Diffable + Default,
{
    type Key = K;
    type Item = V;

    fn take(&mut self, key: &K) -> Option<V> {
        self.remove(key)
    }

    fn put(&mut self, key: K, item: V) {
        self.insert(key, item);
    }

    fn all_zero(&self) -> bool {
        self.values().all(Diffable::is_zero)
    }
}

/// Patch the entry addressed by `encoded`.
///
/// The entry is moved out, patched, and written back. DELETE removes it
/// and reports `Deleted` when every remaining sibling is zero.
fn patch_entry<M: Entries>(
    map: &mut M,
    encoded: &Key,
    step: Step<'_>,
) -> Result<PatchStatus, ChangeError> {
    let key = <M::Key as MapKey>::decode_key(encoded)?;

    if step.removes_child() {
        let current = map
            .take(&key)
            .ok_or_else(|| ChangeError::missing(Segment::Key(encoded.clone())))?;
        if let Err(err) = step.verify(&current) {
            map.put(key, current);
            return Err(err);
        }
        return Ok(if map.all_zero() {
            PatchStatus::Deleted
        } else {
            PatchStatus::Applied
        });
    }

    let (mut handle, existed) = match map.take(&key) {
        Some(item) => (item, true),
        None if step.may_create() => (M::Item::default(), false),
        None => return Err(ChangeError::missing(Segment::Key(encoded.clone()))),
    };
    let result = handle.patch_at(step.next());
    if existed || result.is_ok() {
        map.put(key, handle);
    }
    result
}

fn entries_from_value<M>(value: &Value, mut out: M) -> Result<Option<M>, ChangeError>
where
    M: Entries,
{
    match value {
        Value::Map(entries) => {
            for (encoded, item) in entries {
                let key = <M::Key as MapKey>::decode_key(encoded)?;
                let mut element = M::Item::default();
                element.set_value(item)?;
                out.put(key, element);
            }
            Ok(Some(out))
        }
        Value::Null => Ok(None),
        other => Err(ChangeError::shape("map", other.kind())),
    }
}

impl<K, V, S> Diffable for HashMap<K, V, S>
where
    K: MapKey + Eq + Hash,
    V: Diffable + Default,
    S: BuildHasher + Default,
{
    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (k.encode_key(), v.to_value()))
                .collect(),
        )
    }

    fn set_value(&mut self, value: &Value) -> Result<(), ChangeError> {
        let out = HashMap::with_hasher(S::default());
        match entries_from_value(value, out)? {
            Some(out) => *self = out,
            None => self.clear(),
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.clear();
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn patch_at(&mut self, step: Step<'_>) -> Result<PatchStatus, ChangeError> {
        match step.segment() {
            None => step.apply(self),
            Some(Segment::Key(key)) => patch_entry(self, key, step),
            Some(other) => Err(ChangeError::shape("map key", other.kind())),
        }
    }
}

impl<K, V> Diffable for BTreeMap<K, V>
where
    K: MapKey + Ord,
    V: Diffable + Default,
{
    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (k.encode_key(), v.to_value()))
                .collect(),
        )
    }

    fn set_value(&mut self, value: &Value) -> Result<(), ChangeError> {
        match entries_from_value(value, BTreeMap::new())? {
            Some(out) => *self = out,
            None => self.clear(),
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.clear();
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn patch_at(&mut self, step: Step<'_>) -> Result<PatchStatus, ChangeError> {
        match step.segment() {
            None => step.apply(self),
            Some(Segment::Key(key)) => patch_entry(self, key, step),
            Some(other) => Err(ChangeError::shape("map key", other.kind())),
        }
    }
}

// =============================================================================
// Value
// =============================================================================

impl Diffable for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }

    fn set_value(&mut self, value: &Value) -> Result<(), ChangeError> {
        *self = value.clone();
        Ok(())
    }

    /// Zero of the same shape; `Null` stays `Null`.
    fn reset(&mut self) {
        *self = self.zeroed();
    }

    fn is_zero(&self) -> bool {
        Value::is_zero(self)
    }

    fn patch_at(&mut self, step: Step<'_>) -> Result<PatchStatus, ChangeError> {
        let Some(segment) = step.segment() else {
            return step.apply(self);
        };
        match self {
            Value::Record(record) => {
                let Segment::Field(name) = segment else {
                    return Err(ChangeError::shape("field", segment.kind()));
                };
                let field = record.get_mut(name).ok_or_else(|| ChangeError::FieldNotFound {
                    field: name.to_string(),
                })?;
                field.patch_at(step.next())
            }
            Value::Map(entries) => match segment {
                Segment::Key(key) => patch_entry(entries, key, step),
                other => Err(ChangeError::shape("map key", other.kind())),
            },
            Value::Seq(items) => match segment {
                Segment::Index(index) => patch_element(items, *index, step),
                other => Err(ChangeError::shape("index", other.kind())),
            },
            Value::Null => {
                if !step.may_create() {
                    return Err(ChangeError::missing(segment));
                }
                let mut container = match segment {
                    Segment::Key(_) => Value::Map(BTreeMap::new()),
                    Segment::Index(_) => Value::Seq(Vec::new()),
                    Segment::Field(_) => return Err(ChangeError::missing(segment)),
                };
                let result = container.patch_at(step);
                if result.is_ok() {
                    *self = container;
                }
                result
            }
            other => Err(ChangeError::shape("container", other.kind())),
        }
    }
}

impl Diffable for Record {
    fn to_value(&self) -> Value {
        Value::Record(self.clone())
    }

    fn set_value(&mut self, value: &Value) -> Result<(), ChangeError> {
        match value {
            Value::Record(record) => *self = record.clone(),
            Value::Null => self.reset(),
            other => return Err(ChangeError::shape("record", other.kind())),
        }
        Ok(())
    }

    fn reset(&mut self) {
        for (_, value) in self.iter_mut() {
            value.reset();
        }
    }

    fn patch_at(&mut self, step: Step<'_>) -> Result<PatchStatus, ChangeError> {
        match step.segment() {
            None => step.apply(self),
            Some(Segment::Field(name)) => self
                .get_mut(name)
                .ok_or_else(|| ChangeError::FieldNotFound {
                    field: name.to_string(),
                })?
                .patch_at(step.next()),
            Some(other) => Err(ChangeError::shape("field", other.kind())),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
