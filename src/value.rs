//! Tagged value model.
//!
//! [`Value`] is the uniform representation of anything under traversal.
//! Typed data is snapshotted into a `Value` through
//! [`Diffable::to_value`](crate::Diffable::to_value); changes carry `Value`s
//! as their `from`/`to` payloads.

use std::collections::BTreeMap;

use compact_str::CompactString;

use crate::key::{Key, MapKey};

// =============================================================================
// Shape
// =============================================================================

/// Structural kind of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Absent value or nil container
    Nil,
    /// Bool, number or string
    Primitive,
    /// Named fields in declaration order
    Record,
    /// Ordered elements
    Sequence,
    /// Keyed entries
    Map,
}

// =============================================================================
// Record
// =============================================================================

/// Named fields of a record value, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(CompactString, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Append a field (builder style).
    #[must_use]
    pub fn with(mut self, name: impl Into<CompactString>, value: impl Into<Value>) -> Self {
        self.push(name, value);
        self
    }

    /// Append a field.
    ///
    /// Field names are expected to be unique; lookups return the first match.
    pub fn push(&mut self, name: impl Into<CompactString>, value: impl Into<Value>) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.iter_mut().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Value)> {
        self.fields.iter_mut().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<N: Into<CompactString>> FromIterator<(N, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (N, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(n, v)| (n.into(), v)).collect(),
        }
    }
}

// =============================================================================
// Value
// =============================================================================

/// Any value under traversal.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Absent value or nil container
    #[default]
    Null,
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    Uint(u64),
    Float(f64),
    Str(CompactString),
    /// Ordered elements
    Seq(Vec<Value>),
    /// Entries ordered by encoded key
    Map(BTreeMap<Key, Value>),
    Record(Record),
}

impl Value {
    impl_scalar_accessors!(Bool: bool, Int: i64, Uint: u64, Float: f64);
    impl_container_accessors!(Seq: Vec<Value>, Map: BTreeMap<Key, Value>, Record: Record);

    /// Build a map value from typed keys.
    pub fn map_from<K, I>(entries: I) -> Self
    where
        K: MapKey,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.encode_key(), v)).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Self::Null => Shape::Nil,
            Self::Bool(_) | Self::Int(_) | Self::Uint(_) | Self::Float(_) | Self::Str(_) => {
                Shape::Primitive
            }
            Self::Seq(_) => Shape::Sequence,
            Self::Map(_) => Shape::Map,
            Self::Record(_) => Shape::Record,
        }
    }

    /// Name of the variant, used in errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Uint(_) => "uint",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Seq(_) => "sequence",
            Self::Map(_) => "map",
            Self::Record(_) => "record",
        }
    }

    /// Check whether this is the zero value of its shape.
    ///
    /// Empty containers count as zero; a record is zero when all of its
    /// fields are.
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(b) => !b,
            Self::Int(v) => *v == 0,
            Self::Uint(v) => *v == 0,
            Self::Float(v) => *v == 0.0,
            Self::Str(s) => s.is_empty(),
            Self::Seq(items) => items.is_empty(),
            Self::Map(entries) => entries.is_empty(),
            Self::Record(record) => record.iter().all(|(_, v)| v.is_zero()),
        }
    }

    /// Structural equality with floats compared bit for bit.
    ///
    /// Unlike `==`, a NaN is the same as itself, so every value is the same
    /// as its own clone. This is the equality diffing and conflict checks use.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Seq(a), Self::Seq(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same(y))
            }
            (Self::Map(a), Self::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.same(vb))
            }
            (Self::Record(a), Self::Record(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((na, va), (nb, vb))| na == nb && va.same(vb))
            }
            _ => self == other,
        }
    }

    /// Stable content fingerprint; equal values fingerprint equally.
    pub fn fingerprint(&self) -> u64 {
        crate::algo::fingerprint(self)
    }

    /// The zero value of the same shape.
    ///
    /// Records keep their field names with every field zeroed.
    pub fn zeroed(&self) -> Value {
        match self {
            Self::Null => Self::Null,
            Self::Bool(_) => Self::Bool(false),
            Self::Int(_) => Self::Int(0),
            Self::Uint(_) => Self::Uint(0),
            Self::Float(_) => Self::Float(0.0),
            Self::Str(_) => Self::Str(CompactString::default()),
            Self::Seq(_) => Self::Seq(Vec::new()),
            Self::Map(_) => Self::Map(BTreeMap::new()),
            Self::Record(record) => Self::Record(
                record
                    .iter()
                    .map(|(n, v)| (n, v.zeroed()))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(CompactString::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(CompactString::from(v))
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Seq(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Self::Record(v)
    }
}
