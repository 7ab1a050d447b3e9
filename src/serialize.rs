//! Persistence for change sets.
//!
//! A [`ChangeSet`] can be written to bytes, stored, and decoded later to be
//! applied to another value. The encoding is a flat rkyv archive: values
//! are stored as a node table with children referenced by index, which
//! avoids recursive archived types.
//!
//! Change errors survive only as text and come back as
//! [`ChangeError::Detached`], which still marks the change as ignored.

use crate::change::ChangeSet;
use crate::error::{DiffError, DiffResult};
#[cfg(feature = "cache")]
use crate::options::DEFAULT_MAX_DEPTH;

/// Current schema version of the persisted format.
/// Increment this when making breaking changes to `SerChangeSet`.
pub const SCHEMA_VERSION: u32 = 1;

/// Magic bytes at the head of every persisted change set.
pub const MAGIC: [u8; 4] = *b"SDIF";

/// Node index meaning "no value".
#[cfg(feature = "cache")]
const NONE: u32 = u32::MAX;

#[cfg(feature = "cache")]
mod concrete {
    //! Flat serialization types.

    use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};

    #[derive(Archive, RkyvSerialize, RkyvDeserialize, Debug)]
    pub struct SerChangeSet {
        /// Magic bytes for validation
        pub magic: [u8; 4],
        /// Schema version for compatibility checking
        pub schema_version: u32,
        pub changes: Vec<SerChange>,
        /// Value nodes of all changes; children always follow their parent
        pub nodes: Vec<SerNode>,
    }

    #[derive(Archive, RkyvSerialize, RkyvDeserialize, Debug)]
    pub struct SerChange {
        /// 0 = create, 1 = update, 2 = delete
        pub kind: u8,
        pub path: Vec<SerSegment>,
        /// Root node of `from`, or `NONE`
        pub from: u32,
        /// Root node of `to`, or `NONE`
        pub to: u32,
        pub error: Option<String>,
    }

    #[derive(Archive, RkyvSerialize, RkyvDeserialize, Debug)]
    pub struct SerSegment {
        /// 0 = field, 1 = index, 2 = key
        pub kind: u8,
        pub name: String,
        pub index: u64,
        pub key: Vec<u8>,
    }

    /// One value node. Which payload fields are meaningful depends on `tag`.
    #[derive(Archive, RkyvSerialize, RkyvDeserialize, Debug, Default)]
    pub struct SerNode {
        pub tag: u8,
        pub int: i64,
        /// Unsigned payload, bool as 0/1, float bits
        pub uint: u64,
        pub text: String,
        pub children: Vec<u32>,
        /// Record field names, parallel to `children`
        pub names: Vec<String>,
        /// Encoded map keys, parallel to `children`
        pub keys: Vec<Vec<u8>>,
    }
}

#[cfg(feature = "cache")]
use concrete::*;

#[cfg(feature = "cache")]
use rkyv::rancor::Error as RkyvError;

#[cfg(feature = "cache")]
mod tag {
    pub const NULL: u8 = 0;
    pub const BOOL: u8 = 1;
    pub const INT: u8 = 2;
    pub const UINT: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const STR: u8 = 5;
    pub const SEQ: u8 = 6;
    pub const MAP: u8 = 7;
    pub const RECORD: u8 = 8;
}

/// Serialize a change set to bytes.
#[cfg(feature = "cache")]
pub fn to_bytes(changes: &ChangeSet) -> DiffResult<Vec<u8>> {
    let ser = to_serializable(changes)?;
    let bytes = rkyv::to_bytes::<RkyvError>(&ser)?;
    tracing::debug!(changes = changes.len(), bytes = bytes.len(), "change set serialized");
    Ok(bytes.to_vec())
}

/// Deserialize a change set from bytes.
///
/// # Errors
///
/// - `Serialize` if the archive fails validation
/// - `InvalidMagic` if the bytes are not a persisted change set
/// - `VersionMismatch` if the schema version is incompatible
/// - `Corrupted` if node references are out of range or cyclic, or values
///   nest deeper than [`DEFAULT_MAX_DEPTH`]
#[cfg(feature = "cache")]
pub fn from_bytes(bytes: &[u8]) -> DiffResult<ChangeSet> {
    // Archives need aligned storage; input slices carry no such guarantee
    let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
    aligned.extend_from_slice(bytes);

    let archived = rkyv::access::<ArchivedSerChangeSet, RkyvError>(&aligned)?;

    let magic: [u8; 4] = archived.magic;
    if magic != MAGIC {
        return Err(DiffError::InvalidMagic {
            expected: MAGIC,
            found: magic,
        });
    }

    let version = archived.schema_version.to_native();
    if version != SCHEMA_VERSION {
        return Err(DiffError::VersionMismatch {
            expected: SCHEMA_VERSION,
            found: version,
        });
    }

    from_serializable(archived)
}

// =============================================================================
// Flattening
// =============================================================================

#[cfg(feature = "cache")]
fn to_serializable(changes: &ChangeSet) -> DiffResult<SerChangeSet> {
    use crate::change::ChangeKind;
    use crate::path::Segment;

    let mut nodes = Vec::new();
    let mut out = Vec::with_capacity(changes.len());

    for change in changes {
        let path = change
            .path
            .segments()
            .iter()
            .map(|segment| match segment {
                Segment::Field(name) => SerSegment {
                    kind: 0,
                    name: name.to_string(),
                    index: 0,
                    key: Vec::new(),
                },
                Segment::Index(i) => SerSegment {
                    kind: 1,
                    name: String::new(),
                    index: *i as u64,
                    key: Vec::new(),
                },
                Segment::Key(key) => SerSegment {
                    kind: 2,
                    name: String::new(),
                    index: 0,
                    key: key.as_bytes().to_vec(),
                },
            })
            .collect();

        let from = match &change.from {
            Some(value) => flatten_value(value, &mut nodes, 0)?,
            None => NONE,
        };
        let to = match &change.to {
            Some(value) => flatten_value(value, &mut nodes, 0)?,
            None => NONE,
        };

        out.push(SerChange {
            kind: match change.kind {
                ChangeKind::Create => 0,
                ChangeKind::Update => 1,
                ChangeKind::Delete => 2,
            },
            path,
            from,
            to,
            error: change.error.as_ref().map(ToString::to_string),
        });
    }

    Ok(SerChangeSet {
        magic: MAGIC,
        schema_version: SCHEMA_VERSION,
        changes: out,
        nodes,
    })
}

/// Append `value` and its subtree to `nodes`, returning the root index.
#[cfg(feature = "cache")]
fn flatten_value(
    value: &crate::value::Value,
    nodes: &mut Vec<SerNode>,
    depth: usize,
) -> DiffResult<u32> {
    use crate::value::Value;

    if depth > DEFAULT_MAX_DEPTH {
        return Err(DiffError::corrupted(format!(
            "value nesting exceeds {DEFAULT_MAX_DEPTH} levels"
        )));
    }

    // Reserve our index
    let idx = u32::try_from(nodes.len())
        .ok()
        .filter(|&i| i != NONE)
        .ok_or_else(|| DiffError::corrupted("too many value nodes"))?;
    nodes.push(SerNode::default());

    let mut node = SerNode::default();
    match value {
        Value::Null => node.tag = tag::NULL,
        Value::Bool(b) => {
            node.tag = tag::BOOL;
            node.uint = u64::from(*b);
        }
        Value::Int(v) => {
            node.tag = tag::INT;
            node.int = *v;
        }
        Value::Uint(v) => {
            node.tag = tag::UINT;
            node.uint = *v;
        }
        Value::Float(v) => {
            node.tag = tag::FLOAT;
            node.uint = v.to_bits();
        }
        Value::Str(s) => {
            node.tag = tag::STR;
            node.text = s.to_string();
        }
        Value::Seq(items) => {
            node.tag = tag::SEQ;
            for item in items {
                node.children.push(flatten_value(item, nodes, depth + 1)?);
            }
        }
        Value::Map(entries) => {
            node.tag = tag::MAP;
            for (key, item) in entries {
                node.keys.push(key.as_bytes().to_vec());
                node.children.push(flatten_value(item, nodes, depth + 1)?);
            }
        }
        Value::Record(record) => {
            node.tag = tag::RECORD;
            for (name, item) in record.iter() {
                node.names.push(name.to_string());
                node.children.push(flatten_value(item, nodes, depth + 1)?);
            }
        }
    }

    nodes[idx as usize] = node;
    Ok(idx)
}

// =============================================================================
// Unflattening
// =============================================================================

#[cfg(feature = "cache")]
fn from_serializable(archived: &ArchivedSerChangeSet) -> DiffResult<ChangeSet> {
    use crate::change::{Change, ChangeKind};
    use crate::error::ChangeError;
    use crate::key::Key;
    use crate::path::{Path, Segment};

    let mut changes = ChangeSet::new();

    for ser in archived.changes.iter() {
        let kind = match ser.kind {
            0 => ChangeKind::Create,
            1 => ChangeKind::Update,
            2 => ChangeKind::Delete,
            other => return Err(DiffError::corrupted(format!("unknown change kind {other}"))),
        };

        let mut segments = Vec::with_capacity(ser.path.len());
        for seg in ser.path.iter() {
            segments.push(match seg.kind {
                0 => Segment::Field(seg.name.as_str().into()),
                1 => {
                    let index = usize::try_from(seg.index.to_native())
                        .map_err(|_| DiffError::corrupted("sequence index exceeds usize"))?;
                    Segment::Index(index)
                }
                2 => Segment::Key(Key::from_bytes(seg.key.as_slice())),
                other => {
                    return Err(DiffError::corrupted(format!("unknown segment kind {other}")));
                }
            });
        }

        let from = optional_value(ser.from.to_native(), &archived.nodes)?;
        let to = optional_value(ser.to.to_native(), &archived.nodes)?;

        changes.push(Change {
            kind,
            path: Path::from(segments),
            from,
            to,
            error: ser
                .error
                .as_ref()
                .map(|msg| ChangeError::Detached(msg.as_str().to_string())),
        });
    }

    tracing::debug!(changes = changes.len(), "change set deserialized");
    Ok(changes)
}

#[cfg(feature = "cache")]
fn optional_value(
    idx: u32,
    nodes: &rkyv::vec::ArchivedVec<ArchivedSerNode>,
) -> DiffResult<Option<crate::value::Value>> {
    if idx == NONE {
        return Ok(None);
    }
    unflatten_value(idx as usize, nodes, 0).map(Some)
}

#[cfg(feature = "cache")]
fn unflatten_value(
    idx: usize,
    nodes: &rkyv::vec::ArchivedVec<ArchivedSerNode>,
    depth: usize,
) -> DiffResult<crate::value::Value> {
    use std::collections::BTreeMap;

    use compact_str::CompactString;

    use crate::key::Key;
    use crate::value::{Record, Value};

    if depth > DEFAULT_MAX_DEPTH {
        return Err(DiffError::corrupted(format!(
            "value node {idx} nested deeper than {DEFAULT_MAX_DEPTH} levels"
        )));
    }

    let node = nodes
        .get(idx)
        .ok_or_else(|| DiffError::corrupted(format!("value node {idx} out of range")))?;

    // Children are written after their parent; anything else is a cycle
    let child = |c: &rkyv::Archived<u32>| -> DiffResult<Value> {
        let c = c.to_native() as usize;
        if c <= idx {
            return Err(DiffError::corrupted(format!(
                "value node {idx} references earlier node {c}"
            )));
        }
        unflatten_value(c, nodes, depth + 1)
    };

    let value = match node.tag {
        tag::NULL => Value::Null,
        tag::BOOL => Value::Bool(node.uint.to_native() != 0),
        tag::INT => Value::Int(node.int.to_native()),
        tag::UINT => Value::Uint(node.uint.to_native()),
        tag::FLOAT => Value::Float(f64::from_bits(node.uint.to_native())),
        tag::STR => Value::Str(CompactString::from(node.text.as_str())),
        tag::SEQ => Value::Seq(node.children.iter().map(child).collect::<DiffResult<_>>()?),
        tag::MAP => {
            if node.keys.len() != node.children.len() {
                return Err(DiffError::corrupted("map keys and children differ in length"));
            }
            let mut entries = BTreeMap::new();
            for (key, c) in node.keys.iter().zip(node.children.iter()) {
                entries.insert(Key::from_bytes(key.as_slice()), child(c)?);
            }
            Value::Map(entries)
        }
        tag::RECORD => {
            if node.names.len() != node.children.len() {
                return Err(DiffError::corrupted("record names and children differ in length"));
            }
            let mut record = Record::with_capacity(node.names.len());
            for (name, c) in node.names.iter().zip(node.children.iter()) {
                record.push(name.as_str(), child(c)?);
            }
            Value::Record(record)
        }
        other => return Err(DiffError::corrupted(format!("unknown value tag {other}"))),
    };
    Ok(value)
}

// =============================================================================
// Non-cache stubs
// =============================================================================

#[cfg(not(feature = "cache"))]
pub fn to_bytes(_changes: &ChangeSet) -> DiffResult<Vec<u8>> {
    Err(DiffError::Serialize(
        "serialization requires the 'cache' feature".to_string(),
    ))
}

#[cfg(not(feature = "cache"))]
pub fn from_bytes(_bytes: &[u8]) -> DiffResult<ChangeSet> {
    Err(DiffError::Serialize(
        "deserialization requires the 'cache' feature".to_string(),
    ))
}
