//! shapediff - Structural diff and patch for typed nested values
//!
//! ## Core Concepts
//!
//! **Diffable capability**: a type declares once, by derive or by hand, how
//! it is snapshotted into a [`Value`], assigned from one, and walked one
//! path segment at a time. Records, maps, sequences and primitives compose.
//!
//! **Path-addressed changes**: [`diff`] compares two values and returns a
//! [`ChangeSet`] of CREATE/UPDATE/DELETE changes, each with the [`Path`] it
//! applies to. [`patch`] applies a change set to any live value of the same
//! shape, without needing the original source value.
//!
//! **Never abort mid-way**: a change that cannot be applied is logged as
//! ignored in the [`PatchLog`] and the remaining changes still run.
//!
//! ## Modules
//! - `key`, `path`: map key codec and change paths
//! - `value`: the tagged value model
//! - `reflect`: the `Diffable` trait and its std implementations
//! - `change`: `Change`, `ChangeSet`
//! - `algo`: diff, patch, multiset alignment, fingerprints
//! - `options`: per-call configuration
//! - `serialize`: persisted change sets (feature `cache`)
//! - `batch`: many pairs at once (parallel with feature `parallel`)
//!
//! ## Usage
//!
//! ```ignore
//! use std::collections::HashMap;
//! use shapediff::{diff, patch, Diffable};
//!
//! #[derive(Diffable, Clone, Default)]
//! struct Settings {
//!     #[diff(rename = "Name")]
//!     name: String,
//!     limits: HashMap<String, u32>,
//! }
//!
//! let changes = diff(&old, &new)?;
//! let log = patch(&changes, &mut replica)?;
//! assert!(!log.has_errors());
//! ```

extern crate self as shapediff;

#[macro_use]
mod macros;

// =============================================================================
// Modules
// =============================================================================

/// Map key codec
pub mod key;

/// Paths into nested values
pub mod path;

/// Tagged value model
pub mod value;

/// The `Diffable` capability
pub mod reflect;

/// Change model
pub mod change;

/// Per-call options
pub mod options;

/// Algorithms: diff, patch, multiset alignment, hashing
pub mod algo;

/// Batch diffing
pub mod batch;

/// Error types
pub mod error;

/// Change set persistence
pub mod serialize;

/// Prelude for common imports
pub mod prelude;

// =============================================================================
// Re-exports
// =============================================================================

// Algorithms
pub use algo::{
    diff, diff_values, diff_with_options, patch, patch_with_options, PatchEntry, PatchLog,
    PatchStatus, StableHasher, Step,
};

pub use batch::diff_batch;

// Data model
pub use change::{Change, ChangeKind, ChangeSet};
pub use key::{Key, MapKey};
pub use path::{Path, Segment};
pub use value::{Record, Shape, Value};

pub use options::Options;
pub use reflect::Diffable;

// Error types
pub use error::{ChangeError, DiffError, DiffResult};

// Derive macro (shares the trait's name, like serde)
#[cfg(feature = "macros")]
pub use shapediff_macros::Diffable;

// =============================================================================
// Tests
// =============================================================================


#[cfg(all(test, feature = "macros"))]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use super::*;

    #[derive(Diffable, Debug, Clone, Default, PartialEq)]
    struct Bar {
        data: String,
    }

    impl Bar {
        fn new(data: &str) -> Self {
            Self {
                data: data.to_string(),
            }
        }
    }

    #[derive(Diffable, Debug, Clone, Default, PartialEq)]
    struct Container {
        #[diff(rename = "Name")]
        name: String,
        #[diff(rename = "Number")]
        number: i64,
        string_slice: Vec<String>,
        misc_slice: Vec<Value>,
        slice: Vec<Bar>,
        #[diff(rename = "struct")]
        strukt: Bar,
        map: HashMap<String, Bar>,
        simple_map: HashMap<String, String>,
        nested_map: HashMap<String, Value>,
    }

    fn init_value() -> Container {
        Container {
            name: "foo".to_string(),
            number: 1,
            string_slice: vec!["bar".to_string(), "bar2".to_string()],
            misc_slice: Vec::new(),
            slice: vec![Bar::new("bar"), Bar::new("bar2")],
            strukt: Bar::new("bar"),
            map: HashMap::from([
                ("bar".to_string(), Bar::new("bar")),
                ("bar2".to_string(), Bar::new("bar2")),
            ]),
            simple_map: HashMap::from([
                ("bar".to_string(), "bar".to_string()),
                ("bar2".to_string(), "bar2".to_string()),
            ]),
            nested_map: HashMap::from([
                ("bar".to_string(), Bar::new("bar").to_value()),
                ("bar2".to_string(), Bar::new("bar2").to_value()),
                (
                    "bar3".to_string(),
                    Value::map_from([("foo".to_string(), Value::from("foo2"))]),
                ),
            ]),
        }
    }

    /// Diff, patch a copy of `source`, and return the patch log.
    fn round_trip(source: &Container, update: &Container) -> PatchLog {
        let changes = diff(source, update).unwrap();
        let mut target = source.clone();
        let log = patch(&changes, &mut target).unwrap();
        assert!(!log.has_errors(), "{:?}", log.errors().collect::<Vec<_>>());
        assert_eq!(&target, update);
        log
    }

    #[test]
    fn test_update_simple() {
        let source = init_value();
        let mut update = init_value();
        update.name = "foo Updated".to_string();
        update.number = 2;

        let changes = diff(&source, &update).unwrap();
        let paths: Vec<String> = changes.iter().map(|c| c.path.to_string()).collect();
        assert_eq!(paths, vec!["Name", "Number"]);
        assert_eq!(round_trip(&source, &update).len(), 2);
    }

    #[test]
    fn test_update_string_slice() {
        let source = init_value();
        let mut update = init_value();
        update.string_slice[0] = "bar update".to_string();
        assert_eq!(round_trip(&source, &update).len(), 1);
    }

    #[test]
    fn test_update_slice() {
        let source = init_value();
        let mut update = init_value();
        update.slice[0].data = "bar update".to_string();

        let changes = diff(&source, &update).unwrap();
        assert_eq!(changes.as_slice()[0].path.to_string(), "slice[0].data");
        assert_eq!(round_trip(&source, &update).len(), 1);
    }

    #[test]
    fn test_update_struct() {
        let source = init_value();
        let mut update = init_value();
        update.strukt.data = "bar update".to_string();

        let changes = diff(&source, &update).unwrap();
        assert_eq!(changes.as_slice()[0].path.to_string(), "struct.data");
        assert_eq!(round_trip(&source, &update).len(), 1);
    }

    #[test]
    fn test_update_map() {
        let source = init_value();
        let mut update = init_value();
        if let Some(bar) = update.map.get_mut("bar") {
            bar.data = "bar Update".to_string();
        }
        assert_eq!(round_trip(&source, &update).len(), 1);
    }

    #[test]
    fn test_update_simple_map() {
        let source = init_value();
        let mut update = init_value();
        update.simple_map.insert("bar".to_string(), "bar32".to_string());
        assert_eq!(round_trip(&source, &update).len(), 1);
    }

    #[test]
    fn test_update_nested_map() {
        let source = init_value();
        let mut update = init_value();
        update
            .nested_map
            .insert("bar".to_string(), Bar::new("bar32").to_value());
        update.nested_map.insert(
            "bar3".to_string(),
            Value::map_from([
                ("foo2".to_string(), Value::from("foo2")),
                ("foo3".to_string(), Value::from("f003")),
            ]),
        );
        update.nested_map.remove("bar2");

        let changes = diff(&source, &update).unwrap();
        assert_eq!(changes.updates(), 1);
        assert_eq!(changes.deletes(), 2);
        assert_eq!(changes.creates(), 2);

        let log = round_trip(&source, &update);
        assert_eq!(log.len(), 5);
        // Removing "foo" empties the inner map before the creates land
        assert_eq!(log.deleted(), 1);
    }

    #[test]
    fn test_identical_values_produce_no_changes() {
        let value = init_value();
        assert!(diff(&value, &value).unwrap().is_empty());
    }

    #[derive(Diffable, Debug, Clone, Default, PartialEq)]
    struct Profile {
        nickname: Option<String>,
        tags: BTreeMap<u32, Vec<Bar>>,
        parent: Option<Box<Bar>>,
        #[diff(skip)]
        scratch: Vec<u8>,
    }

    #[test]
    fn test_optional_fields_round_trip() {
        let empty = Profile::default();
        let full = Profile {
            nickname: Some("nick".to_string()),
            tags: BTreeMap::from([(1, vec![Bar::new("a")])]),
            parent: Some(Box::new(Bar::new("p"))),
            scratch: Vec::new(),
        };

        let changes = diff(&empty, &full).unwrap();
        assert_eq!(changes.creates(), 3);
        let mut target = empty.clone();
        patch(&changes, &mut target).unwrap();
        assert_eq!(target, full);

        let changes = diff(&full, &empty).unwrap();
        assert_eq!(changes.deletes(), 3);
        let log = patch(&changes, &mut target).unwrap();
        assert_eq!(target, empty);
        assert_eq!(log.applied(), 3);
    }

    #[test]
    fn test_skipped_field_ignored() {
        let a = Profile {
            scratch: vec![1, 2],
            ..Profile::default()
        };
        let b = Profile {
            scratch: vec![3],
            ..Profile::default()
        };
        assert!(diff(&a, &b).unwrap().is_empty());
        assert!(!a.to_value().as_record().unwrap().contains("scratch"));

        let change = Change::update(Path::root().field("scratch"), Value::Null, Value::Null);
        let mut target = a.clone();
        let log = patch(&vec![change].into(), &mut target).unwrap();
        assert_eq!(
            log.as_slice()[0].error,
            Some(ChangeError::FieldNotFound {
                field: "scratch".to_string()
            })
        );
    }

    #[test]
    fn test_strict_options_detect_divergence() {
        let source = init_value();
        let mut update = init_value();
        update.name = "new".to_string();
        update.number = 5;
        let changes = diff(&source, &update).unwrap();

        let mut replica = init_value();
        replica.number = 99;
        let log = patch_with_options(&changes, &mut replica, &Options::strict()).unwrap();
        assert_eq!(replica.name, "new");
        assert_eq!(replica.number, 99);
        assert_eq!(log.ignored(), 1);
        assert_eq!(
            log.errors().next().map(|(_, e)| e.clone()),
            Some(ChangeError::Conflict {
                found: Value::Int(99)
            })
        );
    }

    #[derive(Diffable, Debug, Clone, Default, PartialEq)]
    struct Wrapper<T> {
        inner: T,
        items: Vec<T>,
    }

    #[test]
    fn test_generic_record() {
        let a = Wrapper {
            inner: 1u16,
            items: vec![1, 2],
        };
        let b = Wrapper {
            inner: 4u16,
            items: vec![1],
        };
        let changes = diff(&a, &b).unwrap();
        let mut target = a.clone();
        patch(&changes, &mut target).unwrap();
        assert_eq!(target, b);
    }

    #[cfg(feature = "cache")]
    #[test]
    fn test_persisted_changes_apply() {
        let source = init_value();
        let mut update = init_value();
        update.slice.push(Bar::new("bar3"));
        update.simple_map.remove("bar");

        let bytes = serialize::to_bytes(&diff(&source, &update).unwrap()).unwrap();
        let changes = serialize::from_bytes(&bytes).unwrap();
        let mut target = source.clone();
        patch(&changes, &mut target).unwrap();
        assert_eq!(target, update);
    }
}
