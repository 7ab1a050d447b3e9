//! Prelude module for common imports.
//!
//! ```ignore
//! use shapediff::prelude::*;
//! ```

// Capability
pub use crate::key::MapKey;
pub use crate::reflect::Diffable;

#[cfg(feature = "macros")]
pub use shapediff_macros::Diffable;

// Data model
pub use crate::change::{Change, ChangeKind, ChangeSet};
pub use crate::path::{Path, Segment};
pub use crate::value::{Record, Value};

// Algorithms
pub use crate::algo::{diff, diff_with_options, patch, patch_with_options, PatchLog, PatchStatus};
pub use crate::options::Options;

// Error
pub use crate::error::{ChangeError, DiffError, DiffResult};

// Serialization
#[cfg(feature = "cache")]
pub use crate::serialize::{from_bytes, to_bytes, SCHEMA_VERSION};
