//! Error types for shapediff.
//!
//! Two levels:
//! - [`ChangeError`]: attached to a single change. Never aborts a diff or patch.
//! - [`DiffError`]: makes the whole operation meaningless (root shape mismatch,
//!   depth limit, unreadable persisted data).

use thiserror::Error;

use crate::path::Path;
use crate::value::Value;

/// Per-change failure, recorded next to the change it belongs to.
///
/// The change carrying it is reported as Ignored; processing continues with
/// the remaining changes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChangeError {
    /// An encoded map key could not be decoded into the map's key type
    #[error("cannot decode map key {key}: {reason}")]
    KeyDecode {
        /// Display form of the encoded key
        key: String,
        /// What went wrong
        reason: String,
    },

    /// The value found at a location has a different shape than expected
    #[error("shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch {
        /// Expected shape or kind
        expected: &'static str,
        /// Found shape or kind
        found: &'static str,
    },

    /// The target diverged from the value recorded when the diff was taken
    #[error("target has diverged: found {found:?}")]
    Conflict {
        /// Value currently held by the target
        found: Value,
    },

    /// The record has no field with this name
    #[error("field not found: {field}")]
    FieldNotFound {
        /// Requested field name
        field: String,
    },

    /// Sequence index outside the addressable range
    #[error("index {index} out of range for sequence of length {len}")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Sequence length at the time of access
        len: usize,
    },

    /// A map entry or nil container is absent and may not be created
    #[error("missing entry at {segment}")]
    MissingEntry {
        /// Display form of the segment that could not be resolved
        segment: String,
    },

    /// A create or update change carries no new value
    #[error("change carries no value to assign")]
    MissingValue,

    /// Restored from a persisted change set; the original error is text only
    #[error("{0}")]
    Detached(String),
}

impl ChangeError {
    /// Create a shape mismatch error.
    pub fn shape(expected: &'static str, found: &'static str) -> Self {
        Self::ShapeMismatch { expected, found }
    }

    /// Create a key decoding error.
    pub fn key_decode(key: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::KeyDecode {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a missing entry error for a segment.
    pub fn missing(segment: impl std::fmt::Display) -> Self {
        Self::MissingEntry {
            segment: segment.to_string(),
        }
    }
}

/// Errors that abort a whole diff, patch or decode call.
#[derive(Debug, Error)]
pub enum DiffError {
    /// `from` and `to` have incompatible shapes at the root
    #[error("incompatible shapes at {path}: {from} vs {to}")]
    ShapeMismatch {
        /// Where the mismatch was found
        path: Path,
        /// Kind of the `from` value
        from: &'static str,
        /// Kind of the `to` value
        to: &'static str,
    },

    /// Traversal went deeper than the configured limit
    #[error("depth limit of {limit} exceeded at {path}")]
    DepthExceeded {
        /// Configured maximum depth
        limit: usize,
        /// Path at which the limit was hit
        path: Path,
    },

    /// Persisted change set was written with an incompatible schema version
    #[error("change set version mismatch: expected v{expected}, found v{found}")]
    VersionMismatch {
        /// Expected schema version
        expected: u32,
        /// Found schema version
        found: u32,
    },

    /// Persisted data is corrupted or structurally invalid
    #[error("change set corrupted: {0}")]
    Corrupted(String),

    /// Serialization/deserialization failed
    #[error("serialization error: {0}")]
    Serialize(String),

    /// Magic bytes validation failed
    #[error("invalid change set format: expected magic bytes {expected:?}, found {found:?}")]
    InvalidMagic {
        /// Expected magic bytes
        expected: [u8; 4],
        /// Found magic bytes
        found: [u8; 4],
    },
}

/// Result type alias for shapediff operations.
pub type DiffResult<T> = Result<T, DiffError>;

impl DiffError {
    /// Create a corruption error with a message.
    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }

    /// Create a serialization error from any error type.
    pub fn serialize(err: impl std::error::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

#[cfg(feature = "cache")]
impl From<rkyv::rancor::Error> for DiffError {
    fn from(err: rkyv::rancor::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DiffError::VersionMismatch { expected: 2, found: 1 };
        assert_eq!(err.to_string(), "change set version mismatch: expected v2, found v1");

        let err = DiffError::DepthExceeded {
            limit: 4,
            path: Path::root().field("a").index(3),
        };
        assert_eq!(err.to_string(), "depth limit of 4 exceeded at a[3]");

        let err = ChangeError::IndexOutOfRange { index: 5, len: 2 };
        assert_eq!(err.to_string(), "index 5 out of range for sequence of length 2");
    }

    #[test]
    fn test_change_error_helpers() {
        assert_eq!(
            ChangeError::shape("map", "int"),
            ChangeError::ShapeMismatch { expected: "map", found: "int" }
        );
        assert_eq!(
            ChangeError::missing("[\"k\"]").to_string(),
            "missing entry at [\"k\"]"
        );
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DiffError>();
        assert_send_sync::<ChangeError>();
    }
}
