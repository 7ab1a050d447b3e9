//! Deterministic content hashing for values
//!
//! Fingerprints are stable across process restarts, so they can be used to
//! match sequence elements regardless of where the values came from.

use crate::value::Value;

// =============================================================================
// StableHasher - Builder Pattern
// =============================================================================

/// A deterministic hasher using blake3
///
/// Unlike `std::hash::Hasher`, this produces the same output across
/// process restarts for the same input.
pub struct StableHasher {
    inner: blake3::Hasher,
}

impl StableHasher {
    #[inline]
    pub fn new() -> Self {
        Self {
            inner: blake3::Hasher::new(),
        }
    }

    /// Update with raw bytes
    #[inline]
    pub fn update(mut self, data: &[u8]) -> Self {
        self.inner.update(data);
        self
    }

    /// Update with a length-prefixed string
    #[inline]
    pub fn update_str(self, s: &str) -> Self {
        self.update_usize(s.len()).update(s.as_bytes())
    }

    /// Update with a u64 value (little-endian)
    #[inline]
    pub fn update_u64(self, v: u64) -> Self {
        self.update(&v.to_le_bytes())
    }

    /// Update with a usize value (little-endian)
    #[inline]
    pub fn update_usize(self, v: usize) -> Self {
        self.update(&v.to_le_bytes())
    }

    /// Update with the full content of a value
    ///
    /// Every variant is tagged, so `Int(1)` and `Uint(1)` hash differently,
    /// matching `Value` equality.
    pub fn update_value(self, value: &Value) -> Self {
        match value {
            Value::Null => self.update(&[0]),
            Value::Bool(b) => self.update(&[1, u8::from(*b)]),
            Value::Int(v) => self.update(&[2]).update_u64(*v as u64),
            Value::Uint(v) => self.update(&[3]).update_u64(*v),
            Value::Float(v) => self.update(&[4]).update_u64(v.to_bits()),
            Value::Str(s) => self.update(&[5]).update_str(s),
            Value::Seq(items) => items
                .iter()
                .fold(self.update(&[6]).update_usize(items.len()), |h, item| {
                    h.update_value(item)
                }),
            Value::Map(entries) => entries.iter().fold(
                self.update(&[7]).update_usize(entries.len()),
                |h, (key, item)| {
                    h.update_usize(key.as_bytes().len())
                        .update(key.as_bytes())
                        .update_value(item)
                },
            ),
            Value::Record(record) => record.iter().fold(
                self.update(&[8]).update_usize(record.len()),
                |h, (name, item)| h.update_str(name).update_value(item),
            ),
        }
    }

    /// Finish and return the hash as u64
    ///
    /// Takes the first 8 bytes of blake3 output as little-endian u64.
    #[inline]
    pub fn finish(self) -> u64 {
        let hash = self.inner.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }
}

impl Default for StableHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Content fingerprint of a value.
///
/// Equal values have equal fingerprints. `-0.0` and `0.0` differ (and NaN
/// equals nothing), so float equality is still checked after a match.
pub fn fingerprint(value: &Value) -> u64 {
    StableHasher::new().update_value(value).finish()
}
