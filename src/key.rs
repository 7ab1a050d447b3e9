//! Map key codec.
//!
//! Map keys become path segments, so they need a representation that is
//! independent of the key's Rust type, totally ordered, and decodable back
//! into the map's key type when a change is applied.
//!
//! # Encoding
//!
//! A one-byte tag followed by the payload:
//!
//! | Tag | Type | Payload |
//! |-----|------|---------|
//! | `s` | strings | UTF-8 bytes |
//! | `i` | signed integers | `i64` big-endian, sign bit flipped |
//! | `u` | unsigned integers | `u64` big-endian |
//! | `b` | `bool` | `0` or `1` |
//! | `c` | `char` | `u32` big-endian |
//!
//! Integer payloads are order-preserving, so byte order of encoded keys
//! matches the natural order within one key type.

use std::fmt;

use compact_str::CompactString;
use smallvec::SmallVec;

use crate::error::ChangeError;

const TAG_STR: u8 = b's';
const TAG_INT: u8 = b'i';
const TAG_UINT: u8 = b'u';
const TAG_BOOL: u8 = b'b';
const TAG_CHAR: u8 = b'c';

const SIGN_BIT: u64 = 1 << 63;

// =============================================================================
// Key
// =============================================================================

/// An encoded map key.
///
/// Ordering is plain byte order of the encoding.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(SmallVec<[u8; 24]>);

impl Key {
    /// Wrap raw encoded bytes.
    ///
    /// No validation happens here; decoding reports malformed input.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(SmallVec::from_slice(bytes))
    }

    /// Raw encoded bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn tagged(tag: u8, payload: &[u8]) -> Self {
        let mut bytes = SmallVec::with_capacity(payload.len() + 1);
        bytes.push(tag);
        bytes.extend_from_slice(payload);
        Self(bytes)
    }

    fn tag(&self) -> Option<u8> {
        self.0.first().copied()
    }

    fn payload(&self) -> &[u8] {
        self.0.get(1..).unwrap_or_default()
    }

    fn expect_tag(&self, tag: u8, name: &str) -> Result<&[u8], ChangeError> {
        match self.tag() {
            Some(t) if t == tag => Ok(self.payload()),
            Some(_) => Err(ChangeError::key_decode(self, format!("not a {name} key"))),
            None => Err(ChangeError::key_decode(self, "empty key")),
        }
    }

    fn fixed<const N: usize>(&self, tag: u8, name: &str) -> Result<[u8; N], ChangeError> {
        self.expect_tag(tag, name)?
            .try_into()
            .map_err(|_| ChangeError::key_decode(self, format!("expected {} payload bytes", N)))
    }

    fn decode_i64(&self) -> Result<i64, ChangeError> {
        let raw = u64::from_be_bytes(self.fixed::<8>(TAG_INT, "signed integer")?);
        Ok((raw ^ SIGN_BIT) as i64)
    }

    fn decode_u64(&self) -> Result<u64, ChangeError> {
        Ok(u64::from_be_bytes(self.fixed::<8>(TAG_UINT, "unsigned integer")?))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag() {
            Some(TAG_STR) => match std::str::from_utf8(self.payload()) {
                Ok(s) => write!(f, "{s:?}"),
                Err(_) => write_hex(f, &self.0),
            },
            Some(TAG_INT) => match self.decode_i64() {
                Ok(v) => write!(f, "{v}"),
                Err(_) => write_hex(f, &self.0),
            },
            Some(TAG_UINT) => match self.decode_u64() {
                Ok(v) => write!(f, "{v}"),
                Err(_) => write_hex(f, &self.0),
            },
            Some(TAG_BOOL) => match self.payload() {
                [0] => f.write_str("false"),
                [1] => f.write_str("true"),
                _ => write_hex(f, &self.0),
            },
            Some(TAG_CHAR) => match char::decode_key(self) {
                Ok(c) => write!(f, "{c:?}"),
                Err(_) => write_hex(f, &self.0),
            },
            _ => write_hex(f, &self.0),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({self})")
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    f.write_str("0x")?;
    for b in bytes {
        write!(f, "{b:02x}")?;
    }
    Ok(())
}

// =============================================================================
// MapKey
// =============================================================================

/// Codec between a map's key type and [`Key`].
///
/// Implement this for custom key types to use them in diffable maps.
/// `decode_key(&k.encode_key())` must return a key equal to `k`.
pub trait MapKey: Sized {
    /// Encode the key.
    fn encode_key(&self) -> Key;

    /// Decode a key previously produced by [`encode_key`](Self::encode_key).
    fn decode_key(key: &Key) -> Result<Self, ChangeError>;
}

impl MapKey for Key {
    fn encode_key(&self) -> Key {
        self.clone()
    }

    fn decode_key(key: &Key) -> Result<Self, ChangeError> {
        Ok(key.clone())
    }
}

impl MapKey for String {
    fn encode_key(&self) -> Key {
        Key::tagged(TAG_STR, self.as_bytes())
    }

    fn decode_key(key: &Key) -> Result<Self, ChangeError> {
        let payload = key.expect_tag(TAG_STR, "string")?;
        String::from_utf8(payload.to_vec())
            .map_err(|e| ChangeError::key_decode(key, e.to_string()))
    }
}

impl MapKey for CompactString {
    fn encode_key(&self) -> Key {
        Key::tagged(TAG_STR, self.as_bytes())
    }

    fn decode_key(key: &Key) -> Result<Self, ChangeError> {
        let payload = key.expect_tag(TAG_STR, "string")?;
        CompactString::from_utf8(payload).map_err(|e| ChangeError::key_decode(key, e.to_string()))
    }
}

impl MapKey for bool {
    fn encode_key(&self) -> Key {
        Key::tagged(TAG_BOOL, &[u8::from(*self)])
    }

    fn decode_key(key: &Key) -> Result<Self, ChangeError> {
        match key.expect_tag(TAG_BOOL, "bool")? {
            [0] => Ok(false),
            [1] => Ok(true),
            _ => Err(ChangeError::key_decode(key, "invalid bool payload")),
        }
    }
}

impl MapKey for char {
    fn encode_key(&self) -> Key {
        Key::tagged(TAG_CHAR, &u32::from(*self).to_be_bytes())
    }

    fn decode_key(key: &Key) -> Result<Self, ChangeError> {
        let raw = u32::from_be_bytes(key.fixed::<4>(TAG_CHAR, "char")?);
        char::from_u32(raw).ok_or_else(|| ChangeError::key_decode(key, "invalid char"))
    }
}

macro_rules! impl_signed_key {
    ($($ty:ty),* $(,)?) => {$(
        impl MapKey for $ty {
            fn encode_key(&self) -> Key {
                let raw = (*self as i64 as u64) ^ SIGN_BIT;
                Key::tagged(TAG_INT, &raw.to_be_bytes())
            }

            fn decode_key(key: &Key) -> Result<Self, ChangeError> {
                let wide = key.decode_i64()?;
                <$ty>::try_from(wide).map_err(|e| ChangeError::key_decode(key, e.to_string()))
            }
        }
    )*};
}

macro_rules! impl_unsigned_key {
    ($($ty:ty),* $(,)?) => {$(
        impl MapKey for $ty {
            fn encode_key(&self) -> Key {
                Key::tagged(TAG_UINT, &(*self as u64).to_be_bytes())
            }

            fn decode_key(key: &Key) -> Result<Self, ChangeError> {
                let wide = key.decode_u64()?;
                <$ty>::try_from(wide).map_err(|e| ChangeError::key_decode(key, e.to_string()))
            }
        }
    )*};
}

impl_signed_key!(i8, i16, i32, i64, isize);
impl_unsigned_key!(u8, u16, u32, u64, usize);

// =============================================================================
// Tests
// =============================================================================
