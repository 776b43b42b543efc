//! Schema-less property list decoding.
//!
//! Input bundles are untrusted and frequently malformed or produced by
//! unknown future OS versions, so the decoder returns a generic value
//! tree and all key access goes through accessors that answer `None`
//! instead of failing on missing or mistyped keys. Structural damage
//! (truncated tables, bad refs, unknown markers) is a hard
//! [`MalformedPlist`](crate::PreviewError::MalformedPlist) error and
//! never yields a partial tree.

mod binary;
mod xml;

use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::Utc;

use crate::PreviewError;
use crate::Result;

pub use binary::encode_binary;
pub(crate) use binary::embedded_len;

/// Magic prefix of a binary-serialized property list.
pub const BPLIST_MAGIC: &[u8; 8] = b"bplist00";

/// A decoded property list value.
///
/// A decoded tree is acyclic and bounded by the byte length of its
/// source; there are no external references.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Mapping with unique keys; order is irrelevant for lookup.
    Dict(BTreeMap<String, Value>),
    /// Ordered sequence.
    Array(Vec<Value>),
    /// Text.
    String(String),
    /// Signed integer.
    Integer(i64),
    /// Floating-point number.
    Real(f64),
    /// Boolean.
    Boolean(bool),
    /// Date, stored in UTC.
    Date(DateTime<Utc>),
    /// Opaque binary blob.
    Data(Vec<u8>),
    /// Keyed-archive object reference. Decoded for completeness; the
    /// metadata extractor never dereferences these.
    Uid(u64),
    /// Explicit null.
    Null,
}

impl Value {
    /// Returns the mapping if this value is a dictionary.
    #[must_use]
    pub fn as_dict(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Dict(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the elements if this value is an array.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the text if this value is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer value, converting whole reals.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            #[allow(clippy::cast_possible_truncation)]
            Self::Real(r) if r.fract() == 0.0 => Some(*r as i64),
            _ => None,
        }
    }

    /// Returns the boolean value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the date value.
    #[must_use]
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the raw bytes if this value is a data blob.
    #[must_use]
    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            Self::Data(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Looks up a key if this value is a dictionary.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_dict().and_then(|map| map.get(key))
    }

    /// Looks up a string under `key`.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Looks up an integer under `key`.
    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    /// Looks up a boolean under `key`.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Looks up a date under `key`.
    #[must_use]
    pub fn get_date(&self, key: &str) -> Option<DateTime<Utc>> {
        self.get(key).and_then(Value::as_date)
    }

    /// Looks up an array under `key`.
    #[must_use]
    pub fn get_array(&self, key: &str) -> Option<&[Value]> {
        self.get(key).and_then(Value::as_array)
    }

    /// Looks up a nested dictionary under `key`.
    #[must_use]
    pub fn get_dict(&self, key: &str) -> Option<&BTreeMap<String, Value>> {
        self.get(key).and_then(Value::as_dict)
    }
}

/// Decodes a property list from raw bytes, auto-detecting the binary or
/// XML serialization from its magic prefix.
///
/// # Errors
///
/// Returns [`PreviewError::MalformedPlist`] when the bytes match neither
/// serialization or the matched serialization is structurally damaged.
pub fn decode(bytes: &[u8]) -> Result<Value> {
    if bytes.starts_with(BPLIST_MAGIC) {
        return binary::decode(bytes);
    }
    if looks_like_xml(bytes) {
        return xml::decode(bytes);
    }
    Err(PreviewError::MalformedPlist(
        "unrecognized serialization: neither bplist00 nor XML".into(),
    ))
}

/// True when the bytes plausibly start an XML document (optionally after
/// a UTF-8 BOM and whitespace).
fn looks_like_xml(bytes: &[u8]) -> bool {
    let rest = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    rest.iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'<')
}
