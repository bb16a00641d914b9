use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

/// A decoded field value.
///
/// Fixed-width fields decode to [`Value::Uint`]; variable-length fields
/// are passed through untouched as [`Value::Bytes`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Uint(u64),
    Bytes(Bytes),
}

impl Value {
    #[must_use]
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Self::Uint(n) => Some(*n),
            Self::Bytes(_) => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(b) => Some(b),
            Self::Uint(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uint(n) => write!(f, "{n}"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Byte order used to turn a fixed-width field into an integer.
///
/// ```text
/// bytes [05 00 00 00]
///   Little → 5          byte[i] << (8 * i)
///   Big    → 83886080   byte[i] * 256^(len - 1 - i)
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// Decode up to eight bytes as an unsigned integer.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> u64 {
        match self {
            Self::Little => bytes
                .iter()
                .enumerate()
                .fold(0, |acc, (i, &b)| acc | u64::from(b) << (8 * i)),
            Self::Big => bytes.iter().fold(0, |acc, &b| acc << 8 | u64::from(b)),
        }
    }
}

impl FromStr for ByteOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "le" | "little" => Ok(Self::Little),
            "be" | "big" => Ok(Self::Big),
            other => Err(format!("unknown byte order {other:?} (expected le or be)")),
        }
    }
}

/// Values decoded by one schema, keyed by entry name.
///
/// Each schema owns exactly one record. Its fields' callbacks and its
/// completion hook see it; nothing else does while decoding runs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// The named value, if it was decoded as an integer.
    #[must_use]
    pub fn uint(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(Value::as_uint)
    }

    /// The named value, if it was decoded as raw bytes.
    #[must_use]
    pub fn bytes(&self, name: &str) -> Option<&Bytes> {
        self.get(name).and_then(Value::as_bytes)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn insert(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_owned(), value);
    }
}
