use std::fmt;

use crate::control::Control;
use crate::value::{Record, Value};

/// Callback invoked after a field decodes.
///
/// Receives the decoded value, the record of the schema that owns the
/// field (the value is already stored in it), and a [`Control`] handle
/// for steering the decoder.
pub type FieldCallback = Box<dyn FnMut(&Value, &Record, &mut Control)>;

/// Where a variable-length field learns its size.
///
/// ```text
/// ┌──────────────┬────────────────────────────────────────────────┐
/// │ Source       │ Resolved when the field reaches the queue head │
/// ├──────────────┼────────────────────────────────────────────────┤
/// │ Literal(n)   │ n                                              │
/// │ Sibling(s)   │ integer value of `s` in the schema's record    │
/// └──────────────┴────────────────────────────────────────────────┘
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SizeSource {
    Literal(usize),
    Sibling(String),
}

impl From<usize> for SizeSource {
    fn from(n: usize) -> Self {
        Self::Literal(n)
    }
}

impl From<&str> for SizeSource {
    fn from(name: &str) -> Self {
        Self::Sibling(name.to_owned())
    }
}

impl From<String> for SizeSource {
    fn from(name: String) -> Self {
        Self::Sibling(name)
    }
}

/// The atomic field vocabulary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    U8,
    U16,
    U32,
    /// Opaque bytes, passed through without numeric decoding.
    Bytes(SizeSource),
}

impl FieldType {
    /// Width in bytes for the fixed-width kinds, `None` for `Bytes`.
    #[must_use]
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            Self::U8 => Some(1),
            Self::U16 => Some(2),
            Self::U32 => Some(4),
            Self::Bytes(_) => None,
        }
    }
}

/// A primitive schema entry.
///
/// One `Field` exists per declaration and is reused by every repeat
/// cycle of its schema. `consumed` and `size` are run-time state: the
/// size is resolved each time the field reaches the head of the queue.
pub struct Field {
    pub(crate) ty: FieldType,
    pub(crate) callback: Option<FieldCallback>,
    pub(crate) consumed: bool,
    pub(crate) size: usize,
}

impl Field {
    fn new(ty: FieldType) -> Self {
        let size = ty.fixed_width().unwrap_or(0);
        Self {
            ty,
            callback: None,
            consumed: false,
            size,
        }
    }

    /// One-byte unsigned integer.
    #[must_use]
    pub fn u8() -> Self {
        Self::new(FieldType::U8)
    }

    /// Two-byte unsigned integer.
    #[must_use]
    pub fn u16() -> Self {
        Self::new(FieldType::U16)
    }

    /// Four-byte unsigned integer.
    #[must_use]
    pub fn u32() -> Self {
        Self::new(FieldType::U32)
    }

    /// Raw bytes; `size` is a literal length or the name of an earlier
    /// sibling holding it.
    ///
    /// ```rust
    /// use bsp_decoder::Field;
    ///
    /// let fixed = Field::bytes(4);
    /// let sized_by_sibling = Field::bytes("length");
    /// ```
    #[must_use]
    pub fn bytes(size: impl Into<SizeSource>) -> Self {
        Self::new(FieldType::Bytes(size.into()))
    }

    /// Attach the callback fired when this field decodes.
    #[must_use]
    pub fn on_decode<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&Value, &Record, &mut Control) + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn field_type(&self) -> &FieldType {
        &self.ty
    }

    /// Whether the field has decoded during the current activation.
    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Size in bytes as last resolved.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn fire(&mut self, value: &Value, record: &Record, control: &mut Control) {
        if let Some(callback) = self.callback.as_mut() {
            callback(value, record, control);
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("ty", &self.ty)
            .field("consumed", &self.consumed)
            .field("size", &self.size)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_widths() {
        assert_eq!(Field::u8().size(), 1);
        assert_eq!(Field::u16().size(), 2);
        assert_eq!(Field::u32().size(), 4);
        assert_eq!(Field::bytes("len").field_type().fixed_width(), None);
    }

    #[test]
    fn size_source_conversions() {
        assert_eq!(SizeSource::from(4), SizeSource::Literal(4));
        assert_eq!(
            SizeSource::from("length"),
            SizeSource::Sibling("length".into())
        );
    }
}
