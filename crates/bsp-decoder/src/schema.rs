use std::collections::HashSet;
use std::fmt;

use crate::control::Control;
use crate::error::SchemaError;
use crate::field::{Field, FieldType, SizeSource};
use crate::value::{ByteOrder, Record};

/// Completion hook, fired each time a schema drains its queue.
///
/// Receives the effective repeat count, the schema's own record and a
/// [`Control`] handle.
pub type FinishHook = Box<dyn FnMut(RepeatValue, &Record, &mut Control)>;

/// How many times a schema's entries are decoded per activation.
///
/// ```text
/// ┌─────────────┬────────────────────────────────────────────────────┐
/// │ Repeat      │ Behaviour                                          │
/// ├─────────────┼────────────────────────────────────────────────────┤
/// │ Once        │ entries decoded once (the default)                 │
/// │ Times(n)    │ entries walked n times in declaration order        │
/// │ Sibling(s)  │ n read from `s` in the parent's record at descent  │
/// │ Forever     │ one cycle per activation, re-entered until the     │
/// │             │ input ends                                         │
/// └─────────────┴────────────────────────────────────────────────────┘
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Repeat {
    #[default]
    Once,
    Times(u64),
    Sibling(String),
    Forever,
}

/// The repeat value handed to a completion hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepeatValue {
    Count(u64),
    Forever,
}

/// Lazy decode order: entry indices `0..width`, repeated `passes` times.
///
/// Holds only a position, so a repeat count read off the wire costs
/// nothing until entries are actually decoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct EntryCursor {
    next: usize,
    width: usize,
    passes: u64,
}

impl EntryCursor {
    pub(crate) fn new(width: usize, passes: u64) -> Self {
        let passes = if width == 0 { 0 } else { passes };
        Self { next: 0, width, passes }
    }

    pub(crate) fn remaining(&self) -> u64 {
        (self.width as u64)
            .saturating_mul(self.passes)
            .saturating_sub(self.next as u64)
    }

    pub(crate) fn clear(&mut self) {
        self.next = 0;
        self.passes = 0;
    }
}

impl Iterator for EntryCursor {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.passes == 0 {
            return None;
        }
        let idx = self.next;
        self.next += 1;
        if self.next == self.width {
            self.next = 0;
            self.passes -= 1;
        }
        Some(idx)
    }
}

/// One declared entry: a primitive field or a nested schema.
pub(crate) struct Entry {
    pub(crate) name: String,
    pub(crate) kind: EntryKind,
}

pub(crate) enum EntryKind {
    Field(Field),
    /// While the nested schema is being decoded it lives on the decoder's
    /// frame stack and this slot holds an empty placeholder.
    Nested(Schema),
}

/// A named, ordered set of entries plus the state of its activation.
///
/// Schemas are built with [`Schema::builder`] and handed to a
/// [`Decoder`](crate::Decoder). The declaration is fixed after `build`;
/// everything else (record, queue, flags) is run-time state the decoder
/// drives.
///
/// ```text
/// ┌───────────────────────────────────────────────┐
/// │ Schema "chunk"               repeat: Forever  │
/// │   length : U32                                │
/// │   type   : Bytes(4)                           │
/// │   data   : Bytes(sibling "length")            │
/// │   crc    : U32                                │
/// ├───────────────────────────────────────────────┤
/// │ values   { length: 13, type: "IHDR", ... }    │
/// │ queue    [crc]          ← drains as fields go │
/// └───────────────────────────────────────────────┘
/// ```
pub struct Schema {
    pub(crate) name: String,
    pub(crate) entries: Vec<Entry>,
    pub(crate) repeat: Repeat,
    pub(crate) byte_order: Option<ByteOrder>,
    pub(crate) on_finished: Option<FinishHook>,

    pub(crate) values: Record,
    /// Indexes into `entries`, in decode order.
    pub(crate) queue: EntryCursor,
    pub(crate) expanded: bool,
    pub(crate) finished: bool,
    /// Repeat count read from the parent's record at the last descent.
    pub(crate) resolved_repeat: Option<u64>,
}

impl Schema {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            entries: Vec::new(),
            repeat: Repeat::Once,
            byte_order: None,
            on_finished: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Values decoded so far.
    #[must_use]
    pub fn values(&self) -> &Record {
        &self.values
    }

    #[must_use]
    pub fn repeat(&self) -> &Repeat {
        &self.repeat
    }

    /// Byte order in effect: declared, or fixed at first activation.
    #[must_use]
    pub fn byte_order(&self) -> Option<ByteOrder> {
        self.byte_order
    }

    #[must_use]
    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Entries still waiting to be decoded in this activation.
    ///
    /// Saturates at `u64::MAX` for very large repeat counts.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.queue.remaining()
    }

    /// Entry names in declaration order.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.entries.iter().find_map(|e| match &e.kind {
            EntryKind::Field(f) if e.name == name => Some(f),
            _ => None,
        })
    }

    /// A nested schema by entry name.
    ///
    /// Returns the placeholder while that schema is itself being decoded.
    #[must_use]
    pub fn nested(&self, name: &str) -> Option<&Schema> {
        self.entries.iter().find_map(|e| match &e.kind {
            EntryKind::Nested(s) if e.name == name => Some(s),
            _ => None,
        })
    }

    pub(crate) fn is_forever(&self) -> bool {
        self.repeat == Repeat::Forever
    }

    /// The repeat count for a non-forever schema, if it is known.
    pub(crate) fn repeat_count(&self) -> Option<u64> {
        match &self.repeat {
            Repeat::Once | Repeat::Forever => Some(1),
            Repeat::Times(n) => Some(*n),
            Repeat::Sibling(_) => self.resolved_repeat,
        }
    }

    pub(crate) fn repeat_value(&self) -> RepeatValue {
        if self.is_forever() {
            RepeatValue::Forever
        } else {
            RepeatValue::Count(self.repeat_count().unwrap_or(1))
        }
    }

    /// Derive the decode queue from the declaration.
    ///
    /// Idempotent for ordinary schemas: the first call points the cursor
    /// at `repeat_count` passes over the entries and marks the schema
    /// expanded, later
    /// calls do nothing. Forever schemas are never marked expanded; every
    /// call lays out one fresh cycle and resets the fields' consumed flags.
    ///
    /// Returns `false` when the repeat count refers to a sibling that was
    /// never resolved.
    pub(crate) fn expand(&mut self) -> bool {
        if self.is_forever() {
            self.queue = EntryCursor::new(self.entries.len(), 1);
            self.reset_fields();
            return true;
        }
        if self.expanded {
            return true;
        }
        let Some(count) = self.repeat_count() else {
            return false;
        };

        self.queue = EntryCursor::new(self.entries.len(), count);
        self.reset_fields();
        self.expanded = true;
        true
    }

    fn reset_fields(&mut self) {
        for entry in &mut self.entries {
            if let EntryKind::Field(field) = &mut entry.kind {
                field.consumed = false;
            }
        }
    }

    pub(crate) fn fire_finished(&mut self, repeat: RepeatValue, control: &mut Control) {
        if let Some(hook) = self.on_finished.as_mut() {
            hook(repeat, &self.values, control);
        }
    }

    /// Empty stand-in left in a parent's entry while the real nested
    /// schema sits on the decoder's frame stack.
    pub(crate) fn placeholder() -> Self {
        Self {
            name: String::new(),
            entries: Vec::new(),
            repeat: Repeat::Once,
            byte_order: None,
            on_finished: None,
            values: Record::default(),
            queue: EntryCursor::default(),
            expanded: false,
            finished: false,
            resolved_repeat: None,
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("entries", &self.entry_names().collect::<Vec<_>>())
            .field("repeat", &self.repeat)
            .field("byte_order", &self.byte_order)
            .field("values", &self.values)
            .field("remaining", &self.queue.remaining())
            .field("expanded", &self.expanded)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Schema`].
///
/// Entries decode in the order they are added.
///
/// ```rust
/// use bsp_decoder::{Field, Schema};
///
/// let schema = Schema::builder("string")
///     .field("size", Field::u32())
///     .field("data", Field::bytes("size"))
///     .build()
///     .unwrap();
///
/// assert_eq!(schema.entry_names().collect::<Vec<_>>(), ["size", "data"]);
/// ```
pub struct SchemaBuilder {
    name: String,
    entries: Vec<Entry>,
    repeat: Repeat,
    byte_order: Option<ByteOrder>,
    on_finished: Option<FinishHook>,
}

impl SchemaBuilder {
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.entries.push(Entry {
            name: name.into(),
            kind: EntryKind::Field(field),
        });
        self
    }

    #[must_use]
    pub fn nested(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.entries.push(Entry {
            name: name.into(),
            kind: EntryKind::Nested(schema),
        });
        self
    }

    #[must_use]
    pub fn repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = repeat;
        self
    }

    /// Pin the byte order instead of inheriting the decoder's default.
    #[must_use]
    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = Some(order);
        self
    }

    #[must_use]
    pub fn on_finished<F>(mut self, hook: F) -> Self
    where
        F: FnMut(RepeatValue, &Record, &mut Control) + 'static,
    {
        self.on_finished = Some(Box::new(hook));
        self
    }

    /// Validate the declaration and produce the schema.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::EmptyEntryName`] if an entry was added as `""`.
    /// - [`SchemaError::DuplicateEntry`] if two entries share a name.
    /// - [`SchemaError::EmptySizeSource`] if a bytes field is sized by `""`.
    /// - [`SchemaError::EmptyRepeatSource`] if the repeat sibling is `""`.
    /// - [`SchemaError::EmptyForever`] for a forever schema with no entries.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let schema = &self.name;
        let mut seen = HashSet::new();

        for entry in &self.entries {
            if entry.name.is_empty() {
                return Err(SchemaError::EmptyEntryName {
                    schema: schema.clone(),
                });
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(SchemaError::DuplicateEntry {
                    schema: schema.clone(),
                    entry: entry.name.clone(),
                });
            }
            if let EntryKind::Field(field) = &entry.kind
                && matches!(&field.ty, FieldType::Bytes(SizeSource::Sibling(s)) if s.is_empty())
            {
                return Err(SchemaError::EmptySizeSource {
                    schema: schema.clone(),
                    entry: entry.name.clone(),
                });
            }
        }

        match &self.repeat {
            Repeat::Sibling(source) if source.is_empty() => {
                return Err(SchemaError::EmptyRepeatSource {
                    schema: schema.clone(),
                });
            }
            Repeat::Forever if self.entries.is_empty() => {
                return Err(SchemaError::EmptyForever {
                    schema: schema.clone(),
                });
            }
            _ => {}
        }

        Ok(Schema {
            name: self.name,
            entries: self.entries,
            repeat: self.repeat,
            byte_order: self.byte_order,
            on_finished: self.on_finished,
            ..Schema::placeholder()
        })
    }
}
