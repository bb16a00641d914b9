use std::fmt;

use bsp_stream::ByteStream;
use bytes::Bytes;

use crate::config::DecoderConfig;
use crate::control::Control;
use crate::error::DecodeError;
use crate::field::{FieldType, SizeSource};
use crate::observer::{DecodeObserver, NoopObserver};
use crate::schema::{EntryKind, Repeat, RepeatValue, Schema};
use crate::value::{ByteOrder, Value};

/// Where a decoder stands after its last step.
///
/// ```text
///   Idle ──activate──▶ Waiting ⇄ (push) ──▶ Finished
///                         │
///                         ├── end_stream at a forever cycle boundary ──▶ Ended
///                         ├── end_stream mid-field ────────────────────▶ Truncated
///                         └── abort / caller error ────────────────────▶ Aborted
/// ```
///
/// `Ended` and `Truncated` separate a stream that stopped cleanly between
/// two cycles of a forever schema from one that was cut inside a record.
/// Neither is an error: the decoded values stay available through
/// [`Decoder::take_schemas`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    /// No schema has been activated since creation or the last reset.
    Idle,

    /// The active field needs more bytes than are buffered.
    Waiting {
        schema: String,
        field: String,
        needed: usize,
        available: usize,
    },

    /// A forever cycle completed without consuming a byte. The next
    /// append runs the following cycle.
    Paused { schema: String },

    /// The bottom schema finished and nothing is suspended.
    Finished,

    /// End of input arrived exactly on a forever cycle boundary.
    Ended,

    /// End of input arrived while `field` still lacked `missing` bytes.
    Truncated {
        schema: String,
        field: String,
        missing: usize,
    },

    /// Decoding was abandoned by [`Decoder::abort`], [`Control::abort`] or
    /// a [`DecodeError`].
    Aborted,
}

impl Status {
    /// `true` once decoding has stopped for good.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished | Self::Ended | Self::Truncated { .. } | Self::Aborted
        )
    }
}

/// One-shot hook fired when the decoder's stack empties normally.
pub type CompletionHook = Box<dyn FnOnce(&Schema)>;

/// Where a frame's schema goes when it is popped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Home {
    /// Activated by the caller; handed back through `take_schemas`.
    Detached,
    /// Nested entry `usize` of the schema in the frame below.
    Parent(usize),
}

/// An activation on the suspension stack.
struct Frame {
    schema: Schema,
    /// Entry index of a field waiting for bytes.
    pending: Option<usize>,
    home: Home,
    /// Stream offset when the current forever cycle began.
    cycle_start: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Continue,
    Stop,
}

/// Incremental, schema-driven decoder over a growing [`ByteStream`].
///
/// The decoder holds a stack of activation frames. The top frame is the
/// active schema; the ones below it are suspended parents, each with its
/// queue and pending field intact. Every call that can make progress
/// ([`push`](Self::push), [`end_stream`](Self::end_stream),
/// [`activate`](Self::activate)) runs the transition loop until it has to
/// wait for bytes or the stack empties:
///
/// ```text
///   loop:
///     pending field?     ── enough bytes ─▶ decode, store, callback
///                        └─ short ────────▶ wait (or stop at end of input)
///     queue front?       ── nested ───────▶ resolve repeat, descend / skip
///                        └─ field ────────▶ resolve size, zero fires now
///     queue empty        ── forever ──────▶ hook, fresh cycle
///                        └─ otherwise ────▶ hook, pop, resume parent
/// ```
///
/// Decoding is independent of how the input is chunked: the same bytes
/// produce the same callbacks whether they arrive at once or one at a time.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// use bsp_decoder::{Decoder, Field, Schema};
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = Rc::clone(&seen);
///
/// let schema = Schema::builder("string")
///     .field("size", Field::u32())
///     .field(
///         "data",
///         Field::bytes("size").on_decode(move |value, _, _| {
///             sink.borrow_mut().push(value.clone());
///         }),
///     )
///     .build()
///     .unwrap();
///
/// let mut decoder = Decoder::new();
/// decoder.activate(schema).unwrap();
/// decoder.push(&b"\x05\x00\x00\x0012345"[..]).unwrap();
///
/// assert_eq!(&seen.borrow()[0].as_bytes().unwrap()[..], b"12345");
/// ```
pub struct Decoder {
    stream: ByteStream,
    frames: Vec<Frame>,
    /// Finished or abandoned caller-activated schemas.
    detached: Vec<Schema>,
    /// Bytes permanently consumed from the stream.
    offset: usize,
    end_of_stream: bool,
    byte_order: ByteOrder,
    pub(crate) read_chunk_size: usize,
    status: Status,
    on_finished: Option<CompletionHook>,
    observer: Box<dyn DecodeObserver>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    #[must_use]
    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            stream: ByteStream::new(),
            frames: Vec::new(),
            detached: Vec::new(),
            offset: 0,
            end_of_stream: false,
            byte_order: config.byte_order,
            read_chunk_size: config.read_chunk_size,
            status: Status::Idle,
            on_finished: None,
            observer: Box::new(NoopObserver),
        }
    }

    /// Decoder over bytes that were buffered beforehand. They are decoded
    /// as soon as a schema is activated.
    #[must_use]
    pub fn with_stream(stream: ByteStream) -> Self {
        Self {
            stream,
            ..Self::new()
        }
    }

    /// Set the default byte order. Schemas already activated keep theirs.
    pub fn set_byte_order(&mut self, order: ByteOrder) -> &mut Self {
        self.byte_order = order;
        self
    }

    #[must_use]
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn set_observer(&mut self, observer: impl DecodeObserver + 'static) -> &mut Self {
        self.observer = Box::new(observer);
        self
    }

    /// Register a hook fired once, the first time the stack empties
    /// because its bottom schema finished. Receives that schema.
    pub fn on_finished(&mut self, hook: impl FnOnce(&Schema) + 'static) -> &mut Self {
        self.on_finished = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Bytes consumed so far.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn stream(&self) -> &ByteStream {
        &self.stream
    }

    /// Current nesting depth; 0 when nothing is active.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.frames.is_empty()
    }

    #[must_use]
    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    /// Hand back every caller-activated schema that has finished or been
    /// abandoned, in the order they left the stack. Their records hold
    /// whatever was decoded.
    pub fn take_schemas(&mut self) -> Vec<Schema> {
        std::mem::take(&mut self.detached)
    }

    /// Append a chunk and decode everything it completes.
    ///
    /// # Errors
    ///
    /// Any [`DecodeError`] raised while decoding; the decoder is aborted
    /// before it is returned.
    pub fn push(&mut self, chunk: impl Into<Bytes>) -> Result<(), DecodeError> {
        self.stream.push(chunk);
        self.run()
    }

    /// Signal that no more input will arrive.
    ///
    /// If the active field is short of bytes, decoding stops now with
    /// [`Status::Truncated`] (or [`Status::Ended`] on a forever cycle
    /// boundary). Otherwise the flag stays armed and is honoured the next
    /// time a field comes up short.
    ///
    /// # Errors
    ///
    /// As for [`push`](Self::push).
    pub fn end_stream(&mut self) -> Result<(), DecodeError> {
        self.end_of_stream = true;
        self.run()
    }

    /// Make `schema` the active schema and decode whatever is buffered.
    ///
    /// An unfinished active schema is suspended beneath it and resumes,
    /// exactly where it paused, once `schema` finishes.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::UnresolvedRepeat`] if `schema` repeats by sibling
    ///   reference: a caller-activated schema has no parent record.
    /// - Anything [`push`](Self::push) can return.
    pub fn activate(&mut self, schema: Schema) -> Result<(), DecodeError> {
        let result = self.enter(schema, Home::Detached).and_then(|()| self.drive());
        self.settle(result)
    }

    /// Abandon decoding. Queues are discarded, no completion hook fires,
    /// decoded values are kept. Idempotent; a no-op when nothing is active.
    pub fn abort(&mut self) {
        if self.is_active() {
            self.terminate(Status::Aborted);
        }
    }

    /// Drop all schema state and rewind to the start of the stream.
    ///
    /// Buffered bytes are kept, so a schema activated afterwards decodes
    /// from offset 0 again. End-of-stream is disarmed.
    pub fn reset(&mut self) -> &mut Self {
        self.unwind();
        self.offset = 0;
        self.end_of_stream = false;
        self.status = Status::Idle;
        self
    }

    fn run(&mut self) -> Result<(), DecodeError> {
        let result = self.drive();
        self.settle(result)
    }

    fn settle(&mut self, result: Result<(), DecodeError>) -> Result<(), DecodeError> {
        if result.is_err() {
            self.terminate(Status::Aborted);
        }
        result
    }

    // ── Transition loop ───────────────────────────────────────────────────

    fn drive(&mut self) -> Result<(), DecodeError> {
        while let Some(top) = self.frames.len().checked_sub(1) {
            let step = if let Some(idx) = self.frames[top].pending {
                self.decode_pending(top, idx)?
            } else if let Some(idx) = self.frames[top].schema.queue.next() {
                self.enter_entry(top, idx)?
            } else {
                self.complete_pass(top)?
            };

            if step == Step::Stop {
                break;
            }
        }
        Ok(())
    }

    /// Push a schema frame, fixing its byte order and expanding its queue.
    fn enter(&mut self, mut schema: Schema, home: Home) -> Result<(), DecodeError> {
        schema.byte_order.get_or_insert(self.byte_order);

        if !schema.expand() {
            let err = DecodeError::UnresolvedRepeat {
                schema: schema.name.clone(),
                parent: String::new(),
                source_name: match &schema.repeat {
                    Repeat::Sibling(source) => source.clone(),
                    _ => String::new(),
                },
            };
            self.detached.push(schema);
            return Err(err);
        }

        self.observer
            .schema_activated(&schema.name, self.frames.len() + 1);
        self.frames.push(Frame {
            schema,
            pending: None,
            home,
            cycle_start: self.offset,
        });
        Ok(())
    }

    /// Try to decode the field waiting at entry `idx` of the top frame.
    fn decode_pending(&mut self, top: usize, idx: usize) -> Result<Step, DecodeError> {
        let available = self.stream.available().saturating_sub(self.offset);
        let frame = &mut self.frames[top];
        let schema = &mut frame.schema;
        let entry = &mut schema.entries[idx];
        let EntryKind::Field(field) = &mut entry.kind else {
            frame.pending = None;
            return Ok(Step::Continue);
        };

        let size = field.size;
        if available < size {
            let waiting = (schema.name.clone(), entry.name.clone());
            return Ok(self.starve(waiting, size, available));
        }

        let start = self.offset;
        let data = self.stream.window(start, start + size)?;
        self.offset += size;
        field.consumed = true;
        frame.pending = None;

        let value = match field.ty {
            FieldType::Bytes(_) => Value::Bytes(data),
            _ => Value::Uint(
                schema
                    .byte_order
                    .unwrap_or(self.byte_order)
                    .decode(&data),
            ),
        };
        schema.values.insert(&entry.name, value.clone());
        self.observer
            .field_decoded(&schema.name, &entry.name, start, size);

        let mut control = Control::default();
        field.fire(&value, &schema.values, &mut control);
        self.apply(control)
    }

    /// The active field is short of bytes: wait, or stop at end of input.
    fn starve(&mut self, (schema, field): (String, String), needed: usize, available: usize) -> Step {
        if !self.end_of_stream {
            self.observer.field_waiting(&schema, &field, needed, available);
            self.status = Status::Waiting {
                schema,
                field,
                needed,
                available,
            };
            return Step::Stop;
        }

        // Nothing buffered and nothing consumed since the innermost
        // forever cycle began: the input ended between records.
        let on_boundary = available == 0
            && self
                .frames
                .iter()
                .rev()
                .find(|f| f.schema.is_forever())
                .is_some_and(|f| f.cycle_start == self.offset);

        let status = if on_boundary {
            Status::Ended
        } else {
            Status::Truncated {
                schema,
                field,
                missing: needed - available,
            }
        };
        self.terminate(status);
        Step::Stop
    }

    /// Start the entry at the front of the top frame's queue.
    fn enter_entry(&mut self, top: usize, idx: usize) -> Result<Step, DecodeError> {
        let frame = &mut self.frames[top];
        let schema = &mut frame.schema;
        let entry = &mut schema.entries[idx];
        let mut control = Control::default();

        match &mut entry.kind {
            EntryKind::Nested(nested) => {
                // Resolved against this schema's record, now that the
                // sibling may have been decoded.
                if let Repeat::Sibling(source) = &nested.repeat {
                    let Some(count) = schema.values.uint(source) else {
                        return Err(DecodeError::UnresolvedRepeat {
                            schema: nested.name.clone(),
                            parent: schema.name.clone(),
                            source_name: source.clone(),
                        });
                    };
                    nested.resolved_repeat = Some(count);
                }

                if nested.repeat_count() == Some(0) {
                    nested.fire_finished(RepeatValue::Count(0), &mut control);
                    return self.apply(control);
                }

                let child = std::mem::replace(nested, Schema::placeholder());
                self.enter(child, Home::Parent(idx))?;
                Ok(Step::Continue)
            }
            EntryKind::Field(field) => {
                field.consumed = false;
                field.size = match &field.ty {
                    FieldType::Bytes(SizeSource::Literal(n)) => *n,
                    FieldType::Bytes(SizeSource::Sibling(source)) => {
                        let resolved = schema.values.uint(source).ok_or_else(|| {
                            DecodeError::UnresolvedSize {
                                schema: schema.name.clone(),
                                field: entry.name.clone(),
                                source_name: source.clone(),
                            }
                        })?;
                        usize::try_from(resolved).map_err(|_| DecodeError::SizeTooLarge {
                            schema: schema.name.clone(),
                            field: entry.name.clone(),
                            size: resolved,
                        })?
                    }
                    fixed => fixed.fixed_width().unwrap_or(0),
                };

                if field.size == 0 {
                    field.consumed = true;
                    field.fire(&Value::Uint(0), &schema.values, &mut control);
                    return self.apply(control);
                }

                frame.pending = Some(idx);
                Ok(Step::Continue)
            }
        }
    }

    /// The top frame's queue is empty: fire its hook, then cycle or pop.
    fn complete_pass(&mut self, top: usize) -> Result<Step, DecodeError> {
        let frame = &mut self.frames[top];
        let repeat = frame.schema.repeat_value();
        self.observer
            .schema_finished(&frame.schema.name, repeat, top + 1);

        let mut control = Control::default();
        frame.schema.fire_finished(repeat, &mut control);

        if frame.schema.is_forever() {
            let progressed = self.offset > frame.cycle_start;
            frame.cycle_start = self.offset;
            frame.schema.expand();
            let name = frame.schema.name.clone();

            let step = self.apply(control)?;
            if step == Step::Stop || progressed {
                return Ok(step);
            }
            if self.end_of_stream {
                self.terminate(Status::Ended);
            } else {
                self.status = Status::Paused { schema: name };
            }
            return Ok(Step::Stop);
        }

        frame.schema.finished = true;
        if let Some(frame) = self.frames.pop() {
            self.release(frame);
        }

        let step = self.apply(control)?;
        if step == Step::Continue && self.frames.is_empty() {
            self.status = Status::Finished;
            if let Some(hook) = self.on_finished.take()
                && let Some(root) = self.detached.last()
            {
                hook(root);
            }
        }
        Ok(step)
    }

    /// Apply what a callback asked for.
    fn apply(&mut self, control: Control) -> Result<Step, DecodeError> {
        if control.is_noop() {
            return Ok(Step::Continue);
        }
        let Control {
            chunks,
            end_stream,
            abort,
            byte_order,
            activations,
        } = control;

        self.stream.extend(chunks);
        self.end_of_stream |= end_stream;
        if let Some(order) = byte_order {
            self.byte_order = order;
        }
        if abort {
            self.terminate(Status::Aborted);
            return Ok(Step::Stop);
        }
        for schema in activations {
            self.enter(schema, Home::Detached)?;
        }
        Ok(Step::Continue)
    }

    // ── Unwinding ─────────────────────────────────────────────────────────

    fn terminate(&mut self, status: Status) {
        self.unwind();
        self.observer.terminated(&status);
        self.status = status;
    }

    /// Pop every frame, discarding queues and returning each schema home.
    fn unwind(&mut self) {
        while let Some(mut frame) = self.frames.pop() {
            frame.schema.queue.clear();
            frame.pending = None;
            self.release(frame);
        }
    }

    /// Return a popped frame's schema to its parent entry or to the caller.
    fn release(&mut self, frame: Frame) {
        match frame.home {
            Home::Detached => self.detached.push(frame.schema),
            Home::Parent(idx) => {
                if let Some(parent) = self.frames.last_mut()
                    && let Some(entry) = parent.schema.entries.get_mut(idx)
                    && let EntryKind::Nested(slot) = &mut entry.kind
                {
                    *slot = frame.schema;
                }
            }
        }
    }
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("status", &self.status)
            .field("offset", &self.offset)
            .field("buffered", &self.stream.len())
            .field("depth", &self.frames.len())
            .field("end_of_stream", &self.end_of_stream)
            .field("byte_order", &self.byte_order)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::field::Field;

    type Log = Rc<RefCell<Vec<String>>>;

    fn log_field(log: &Log, name: &'static str) -> impl FnMut(&Value, &crate::Record, &mut Control) + 'static {
        let log = Rc::clone(log);
        move |value, _, _| log.borrow_mut().push(format!("{name}={value}"))
    }

    fn sized_string(log: &Log) -> Schema {
        Schema::builder("string")
            .field("size", Field::u32().on_decode(log_field(log, "size")))
            .field("data", Field::bytes("size").on_decode(log_field(log, "data")))
            .build()
            .unwrap()
    }

    #[test]
    fn decodes_sized_string_in_one_chunk() {
        let log = Log::default();
        let mut decoder = Decoder::new();
        decoder.activate(sized_string(&log)).unwrap();
        decoder.push(&b"\x05\x00\x00\x0012345"[..]).unwrap();

        assert_eq!(*log.borrow(), ["size=5", "data=<5 bytes>"]);
        assert_eq!(decoder.status(), &Status::Finished);
        assert_eq!(decoder.offset(), 9);

        let schemas = decoder.take_schemas();
        assert_eq!(
            schemas[0].values().bytes("data").map(|b| &b[..]),
            Some(&b"12345"[..])
        );
    }

    #[test]
    fn waits_for_partial_field() {
        let log = Log::default();
        let mut decoder = Decoder::new();
        decoder.activate(sized_string(&log)).unwrap();
        decoder.push(&b"\x05\x00"[..]).unwrap();

        assert!(log.borrow().is_empty());
        assert_eq!(
            decoder.status(),
            &Status::Waiting {
                schema: "string".into(),
                field: "size".into(),
                needed: 4,
                available: 2,
            }
        );
        assert_eq!(decoder.offset(), 0);
    }

    #[test]
    fn truncation_is_reported_not_raised() {
        let log = Log::default();
        let mut decoder = Decoder::new();
        decoder.activate(sized_string(&log)).unwrap();
        decoder.push(&b"\x05\x00\x00\x00123"[..]).unwrap();
        decoder.end_stream().unwrap();

        assert_eq!(
            decoder.status(),
            &Status::Truncated {
                schema: "string".into(),
                field: "data".into(),
                missing: 2,
            }
        );
        assert!(!decoder.is_active());
        // The size survived in the abandoned record
        assert_eq!(decoder.take_schemas()[0].values().uint("size"), Some(5));
    }

    #[test]
    fn unresolved_size_aborts() {
        let schema = Schema::builder("bad")
            .field("data", Field::bytes("missing"))
            .build()
            .unwrap();
        let mut decoder = Decoder::new();
        let err = decoder.activate(schema).unwrap_err();

        assert!(matches!(err, DecodeError::UnresolvedSize { source_name, .. } if source_name == "missing"));
        assert_eq!(decoder.status(), &Status::Aborted);
    }

    #[test]
    fn detached_sibling_repeat_is_rejected() {
        let schema = Schema::builder("rows")
            .field("x", Field::u8())
            .repeat(Repeat::Sibling("count".into()))
            .build()
            .unwrap();
        let mut decoder = Decoder::new();
        let err = decoder.activate(schema).unwrap_err();

        assert!(matches!(err, DecodeError::UnresolvedRepeat { .. }));
        assert_eq!(decoder.take_schemas().len(), 1);
    }

    #[test]
    fn abort_is_idempotent() {
        let mut decoder = Decoder::new();
        decoder.abort();
        assert_eq!(decoder.status(), &Status::Idle);

        decoder.activate(sized_string(&Log::default())).unwrap();
        decoder.abort();
        decoder.abort();
        assert_eq!(decoder.status(), &Status::Aborted);
        assert_eq!(decoder.take_schemas().len(), 1);
    }

    #[test]
    fn reset_rewinds_to_start() {
        let log = Log::default();
        let mut decoder = Decoder::new();
        decoder.push(&b"\x02\x00\x00\x00hi"[..]).unwrap();
        decoder.activate(sized_string(&log)).unwrap();
        assert_eq!(decoder.offset(), 6);

        decoder.reset();
        assert_eq!(decoder.offset(), 0);
        assert_eq!(decoder.status(), &Status::Idle);

        decoder.activate(sized_string(&log)).unwrap();
        assert_eq!(log.borrow().len(), 4);
    }
}
