use bytes::Bytes;

use crate::schema::Schema;
use crate::value::ByteOrder;

/// Requests a callback makes of the decoder that invoked it.
///
/// Callbacks run while the decoder is mid-step, so they cannot touch it
/// directly. They record what they want here instead; the decoder applies
/// it as soon as the callback returns, in this order:
///
/// ```text
///   1. append pushed chunks to the stream
///   2. arm end-of-stream
///   3. change the default byte order (affects later first activations)
///   4. abort, discarding everything still queued
///   5. activate ad hoc schemas on top of the current one
/// ```
#[derive(Default)]
pub struct Control {
    pub(crate) chunks: Vec<Bytes>,
    pub(crate) end_stream: bool,
    pub(crate) abort: bool,
    pub(crate) byte_order: Option<ByteOrder>,
    pub(crate) activations: Vec<Schema>,
}

impl Control {
    /// Append bytes to the decoder's stream. Decoding simply continues
    /// over them.
    pub fn push(&mut self, chunk: impl Into<Bytes>) -> &mut Self {
        self.chunks.push(chunk.into());
        self
    }

    /// Signal that no more input will arrive.
    pub fn end_stream(&mut self) -> &mut Self {
        self.end_stream = true;
        self
    }

    /// Stop decoding. Nothing still queued is decoded and no further
    /// completion hook fires.
    pub fn abort(&mut self) -> &mut Self {
        self.abort = true;
        self
    }

    pub fn set_byte_order(&mut self, order: ByteOrder) -> &mut Self {
        self.byte_order = Some(order);
        self
    }

    /// Suspend the current schema and decode `schema` from the current
    /// stream position. The current schema resumes where it paused once
    /// `schema` finishes.
    pub fn activate(&mut self, schema: Schema) -> &mut Self {
        self.activations.push(schema);
        self
    }

    pub(crate) fn is_noop(&self) -> bool {
        self.chunks.is_empty()
            && !self.end_stream
            && !self.abort
            && self.byte_order.is_none()
            && self.activations.is_empty()
    }
}
