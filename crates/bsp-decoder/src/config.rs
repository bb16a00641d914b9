use crate::value::ByteOrder;

/// Default size of the reads issued by the reader drivers.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 8 * 1024;

/// Configuration for a [`Decoder`](crate::Decoder).
///
/// ```text
/// ┌─────────────────┬──────────────────────────────────────────────────┐
/// │ Field           │ Purpose                                          │
/// ├─────────────────┼──────────────────────────────────────────────────┤
/// │ byte_order      │ Default order, fixed into each schema at its     │
/// │                 │ first activation unless the schema declares one  │
/// │ read_chunk_size │ Bytes requested per read by `feed_reader` and    │
/// │                 │ `feed_async`                                     │
/// └─────────────────┴──────────────────────────────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecoderConfig {
    pub byte_order: ByteOrder,
    pub read_chunk_size: usize,
}

impl Default for DecoderConfig {
    /// Little-endian, 8 KiB reads.
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::Little,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}
