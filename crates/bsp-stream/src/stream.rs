use std::collections::VecDeque;

use bytes::{Buf, Bytes, BytesMut};

use crate::error::StreamError;

/// A growing byte buffer assembled from independently pushed chunks.
///
/// Producers hand over chunks of any size; the stream keeps them as-is
/// and presents them as one logical buffer. Nothing is copied on append.
/// Bytes are only materialised when a caller asks for a [`window`], and
/// then only the bytes inside that window.
///
/// ```text
///   logical head
///        │
///        ▼
///   ┌────┬───────────┬──┬─────────────────┐
///   │ c0 │    c1     │c2│       c3        │  ← pushed chunks, in order
///   └────┴───────────┴──┴─────────────────┘
///        └──── window(2, 9) ────┘
///             spans c0..c2, copied once into a single `Bytes`
/// ```
///
/// Positions passed to [`window`] are measured from the logical head.
/// As long as nothing has been [`retire`]d, that is the absolute
/// position in the stream.
///
/// # Length accounting
///
/// [`len`] is the number of appended bytes minus the number of retired
/// bytes. Retiring more than is buffered drives it negative: the excess
/// is remembered as a debt and swallowed from the front of the next
/// pushed chunks.
///
/// [`window`]: Self::window
/// [`retire`]: Self::retire
/// [`len`]: Self::len
#[derive(Clone, Debug, Default)]
pub struct ByteStream {
    chunks: VecDeque<Bytes>,
    len: i64,
    /// Bytes retired past the end of the buffer, owed by future pushes.
    debt: usize,
}

impl ByteStream {
    /// Create an empty stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk to the end of the stream.
    ///
    /// O(1); the chunk is moved in, not copied. Empty chunks are accepted
    /// and ignored.
    pub fn push(&mut self, chunk: impl Into<Bytes>) -> &mut Self {
        let mut chunk = chunk.into();
        self.len += chunk.len() as i64;

        if self.debt > 0 {
            let owed = self.debt.min(chunk.len());
            chunk.advance(owed);
            self.debt -= owed;
        }

        if !chunk.is_empty() {
            self.chunks.push_back(chunk);
        }
        self
    }

    /// Appended bytes minus retired bytes.
    ///
    /// Negative after over-retirement; see the type-level docs.
    #[must_use]
    pub fn len(&self) -> i64 {
        self.len
    }

    /// `true` when no bytes are buffered past the logical head.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Number of bytes currently buffered past the logical head.
    #[must_use]
    pub fn available(&self) -> usize {
        usize::try_from(self.len).unwrap_or(0)
    }

    /// Number of chunks still held by the stream.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Iterate the buffered chunks in order, starting at the logical head.
    ///
    /// The first chunk is already trimmed by any partial retirement.
    pub fn iter_chunks(&self) -> impl Iterator<Item = &Bytes> {
        self.chunks.iter()
    }

    /// Materialise the bytes in `[start, end)`, measured from the head.
    ///
    /// When a single chunk covers the whole range the result shares that
    /// chunk's storage; otherwise the covered pieces are copied into one
    /// fresh buffer.
    ///
    /// # Errors
    ///
    /// - [`StreamError::InvertedRange`] if `start > end`.
    /// - [`StreamError::UnexpectedEof`] if `end` is past the buffered bytes.
    pub fn window(&self, start: usize, end: usize) -> Result<Bytes, StreamError> {
        if start > end {
            return Err(StreamError::InvertedRange { start, end });
        }
        let available = self.available();
        if end > available {
            return Err(StreamError::UnexpectedEof { end, available });
        }
        if start == end {
            return Ok(Bytes::new());
        }

        let mut out: Option<BytesMut> = None;
        let mut pos = 0;

        for chunk in &self.chunks {
            let chunk_end = pos + chunk.len();
            if chunk_end <= start {
                pos = chunk_end;
                continue;
            }

            let from = start.saturating_sub(pos);
            let to = chunk.len().min(end - pos);

            // Fast path: the whole window sits inside this chunk.
            if out.is_none() && pos + to == end {
                return Ok(chunk.slice(from..to));
            }

            out.get_or_insert_with(|| BytesMut::with_capacity(end - start))
                .extend_from_slice(&chunk[from..to]);

            if chunk_end >= end {
                break;
            }
            pos = chunk_end;
        }

        Ok(out.map(BytesMut::freeze).unwrap_or_default())
    }

    /// All buffered bytes as one contiguous block.
    #[must_use]
    pub fn linearize(&self) -> Bytes {
        match self.chunks.len() {
            0 => Bytes::new(),
            1 => self.chunks[0].clone(),
            _ => {
                let mut out = BytesMut::with_capacity(self.available());
                for chunk in &self.chunks {
                    out.extend_from_slice(chunk);
                }
                out.freeze()
            }
        }
    }

    /// Advance the logical head by `n` bytes.
    ///
    /// Fully consumed chunks are dropped. Retiring past the end leaves
    /// [`len`](Self::len) negative and records the excess as debt.
    pub fn retire(&mut self, n: usize) -> &mut Self {
        self.len -= n as i64;

        let mut remaining = n;
        while remaining > 0 {
            let Some(front) = self.chunks.front_mut() else {
                break;
            };
            if front.len() <= remaining {
                remaining -= front.len();
                self.chunks.pop_front();
            } else {
                front.advance(remaining);
                remaining = 0;
            }
        }
        self.debt += remaining;
        self
    }
}

impl From<Bytes> for ByteStream {
    fn from(chunk: Bytes) -> Self {
        let mut stream = Self::new();
        stream.push(chunk);
        stream
    }
}

impl From<Vec<u8>> for ByteStream {
    fn from(chunk: Vec<u8>) -> Self {
        Self::from(Bytes::from(chunk))
    }
}

impl<B: Into<Bytes>> Extend<B> for ByteStream {
    fn extend<I: IntoIterator<Item = B>>(&mut self, iter: I) {
        for chunk in iter {
            self.push(chunk);
        }
    }
}
