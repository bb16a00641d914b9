/// Errors raised by [`ByteStream`](crate::ByteStream) window extraction.
///
/// Appending and retiring never fail. Only `window` can: the caller asked
/// for bytes that are not buffered (yet), or for a range whose end lies
/// before its start.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The requested range ends before it starts.
    #[error("inverted window: start {start} is past end {end}")]
    InvertedRange { start: usize, end: usize },

    /// The requested range runs past the buffered bytes.
    ///
    /// `available` is the number of bytes between the logical head and
    /// the end of the last pushed chunk at the time of the request.
    #[error("window end {end} exceeds the {available} buffered bytes")]
    UnexpectedEof { end: usize, available: usize },
}
