use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::decoder::Decoder;
use crate::error::DecodeError;

/// Drivers that pull input from a reader instead of waiting for
/// [`Decoder::push`].
///
/// Both read in chunks of [`DecoderConfig::read_chunk_size`] bytes, push
/// each chunk as it arrives and signal end of stream at EOF. They stop
/// reading early once decoding has reached a terminal status.
///
/// [`DecoderConfig::read_chunk_size`]: crate::DecoderConfig::read_chunk_size
impl Decoder {
    /// Feed everything `reader` yields, then end the stream.
    ///
    /// Returns the number of bytes read.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::Io`] if a read fails; the decoder is aborted.
    /// - Anything [`push`](Self::push) or [`end_stream`](Self::end_stream)
    ///   can return.
    pub fn feed_reader<R: Read>(&mut self, mut reader: R) -> Result<usize, DecodeError> {
        let mut total = 0;

        while !self.status().is_terminal() {
            let mut buf = BytesMut::zeroed(self.read_chunk_size.max(1));
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.abort();
                    return Err(e.into());
                }
            };
            buf.truncate(n);
            total += n;
            self.push(buf.freeze())?;
        }

        self.end_stream()?;
        Ok(total)
    }

    /// Async counterpart of [`feed_reader`](Self::feed_reader) for any
    /// tokio [`AsyncRead`] source: files, sockets, HTTP bodies.
    ///
    /// ```rust,no_run
    /// use bsp_decoder::Decoder;
    /// use tokio::io::AsyncRead;
    ///
    /// async fn decode_from(reader: impl AsyncRead + Unpin, mut decoder: Decoder) {
    ///     let read = decoder.feed_async(reader).await.unwrap();
    ///     println!("{read} bytes, {:?}", decoder.status());
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// As for [`feed_reader`](Self::feed_reader).
    pub async fn feed_async<R: AsyncRead + Unpin>(
        &mut self,
        mut reader: R,
    ) -> Result<usize, DecodeError> {
        let mut total = 0;

        while !self.status().is_terminal() {
            let mut buf = BytesMut::zeroed(self.read_chunk_size.max(1));
            let n = match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.abort();
                    return Err(e.into());
                }
            };
            buf.truncate(n);
            total += n;
            self.push(buf.freeze())?;
        }

        self.end_stream()?;
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::config::DecoderConfig;
    use crate::decoder::Status;
    use crate::field::Field;
    use crate::schema::{Repeat, Schema};

    fn records() -> Schema {
        Schema::builder("record")
            .field("len", Field::u8())
            .field("body", Field::bytes("len"))
            .repeat(Repeat::Forever)
            .build()
            .unwrap()
    }

    fn tiny_reads() -> Decoder {
        Decoder::with_config(DecoderConfig {
            read_chunk_size: 3,
            ..DecoderConfig::default()
        })
    }

    #[test]
    fn reader_ends_cleanly_between_records() {
        let mut decoder = tiny_reads();
        decoder.activate(records()).unwrap();
        let read = decoder
            .feed_reader(Cursor::new(b"\x02ab\x03xyz".to_vec()))
            .unwrap();

        assert_eq!(read, 7);
        assert_eq!(decoder.offset(), 7);
        assert_eq!(decoder.status(), &Status::Ended);
    }

    #[test]
    fn reader_reports_truncated_record() {
        let mut decoder = tiny_reads();
        decoder.activate(records()).unwrap();
        decoder
            .feed_reader(Cursor::new(b"\x02ab\x05xy".to_vec()))
            .unwrap();

        assert_eq!(
            decoder.status(),
            &Status::Truncated {
                schema: "record".into(),
                field: "body".into(),
                missing: 3,
            }
        );
    }

    #[tokio::test]
    async fn async_reader_matches_sync_reader() {
        let input = b"\x01a\x04abcd\x00\x02zz".to_vec();

        let mut sync = tiny_reads();
        sync.activate(records()).unwrap();
        sync.feed_reader(Cursor::new(input.clone())).unwrap();

        let mut streamed = tiny_reads();
        streamed.activate(records()).unwrap();
        let read = streamed.feed_async(&input[..]).await.unwrap();

        assert_eq!(read, input.len());
        assert_eq!(streamed.offset(), sync.offset());
        assert_eq!(streamed.status(), sync.status());
    }
}
