//! Stream Reassembler Module
//!
//! Turns an unbounded byte stream into complete fixed-width frames.
//!
//! Pipes deliver bytes in whatever chunk sizes the OS chooses, so one read is
//! never assumed to be one frame. Partial data is buffered in a `BytesMut`
//! until a full [`FRAME_SIZE`] frame is available; coalesced reads yield
//! several frames.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::frame::{Frame, FRAME_SIZE};
use crate::error::{ProtocolError, Result};

/// Read granularity for the underlying stream.
const READ_CAPACITY: usize = 8 * FRAME_SIZE;

// == Frame Assembler ==
/// Synchronous frame accumulator.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: BytesMut,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(READ_CAPACITY),
        }
    }

    /// Appends a chunk and returns every frame it completes, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::with_capacity(self.buffer.len() / FRAME_SIZE);
        while let Some(frame) = self.next_frame() {
            frames.push(frame);
        }
        frames
    }

    /// Takes the next complete frame out of the buffer, if there is one.
    pub fn next_frame(&mut self) -> Option<Frame> {
        if self.buffer.len() < FRAME_SIZE {
            return None;
        }

        let mut frame = [0u8; FRAME_SIZE];
        frame.copy_from_slice(&self.buffer[..FRAME_SIZE]);
        self.buffer.advance(FRAME_SIZE);
        Some(frame)
    }

    /// Number of buffered bytes not yet forming a frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drops any partial frame.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

// == Frame Reader ==
/// Async frame source over any byte stream.
///
/// `next_frame` can be called repeatedly for the life of the stream, and is
/// cancel-safe: dropping a pending call loses no buffered bytes.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    assembler: FrameAssembler,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            assembler: FrameAssembler::new(),
        }
    }

    /// Waits for the next complete frame.
    ///
    /// Returns `Ok(None)` when the stream ends on a frame boundary, and
    /// [`ProtocolError::TruncatedFrame`] when it ends mid-frame.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.assembler.next_frame() {
                return Ok(Some(frame));
            }

            self.assembler.buffer.reserve(READ_CAPACITY);
            let read = self.inner.read_buf(&mut self.assembler.buffer).await?;

            if read == 0 {
                return match self.assembler.pending() {
                    0 => Ok(None),
                    len => Err(ProtocolError::TruncatedFrame { len }.into()),
                };
            }
        }
    }

    /// Bytes buffered towards the next frame.
    pub fn pending(&self) -> usize {
        self.assembler.pending()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use crate::protocol::{encode_get, encode_insert, encode_remove};

    fn sample_stream() -> (Vec<Frame>, Vec<u8>) {
        let frames = vec![
            encode_insert("user:1", "alice", 5).unwrap(),
            encode_get("user:1").unwrap(),
            encode_remove("user:1").unwrap(),
        ];
        let bytes = frames.iter().flat_map(|f| f.iter().copied()).collect();
        (frames, bytes)
    }

    #[test]
    fn test_assembler_whole_frames() {
        let (frames, bytes) = sample_stream();
        let mut assembler = FrameAssembler::new();

        assert_eq!(assembler.push(&bytes), frames);
        assert!(assembler.is_empty());
    }

    #[test]
    fn test_assembler_one_byte_at_a_time() {
        let (frames, bytes) = sample_stream();
        let mut assembler = FrameAssembler::new();

        let mut out = Vec::new();
        for byte in &bytes {
            out.extend(assembler.push(std::slice::from_ref(byte)));
        }

        assert_eq!(out, frames);
    }

    #[test]
    fn test_assembler_keeps_remainder() {
        let (frames, bytes) = sample_stream();
        let mut assembler = FrameAssembler::new();

        let out = assembler.push(&bytes[..FRAME_SIZE + 10]);
        assert_eq!(out, vec![frames[0]]);
        assert_eq!(assembler.pending(), 10);

        let out = assembler.push(&bytes[FRAME_SIZE + 10..]);
        assert_eq!(out, vec![frames[1], frames[2]]);
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn test_assembler_clear() {
        let mut assembler = FrameAssembler::new();
        assembler.push(&[1, 2, 3]);
        assembler.clear();
        assert!(assembler.is_empty());
    }

    #[tokio::test]
    async fn test_reader_with_split_reads() {
        let (frames, bytes) = sample_stream();
        let mock = tokio_test::io::Builder::new()
            .read(&bytes[..3])
            .read(&bytes[3..200])
            .read(&bytes[200..])
            .build();
        let mut reader = FrameReader::new(mock);

        for expected in &frames {
            assert_eq!(reader.next_frame().await.unwrap().as_ref(), Some(expected));
        }
        assert!(reader.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reader_reports_truncated_frame() {
        let (_, bytes) = sample_stream();
        let mock = tokio_test::io::Builder::new()
            .read(&bytes[..FRAME_SIZE + 5])
            .build();
        let mut reader = FrameReader::new(mock);

        assert!(reader.next_frame().await.unwrap().is_some());
        let err = reader.next_frame().await.unwrap_err();
        assert!(matches!(
            err,
            CacheError::Protocol(ProtocolError::TruncatedFrame { len: 5 })
        ));
    }
}
