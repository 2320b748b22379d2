use bytes::{BufMut, Bytes, BytesMut};
use std::collections::VecDeque;

/// Default size of a receive block
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Logically contiguous view over physically discontiguous received chunks
///
/// Chunks are kept as they arrived. Parsing works on a [Cursor], which never mutates the
/// buffer, so an incomplete parse leaves everything in place. Only [SegmentedBuffer::advance]
/// releases bytes, once a complete value has been consumed.
#[derive(Debug, Default)]
pub struct SegmentedBuffer {
    segments: VecDeque<Bytes>,
    len: usize,
}

impl SegmentedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a received chunk
    pub fn push(&mut self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }

        self.len += chunk.len();
        self.segments.push_back(chunk);
    }

    /// Total number of unconsumed bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of chunks currently referenced
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Cursor at the first unconsumed byte
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor {
            buffer: self,
            segment: 0,
            offset: 0,
            position: 0,
        }
    }

    /// Releases the given number of bytes from the front
    pub fn advance(&mut self, mut count: usize) {
        debug_assert!(count <= self.len, "advance beyond buffered data");
        count = count.min(self.len);
        self.len -= count;

        while count > 0 {
            let Some(front) = self.segments.front_mut() else {
                break;
            };

            if front.len() <= count {
                count -= front.len();
                self.segments.pop_front();
            } else {
                let _ = front.split_to(count);
                count = 0;
            }
        }
    }

    /// Drops all buffered data
    pub fn clear(&mut self) {
        self.segments.clear();
        self.len = 0;
    }
}

/// Read position inside a [SegmentedBuffer], addressed by (segment, offset)
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buffer: &'a SegmentedBuffer,
    segment: usize,
    offset: usize,
    position: usize,
}

impl<'a> Cursor<'a> {
    /// Number of bytes consumed by this cursor
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of bytes left after the cursor
    pub fn remaining(&self) -> usize {
        self.buffer.len - self.position
    }

    /// Next byte without moving the cursor
    pub fn peek(&self) -> Option<u8> {
        let mut segment = self.segment;
        let mut offset = self.offset;

        while let Some(chunk) = self.buffer.segments.get(segment) {
            if offset < chunk.len() {
                return Some(chunk[offset]);
            }
            segment += 1;
            offset = 0;
        }

        None
    }

    /// Consumes the next byte
    pub fn next_byte(&mut self) -> Option<u8> {
        while let Some(chunk) = self.buffer.segments.get(self.segment) {
            if self.offset < chunk.len() {
                let byte = chunk[self.offset];
                self.offset += 1;
                self.position += 1;
                return Some(byte);
            }
            self.segment += 1;
            self.offset = 0;
        }

        None
    }

    /// Reads up to (excluding) the next CRLF and consumes the CRLF.
    /// Returns None, leaving the cursor untouched, if no CRLF has arrived yet.
    pub fn read_line(&mut self) -> Option<Bytes> {
        let mut probe = self.clone();
        let mut length = 0;
        let mut previous = None;

        loop {
            let byte = probe.next_byte()?;
            if previous == Some(b'\r') && byte == b'\n' {
                break;
            }
            previous = Some(byte);
            length += 1;
        }

        // length includes the trailing CR
        let line = self.take(length - 1)?;
        self.skip(2);
        Some(line)
    }

    /// Takes the next `count` bytes. Zero-copy if they are located in one segment.
    /// Returns None, leaving the cursor untouched, if not enough data is buffered.
    pub fn take(&mut self, count: usize) -> Option<Bytes> {
        if self.remaining() < count {
            return None;
        }

        if count == 0 {
            return Some(Bytes::new());
        }

        self.normalize();
        let chunk = &self.buffer.segments[self.segment];
        if chunk.len() - self.offset >= count {
            let slice = chunk.slice(self.offset..self.offset + count);
            self.offset += count;
            self.position += count;
            return Some(slice);
        }

        let mut copy = BytesMut::with_capacity(count);
        let mut missing = count;
        while missing > 0 {
            self.normalize();
            let chunk = &self.buffer.segments[self.segment];
            let available = (chunk.len() - self.offset).min(missing);
            copy.put_slice(&chunk[self.offset..self.offset + available]);
            self.offset += available;
            self.position += available;
            missing -= available;
        }

        Some(copy.freeze())
    }

    /// Checks for CRLF at the cursor.
    /// None: not enough data, Some(false): other bytes present, Some(true): CRLF consumed
    pub fn expect_crlf(&mut self) -> Option<bool> {
        let mut probe = self.clone();
        let first = probe.next_byte()?;
        let second = probe.next_byte()?;

        if first != b'\r' || second != b'\n' {
            return Some(false);
        }

        *self = probe;
        Some(true)
    }

    fn skip(&mut self, count: usize) {
        for _ in 0..count {
            let _ = self.next_byte();
        }
    }

    /// Moves past exhausted segments
    fn normalize(&mut self) {
        while let Some(chunk) = self.buffer.segments.get(self.segment) {
            if self.offset < chunk.len() {
                return;
            }
            self.segment += 1;
            self.offset = 0;
        }
    }
}

/// Reusable receive blocks
///
/// Received data is read into a block and split off as frozen [Bytes] chunk. Once all chunks
/// of a block have been released, the allocation is reclaimed on the next reservation.
#[derive(Debug)]
pub struct ReceiveArena {
    block: BytesMut,
    block_size: usize,
}

impl ReceiveArena {
    pub fn new(block_size: usize) -> Self {
        let block_size = block_size.max(1);
        Self {
            block: BytesMut::with_capacity(block_size),
            block_size,
        }
    }

    /// Lets `read` fill the current block and returns the filled part as chunk
    pub fn fill<E, F>(&mut self, read: F) -> Result<Bytes, E>
    where
        F: FnOnce(&mut [u8]) -> Result<usize, E>,
    {
        self.block.clear();
        self.block.reserve(self.block_size);
        self.block.resize(self.block_size, 0);

        let count = read(&mut self.block[..])?.min(self.block_size);
        let chunk = self.block.split_to(count).freeze();
        self.block.clear();
        Ok(chunk)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

impl Default for ReceiveArena {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_SIZE)
    }
}
