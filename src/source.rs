//! Buffered byte source abstraction used by the JSON reader
//!
//! The reader only ever looks at a small window of the document at a time.
//! [`Source`] models that window: bytes can be buffered ahead with
//! [`request`](Source::request), inspected with [`peek_byte`](Source::peek_byte)
//! and consumed with [`skip`](Source::skip) or [`read_slice`](Source::read_slice).
//! [`BufferedSource`] implements the trait on top of any [`Read`].

use std::io::{Error as IoError, ErrorKind, Read};

/// Number of bytes which are read from the underlying reader at once
const READ_CHUNK_SIZE: usize = 1024;

/// A byte stream with buffered look-ahead
///
/// All `offset` and `count` arguments refer to not yet consumed bytes, with
/// offset 0 being the next byte the reader will consume. Methods which access
/// buffered bytes panic when the bytes have not been buffered first with
/// [`request`](Self::request); that indicates incorrect usage by the caller,
/// not malformed input.
pub trait Source {
    /// Tries to buffer at least `count` not yet consumed bytes
    ///
    /// Returns `false` if the end of the stream is reached before `count`
    /// bytes are available.
    fn request(&mut self, count: usize) -> Result<bool, IoError>;

    /// Returns the number of currently buffered not yet consumed bytes
    fn available(&self) -> usize;

    /// Returns the buffered byte at `offset` without consuming it
    ///
    /// Panics if the byte at `offset` has not been buffered.
    fn peek_byte(&self, offset: usize) -> u8;

    /// Consumes and returns the next byte
    ///
    /// Returns an [`ErrorKind::UnexpectedEof`] error if the end of the
    /// stream is reached.
    fn read_byte(&mut self) -> Result<u8, IoError>;

    /// Consumes the next `count` buffered bytes and returns them
    ///
    /// Panics if fewer than `count` bytes are buffered.
    fn read_slice(&mut self, count: usize) -> &[u8];

    /// Consumes the next `count` buffered bytes
    ///
    /// Panics if fewer than `count` bytes are buffered.
    fn skip(&mut self, count: usize);

    /// Remembers the current position so that [`reset`](Self::reset) can
    /// return to it, as long as no more than `limit` bytes are consumed
    /// in the meantime
    ///
    /// A new mark replaces any previous one.
    fn mark(&mut self, limit: usize);

    /// Rewinds to the position remembered by [`mark`](Self::mark)
    ///
    /// Returns an error if no mark is set or if more bytes were consumed
    /// since the mark than its limit allows.
    fn reset(&mut self) -> Result<(), IoError>;

    /// Searches the not yet consumed bytes for the first byte contained in
    /// `terminators`, buffering more data as needed
    ///
    /// Returns the offset of the matching byte, or `None` if the end of the
    /// stream is reached without a match. No bytes are consumed; on return
    /// all inspected bytes are buffered.
    fn index_of_element(&mut self, terminators: &[u8]) -> Result<Option<usize>, IoError>;

    /// Closes the source, releasing any underlying resources
    ///
    /// Callers which cannot propagate a close failure without masking a more
    /// interesting primary error should log it instead.
    fn close(&mut self) -> Result<(), IoError>;
}

/// [`Source`] implementation reading from a [`Read`], with a sliding buffer
/// window and `mark`/`reset` support
#[derive(Debug)]
pub struct BufferedSource<R: Read> {
    reader: R,
    buf: Vec<u8>,
    /// Index in `buf` of the next byte to consume
    pos: usize,
    /// Marked position in `buf`, kept alive during buffer compaction
    mark: Option<usize>,
    mark_limit: usize,
    reached_eof: bool,
}

impl<R: Read> BufferedSource<R> {
    /// Creates a buffered source reading from `reader`
    pub fn new(reader: R) -> Self {
        BufferedSource {
            reader,
            buf: Vec::with_capacity(READ_CHUNK_SIZE),
            pos: 0,
            mark: None,
            mark_limit: 0,
            reached_eof: false,
        }
    }

    /// Drops consumed bytes from the front of the buffer, keeping marked
    /// bytes reachable while the mark is still valid
    fn compact(&mut self) {
        let keep_from = match self.mark {
            Some(mark) if self.pos - mark <= self.mark_limit => mark,
            Some(_) => {
                // Mark limit exceeded, mark can no longer be used
                self.mark = None;
                self.pos
            }
            None => self.pos,
        };
        if keep_from > 0 {
            self.buf.drain(..keep_from);
            self.pos -= keep_from;
            if let Some(mark) = self.mark.as_mut() {
                *mark -= keep_from;
            }
        }
    }

    /// Reads one chunk from the underlying reader into the buffer
    ///
    /// Returns `false` if the end of the stream is reached.
    fn fill(&mut self) -> Result<bool, IoError> {
        if self.reached_eof {
            return Ok(false);
        }
        self.compact();

        let mut chunk = [0_u8; READ_CHUNK_SIZE];
        let read_count = loop {
            match self.reader.read(&mut chunk) {
                Ok(count) => break count,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        if read_count == 0 {
            self.reached_eof = true;
            return Ok(false);
        }
        self.buf.extend_from_slice(&chunk[..read_count]);
        Ok(true)
    }
}

impl<R: Read> Source for BufferedSource<R> {
    fn request(&mut self, count: usize) -> Result<bool, IoError> {
        while self.available() < count {
            if !self.fill()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn available(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn peek_byte(&self, offset: usize) -> u8 {
        self.buf[self.pos + offset]
    }

    fn read_byte(&mut self) -> Result<u8, IoError> {
        if !self.request(1)? {
            return Err(IoError::new(
                ErrorKind::UnexpectedEof,
                "unexpected end of stream",
            ));
        }
        let byte = self.buf[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    fn read_slice(&mut self, count: usize) -> &[u8] {
        assert!(
            count <= self.available(),
            "Incorrect source usage: reading {count} bytes but only {} are buffered",
            self.available()
        );
        let start = self.pos;
        self.pos += count;
        &self.buf[start..self.pos]
    }

    fn skip(&mut self, count: usize) {
        assert!(
            count <= self.available(),
            "Incorrect source usage: skipping {count} bytes but only {} are buffered",
            self.available()
        );
        self.pos += count;
    }

    fn mark(&mut self, limit: usize) {
        self.mark = Some(self.pos);
        self.mark_limit = limit;
    }

    fn reset(&mut self) -> Result<(), IoError> {
        match self.mark {
            Some(mark) if self.pos - mark <= self.mark_limit => {
                self.pos = mark;
                Ok(())
            }
            Some(_) => {
                self.mark = None;
                Err(IoError::new(
                    ErrorKind::InvalidInput,
                    "mark limit exceeded before reset",
                ))
            }
            None => Err(IoError::new(ErrorKind::InvalidInput, "no mark set")),
        }
    }

    fn index_of_element(&mut self, terminators: &[u8]) -> Result<Option<usize>, IoError> {
        let mut checked = 0;
        loop {
            while checked < self.available() {
                if terminators.contains(&self.peek_byte(checked)) {
                    return Ok(Some(checked));
                }
                checked += 1;
            }
            if !self.request(checked + 1)? {
                return Ok(None);
            }
        }
    }

    fn close(&mut self) -> Result<(), IoError> {
        // There is nothing to release for a plain `Read`; custom `Source`
        // implementations can override this with real cleanup
        Ok(())
    }
}
