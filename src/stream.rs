//! Byte Stream Reader
//!
//! Position-aware pull reader used by the query definition parser.
//! Every failure carries a rendered excerpt of the input around the
//! cursor so the caller can point at the offending byte:
//!
//! ```text
//! SELECT cpu | SAMPLE reservoir(x)
//!                               ^
//! ```

use thiserror::Error;

/// Maximum length of an error context line, in bytes
pub const MAX_CONTEXT_LENGTH: usize = 64;

/// How far back from the cursor the error context reaches
const CONTEXT_LOOKBEHIND: usize = MAX_CONTEXT_LENGTH / 2;

/// Error raised when reading past the end of a stream or from a closed one.
///
/// Renders as two lines: the context excerpt, then a caret under the
/// offending position.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{line}\n{}", caret_line(.pos))]
pub struct StreamError {
    line: String,
    pos: usize,
}

impl StreamError {
    /// Create a stream error from a context excerpt and caret offset
    pub fn new(line: impl Into<String>, pos: usize) -> Self {
        Self {
            line: line.into(),
            pos,
        }
    }

    /// The context excerpt
    pub fn line(&self) -> &str {
        &self.line
    }

    /// Offset of the caret within the excerpt
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// The second line of the report: spaces followed by `^`
    pub fn bottom_line(&self) -> String {
        caret_line(&self.pos)
    }
}

fn caret_line(pos: &usize) -> String {
    format!("{}^", " ".repeat(*pos))
}

/// Stream reader that operates on byte level.
pub trait ByteStreamReader {
    /// Read one byte and advance.
    ///
    /// Fails at end of stream or on a closed stream; callers are expected
    /// to check [`is_eof`](Self::is_eof) first.
    fn get(&mut self) -> Result<u8, StreamError>;

    /// Look at the next byte without advancing.
    fn pick(&self) -> Result<u8, StreamError>;

    /// True once the cursor has reached the end of the input.
    fn is_eof(&self) -> bool;

    /// Copy up to `buffer.len()` bytes into `buffer` and advance past them.
    ///
    /// Returns the number of bytes copied: `buffer.len()` when enough
    /// input remains, fewer when the rest of the stream was shorter, `0`
    /// at end of stream. Reading from a closed stream is an error.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, StreamError>;

    /// Close the stream. Subsequent reads fail.
    fn close(&mut self);

    /// Excerpt of the input around the cursor (at most
    /// [`MAX_CONTEXT_LENGTH`] bytes) and the caret offset within it.
    ///
    /// No message is taken: callers attach their own, as
    /// `QueryError::Syntax` does with `message` alongside the context.
    fn get_error_context(&self) -> (String, usize);

    /// Current cursor position
    fn position(&self) -> usize;

    /// Build a [`StreamError`] pointing at the cursor
    fn error_here(&self) -> StreamError {
        let (line, pos) = self.get_error_context();
        StreamError::new(line, pos)
    }
}

/// [`ByteStreamReader`] over an in-memory buffer.
#[derive(Debug, Clone)]
pub struct MemStreamReader<'a> {
    buf: &'a [u8],
    pos: usize,
    closed: bool,
}

impl<'a> MemStreamReader<'a> {
    /// Create a reader over a byte buffer
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            closed: false,
        }
    }

    /// Create a reader over a string
    pub fn from_str(s: &'a str) -> Self {
        Self::new(s.as_bytes())
    }

    /// Total size of the underlying buffer
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if the underlying buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Check if the stream was closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl ByteStreamReader for MemStreamReader<'_> {
    fn get(&mut self) -> Result<u8, StreamError> {
        let byte = self.pick()?;
        self.pos += 1;
        Ok(byte)
    }

    fn pick(&self) -> Result<u8, StreamError> {
        if self.closed {
            return Err(self.error_here());
        }
        self.buf
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.error_here())
    }

    fn is_eof(&self) -> bool {
        self.pos == self.buf.len()
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, StreamError> {
        if self.closed {
            return Err(self.error_here());
        }
        let available = self.buf.len() - self.pos;
        let count = available.min(buffer.len());
        buffer[..count].copy_from_slice(&self.buf[self.pos..self.pos + count]);
        self.pos += count;
        Ok(count)
    }

    fn close(&mut self) {
        self.closed = true;
        self.pos = self.buf.len();
    }

    fn get_error_context(&self) -> (String, usize) {
        let origin = self.pos;

        // Stay on the cursor's line
        let mut start = origin;
        while start > 0 && origin - start < CONTEXT_LOOKBEHIND && self.buf[start - 1] != b'\n' {
            start -= 1;
        }
        let mut stop = origin;
        while stop < self.buf.len() && stop - start < MAX_CONTEXT_LENGTH && self.buf[stop] != b'\n'
        {
            stop += 1;
        }

        let line = self.buf[start..stop].iter().map(|&b| printable(b)).collect();
        (line, origin - start)
    }

    fn position(&self) -> usize {
        self.pos
    }
}

/// One output char per input byte keeps the caret aligned
fn printable(byte: u8) -> char {
    match byte {
        b'\t' | b'\r' => ' ',
        b if b.is_ascii_graphic() || b == b' ' => b as char,
        _ => '?',
    }
}
