//! Splits a stream of byte chunks into delimiter terminated lines.
//!
//! Buffering is bounded by the const capacity `L`, the longest line accepted.

use heapless::{String, Vec};
use thiserror::Error;

/// Line terminator used by the line-tagged CSV devices.
pub const LF: u8 = b'\n';
/// Line terminator used by the addressed command/response devices.
pub const CR: u8 = b'\r';

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerError {
    /// The buffered partial line no longer fits. It has been dropped and framing restarts after
    /// the next delimiter.
    #[error("Line buffer overflow")]
    Overflow,
    /// A complete line was received but was not valid UTF-8. The line has been dropped.
    #[error("Line is not valid UTF-8")]
    InvalidUtf8,
}

/// Accumulates raw chunks and yields complete lines with the delimiter stripped.
///
/// Only the line currently being received is buffered. Complete lines are handed out while a
/// chunk is scanned, so how a stream is split into chunks never changes which lines come out.
#[derive(Debug)]
pub struct LineFramer<const L: usize> {
    delimiter: u8,
    /// The partial line, never containing a delimiter.
    buffer: Vec<u8, L>,
    /// Set after an overflow, bytes are discarded until the next delimiter.
    resync: bool,
}

impl<const L: usize> LineFramer<L> {
    pub const fn new(delimiter: u8) -> Self {
        Self {
            delimiter,
            buffer: Vec::new(),
            resync: false,
        }
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Number of bytes of the partial line held so far.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop the partial line.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.resync = false;
    }

    /// Scan `bytes` up to and including the first delimiter.
    ///
    /// Returns how many bytes were consumed, at least one for non-empty input, and the line that
    /// completed, if any. A line longer than `L` is dropped and reported as
    /// [`FramerError::Overflow`]. Its remaining bytes are skipped up to the next delimiter so its
    /// tail is never reported as a line of its own.
    pub fn feed(&mut self, bytes: &[u8]) -> (usize, Option<Result<String<L>, FramerError>>) {
        let delimiter = bytes.iter().position(|&b| b == self.delimiter);
        let (segment, consumed) = match delimiter {
            Some(pos) => (&bytes[..pos], pos + 1),
            None => (bytes, bytes.len()),
        };

        if self.resync {
            self.resync = delimiter.is_none();
            return (consumed, None);
        }

        if self.buffer.extend_from_slice(segment).is_err() {
            self.buffer.clear();
            self.resync = delimiter.is_none();
            return (consumed, Some(Err(FramerError::Overflow)));
        }
        if delimiter.is_none() {
            return (consumed, None);
        }

        let line = core::str::from_utf8(&self.buffer)
            .map_err(|_| FramerError::InvalidUtf8)
            .and_then(|text| {
                let mut line = String::new();
                line.push_str(text).map_err(|_| FramerError::Overflow)?;
                Ok(line)
            });
        self.buffer.clear();
        (consumed, Some(line))
    }

    /// Iterate over the lines `chunk` completes.
    ///
    /// Bytes are only scanned as the iterator advances. If it is dropped early, the unscanned
    /// part is available from [`Lines::remainder`] and can be passed to a later call.
    pub fn lines<'a, 'c>(&'a mut self, chunk: &'c [u8]) -> Lines<'a, 'c, L> {
        Lines {
            framer: self,
            rest: chunk,
        }
    }
}

/// Lazy iterator over the lines of one chunk, see [`LineFramer::lines`].
pub struct Lines<'a, 'c, const L: usize> {
    framer: &'a mut LineFramer<L>,
    rest: &'c [u8],
}

impl<'c, const L: usize> Lines<'_, 'c, L> {
    /// The part of the chunk not scanned yet.
    pub fn remainder(&self) -> &'c [u8] {
        self.rest
    }
}

impl<const L: usize> Iterator for Lines<'_, '_, L> {
    type Item = Result<String<L>, FramerError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.rest.is_empty() {
            let (consumed, line) = self.framer.feed(self.rest);
            self.rest = &self.rest[consumed..];
            if line.is_some() {
                return line;
            }
        }
        None
    }
}
