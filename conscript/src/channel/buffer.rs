//! Append-only output buffer with a forward-only read cursor.
//!
//! Everything the remote side prints is appended here (ANSI escape codes
//! stripped). Each successful match moves the cursor past the matched text,
//! and later searches only look at bytes after the cursor, so a prompt that
//! was already answered can never satisfy a later expectation.

use std::borrow::Cow;
use std::fmt;
use std::ops::Range;

use vte::{Parser, Perform};

use super::patterns::PromptMatcher;

/// Buffer for accumulating output and searching it for patterns.
pub struct PatternBuffer {
    /// The accumulated (cleaned) output.
    buffer: Vec<u8>,

    /// Everything before this offset has been consumed by a match.
    cursor: usize,

    /// How many already-scanned bytes are rescanned when new data arrives.
    search_depth: usize,

    /// Escape-sequence parser; `None` keeps output verbatim.
    ansi: Option<Parser>,
}

impl PatternBuffer {
    /// Create a new pattern buffer.
    ///
    /// # Arguments
    ///
    /// * `search_depth` - Number of already-scanned bytes to search again
    ///   when more output arrives. Must cover the longest prompt that can be
    ///   split across reads.
    /// * `strip_ansi` - Remove terminal escape sequences before buffering.
    pub fn new(search_depth: usize, strip_ansi: bool) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            cursor: 0,
            search_depth,
            ansi: strip_ansi.then(Parser::new),
        }
    }

    /// Append new data.
    ///
    /// The escape parser keeps its state between calls, so a sequence cut in
    /// half by a read boundary is still removed.
    pub fn extend(&mut self, data: &[u8]) {
        match self.ansi.as_mut() {
            Some(parser) => {
                let mut printer = Printer {
                    out: &mut self.buffer,
                };
                parser.advance(&mut printer, data);
            }
            None => self.buffer.extend_from_slice(data),
        }
    }

    /// Find the first match at or after `from` (never before the cursor).
    ///
    /// The returned range is absolute within the buffer.
    pub fn find<M>(&self, matcher: &M, from: usize) -> Option<Range<usize>>
    where
        M: PromptMatcher + ?Sized,
    {
        let start = from.clamp(self.cursor, self.buffer.len());
        matcher
            .find_match(&self.buffer[start..])
            .map(|range| range.start + start..range.end + start)
    }

    /// Where the next scan for `matcher` should begin, given the buffer
    /// length at the end of the previous scan.
    ///
    /// Matchers with a bounded match length step back just far enough to
    /// catch a match split across reads. Unbounded ones (regexes) step back
    /// `search_depth` bytes, so a regex match longer than that which arrives
    /// in pieces is missed; a `search_depth` of zero rescans all unconsumed
    /// output instead.
    pub fn rescan_from<M>(&self, matcher: &M, scanned_to: usize) -> usize
    where
        M: PromptMatcher + ?Sized,
    {
        let back = match matcher.max_match_len() {
            Some(len) => len.saturating_sub(1),
            None if self.search_depth == 0 => return self.cursor,
            None => self.search_depth,
        };
        scanned_to.saturating_sub(back).max(self.cursor)
    }

    /// Mark everything up to `end` as consumed. The cursor never moves back.
    pub fn consume_to(&mut self, end: usize) {
        self.cursor = self.cursor.max(end.min(self.buffer.len()));
    }

    /// Current cursor position.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Output that has not been consumed by a match yet.
    pub fn pending(&self) -> &[u8] {
        &self.buffer[self.cursor..]
    }

    /// Get the bytes in `range` as a string (lossy UTF-8 conversion).
    pub fn slice_lossy(&self, range: Range<usize>) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer[range])
    }

    /// The last `max` bytes of unconsumed output, for error messages.
    pub fn pending_tail_lossy(&self, max: usize) -> String {
        let start = self.buffer.len().saturating_sub(max).max(self.cursor);
        String::from_utf8_lossy(&self.buffer[start..]).into_owned()
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Get the search depth setting.
    pub fn search_depth(&self) -> usize {
        self.search_depth
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(4096, true)
    }
}

impl fmt::Debug for PatternBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternBuffer")
            .field("len", &self.buffer.len())
            .field("cursor", &self.cursor)
            .field("search_depth", &self.search_depth)
            .field("strip_ansi", &self.ansi.is_some())
            .finish()
    }
}

/// Keeps printable text and line control, drops everything else.
struct Printer<'a> {
    out: &'a mut Vec<u8>,
}

impl Perform for Printer<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out
            .extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.out.push(byte);
        }
    }
}
