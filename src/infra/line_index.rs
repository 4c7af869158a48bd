//! Newline index mapping `(row, column)` positions to byte offsets.
//!
//! Goals
//! - Single pass over bytes to record '\n' positions.
//! - 0-based rows, matching tree-sitter points.
//! - O(1) row→byte start/end via the index.
//! - End byte excludes trailing '\r' for CRLF lines.
//! - Binary search for byte→row mapping.
//!
//! Notes
//! - An empty buffer has 0 lines.
//! - A non-empty buffer without '\n' has 1 line.
//! - Range ends are exclusive; `(r, 0)` as an end excludes row `r`.

use crate::core::range::{Position, Range};

#[derive(Debug, Clone)]
pub struct NewlineIndex
{
    /// Byte positions of every '\n' in the buffer.
    nl_positions: Vec<usize>,
    /// Total byte length of the buffer.
    len: usize,
}

impl NewlineIndex
{
    /// Build an index recording positions of '\n'.
    pub fn build(bytes: &[u8]) -> Self
    {
        let nl_positions = memchr::memchr_iter(b'\n', bytes).collect();
        Self { nl_positions, len: bytes.len() }
    }

    /// Total number of logical lines.
    /// Empty buffer => 0 lines; else (#'\n' + 1).
    pub fn line_count(&self) -> usize
    {
        if self.len == 0 { 0 } else { self.nl_positions.len() + 1 }
    }

    /// Start byte (inclusive) of a 0-based row.
    pub fn line_start(
        &self,
        row: usize,
    ) -> Option<usize>
    {
        if row >= self.line_count()
        {
            return None;
        }
        if row == 0
        {
            return Some(0);
        }
        // One past the previous '\n'
        self.nl_positions
            .get(row - 1)
            .map(|&prev| prev + 1)
    }

    /// End byte (exclusive) of a 0-based row, excluding '\r' before '\n'.
    pub fn line_end(
        &self,
        row: usize,
        bytes: &[u8],
    ) -> Option<usize>
    {
        if row >= self.line_count()
        {
            return None;
        }
        match self.nl_positions.get(row)
        {
            Some(&nl) if nl > 0 && bytes.get(nl - 1) == Some(&b'\r') => Some(nl - 1),
            Some(&nl) => Some(nl),
            // Last line without trailing '\n' ends at EOF
            None => Some(self.len),
        }
    }

    /// Byte offset for a position, clamped to the buffer.
    ///
    /// Rows past the end map to EOF; columns past the line end map to the
    /// line end.
    pub fn byte_of(
        &self,
        pos: Position,
        bytes: &[u8],
    ) -> usize
    {
        match (self.line_start(pos.row), self.line_end(pos.row, bytes))
        {
            (Some(start), Some(end)) => (start + pos.column).min(end),
            _ => self.len,
        }
    }

    /// Text covered by `range`, snapped to char boundaries.
    pub fn slice<'a>(
        &self,
        text: &'a str,
        range: &Range,
    ) -> &'a str
    {
        let bytes = text.as_bytes();
        let mut lo = self.byte_of(range.start(), bytes);
        let mut hi = self.byte_of(range.end(), bytes);

        // Columns are byte offsets; never split a code point
        while lo > 0 && !text.is_char_boundary(lo)
        {
            lo -= 1;
        }
        while hi < text.len() && !text.is_char_boundary(hi)
        {
            hi += 1;
        }

        if lo <= hi { &text[lo..hi] } else { "" }
    }
}
