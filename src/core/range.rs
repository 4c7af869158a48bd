//! Point and line-span algebra over `(row, column)` positions.
//!
//! All operations are pure and return fresh values. Two intersection
//! flavours exist and are selected explicitly through [`IntersectionMode`]:
//! point-precise (used to deduplicate resolved definitions) and line-only
//! (used to excise the caret region from same-file snippets).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Zero-indexed location inside a file.
///
/// `column` is a byte offset into the line, which is what tree-sitter
/// reports. Ordering is lexicographic on `(row, column)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position
{
    pub row: usize,
    pub column: usize,
}

impl Position
{
    pub const fn new(
        row: usize,
        column: usize,
    ) -> Self
    {
        Self { row, column }
    }

    /// First column of `row`
    pub const fn line_start(row: usize) -> Self
    {
        Self { row, column: 0 }
    }

    /// Where `text` ends if it is laid out starting here
    pub fn after_text(
        self,
        text: &str,
    ) -> Self
    {
        match text.rfind('\n')
        {
            Some(nl) => Self { row: self.row + text.matches('\n').count(), column: text.len() - nl - 1 },
            None => Self { row: self.row, column: self.column + text.len() },
        }
    }
}

impl fmt::Display for Position
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        write!(f, "{}:{}", self.row, self.column)
    }
}

impl From<tree_sitter::Point> for Position
{
    fn from(p: tree_sitter::Point) -> Self
    {
        Self { row: p.row, column: p.column }
    }
}

impl From<Position> for tree_sitter::Point
{
    fn from(p: Position) -> Self
    {
        tree_sitter::Point { row: p.row, column: p.column }
    }
}

/// Raised when a range would end before it starts
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError
{
    #[error("range end {end} precedes start {start}")]
    Inverted
    {
        start: Position, end: Position
    },
}

/// Immutable `[start, end]` span with `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRange", into = "RawRange")]
pub struct Range
{
    start: Position,
    end: Position,
}

/// Serialized shape; validated on the way in
#[derive(Serialize, Deserialize)]
struct RawRange
{
    start: Position,
    end: Position,
}

impl TryFrom<RawRange> for Range
{
    type Error = RangeError;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error>
    {
        Range::new(raw.start, raw.end)
    }
}

impl From<Range> for RawRange
{
    fn from(r: Range) -> Self
    {
        Self { start: r.start, end: r.end }
    }
}

impl Range
{
    /// Validated constructor
    pub fn new(
        start: Position,
        end: Position,
    ) -> Result<Self, RangeError>
    {
        if start > end
        {
            return Err(RangeError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Constructor for spans derived by the algebra itself.
    ///
    /// An inverted pair here is a logic bug: it trips in debug builds and is
    /// normalised in release builds so callers never observe it.
    pub(crate) fn spanning(
        start: Position,
        end: Position,
    ) -> Self
    {
        debug_assert!(start <= end, "inverted range {start}..{end}");
        if start <= end { Self { start, end } } else { Self { start: end, end: start } }
    }

    /// Line span `[(start_row, 0), (end_row, 0)]`
    pub fn rows(
        start_row: usize,
        end_row: usize,
    ) -> Result<Self, RangeError>
    {
        Self::new(Position::line_start(start_row), Position::line_start(end_row))
    }

    pub fn start(&self) -> Position
    {
        self.start
    }

    pub fn end(&self) -> Position
    {
        self.end
    }

    /// True when `start == end`
    pub fn is_empty(&self) -> bool
    {
        self.start == self.end
    }

    /// Inclusive on both ends, as the syntax path resolver requires
    pub fn contains(
        &self,
        p: Position,
    ) -> bool
    {
        self.start <= p && p <= self.end
    }

    /// Return a copy whose end is moved to `end`
    pub fn with_end(
        &self,
        end: Position,
    ) -> Self
    {
        Self::spanning(self.start, end.max(self.start))
    }
}

impl fmt::Display for Range
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// How two spans are compared for overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntersectionMode
{
    /// Full `(row, column)` precision; spans that merely touch do not overlap
    #[default]
    Point,
    /// Rows only; the overlap must cover at least one row boundary
    Line,
}

/// Overlapping sub-range of `a` and `b`, if any
pub fn intersect(
    a: &Range,
    b: &Range,
    mode: IntersectionMode,
) -> Option<Range>
{
    match mode
    {
        IntersectionMode::Point =>
        {
            let lo = a.start.max(b.start);
            let hi = a.end.min(b.end);
            (lo < hi).then(|| Range::spanning(lo, hi))
        }
        IntersectionMode::Line =>
        {
            let lo = a.start.row.max(b.start.row);
            let hi = a.end.row.min(b.end.row);
            (lo < hi).then(|| Range::spanning(Position::line_start(lo), Position::line_start(hi)))
        }
    }
}

/// `original` with the rows of `remove` cut out.
///
/// Yields nothing when `remove` covers `original`, `[original]` when the
/// row spans do not overlap, and up to two pieces (before, after) otherwise.
/// Pieces that would be empty are dropped.
pub fn subtract(
    original: &Range,
    remove: &Range,
) -> Vec<Range>
{
    let (o_start, o_end) = (original.start.row, original.end.row);
    let (r_start, r_end) = (remove.start.row, remove.end.row);

    // Fully covered
    if o_start >= r_start && o_end <= r_end
    {
        return Vec::new();
    }

    // Disjoint rows
    if r_end <= o_start || r_start >= o_end
    {
        return vec![*original];
    }

    let before = Range::spanning(original.start, Position::line_start(r_start).max(original.start));
    let after = Range::spanning(Position::line_start(r_end).min(original.end), original.end);

    let pieces = match (o_start < r_start, o_end > r_end)
    {
        (true, true) => vec![before, after],
        (false, true) => vec![after],
        (true, false) => vec![before],
        (false, false) => Vec::new(),
    };

    pieces
        .into_iter()
        .filter(|r| !r.is_empty())
        .collect()
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn r(
        sr: usize,
        sc: usize,
        er: usize,
        ec: usize,
    ) -> Range
    {
        Range::new(Position::new(sr, sc), Position::new(er, ec)).unwrap()
    }

    #[test]
    fn new_rejects_inverted_ranges()
    {
        let err = Range::new(Position::new(3, 0), Position::new(1, 0)).unwrap_err();
        assert!(matches!(err, RangeError::Inverted { .. }));
    }

    #[test]
    fn point_intersection_respects_columns_on_single_row()
    {
        let a = r(2, 0, 2, 10);
        let b = r(2, 5, 2, 20);
        assert_eq!(intersect(&a, &b, IntersectionMode::Point), Some(r(2, 5, 2, 10)));

        let c = r(2, 11, 2, 20);
        assert_eq!(intersect(&a, &c, IntersectionMode::Point), None);
    }

    #[test]
    fn touching_ranges_do_not_overlap_point_precise()
    {
        let a = r(0, 0, 5, 3);
        let b = r(5, 3, 9, 0);
        assert_eq!(intersect(&a, &b, IntersectionMode::Point), None);
    }

    #[test]
    fn multi_row_point_intersection_keeps_boundary_columns()
    {
        let a = r(1, 4, 8, 2);
        let b = r(3, 7, 12, 0);
        assert_eq!(intersect(&a, &b, IntersectionMode::Point), Some(r(3, 7, 8, 2)));
    }

    #[test]
    fn line_intersection_drops_columns()
    {
        let a = r(1, 4, 8, 2);
        let b = r(3, 7, 12, 0);
        assert_eq!(intersect(&a, &b, IntersectionMode::Line), Some(r(3, 0, 8, 0)));

        // Sharing only the boundary row is not an overlap in line mode
        let c = r(8, 5, 10, 0);
        assert_eq!(intersect(&a, &c, IntersectionMode::Line), None);
    }

    #[test]
    fn subtract_interior_yields_two_pieces()
    {
        let orig = r(0, 0, 20, 0);
        let hole = r(5, 0, 10, 0);
        assert_eq!(subtract(&orig, &hole), vec![r(0, 0, 5, 0), r(10, 0, 20, 0)]);
    }

    #[test]
    fn subtract_head_and_tail_overlaps()
    {
        let orig = r(5, 0, 15, 4);
        assert_eq!(subtract(&orig, &r(0, 0, 8, 0)), vec![r(8, 0, 15, 4)]);
        assert_eq!(subtract(&orig, &r(12, 0, 30, 0)), vec![r(5, 0, 12, 0)]);
    }

    #[test]
    fn subtract_identity_cases()
    {
        let orig = r(4, 2, 9, 1);
        assert!(subtract(&orig, &orig).is_empty());
        assert_eq!(subtract(&orig, &r(20, 0, 25, 0)), vec![orig]);
        assert!(subtract(&orig, &r(0, 0, 30, 0)).is_empty());
    }

    #[test]
    fn after_text_tracks_rows_and_columns()
    {
        let p = Position::new(4, 6);
        assert_eq!(p.after_text("abc"), Position::new(4, 9));
        assert_eq!(p.after_text("abc\nde"), Position::new(5, 2));
        assert_eq!(p.after_text("x\n"), Position::new(5, 0));
    }

    #[test]
    fn contains_is_inclusive()
    {
        let span = r(2, 0, 5, 0);
        assert!(span.contains(Position::new(2, 0)));
        assert!(span.contains(Position::new(5, 0)));
        assert!(!span.contains(Position::new(5, 1)));
    }

    #[test]
    fn serde_round_trip_validates()
    {
        let json = r#"{"start":{"row":4,"column":0},"end":{"row":1,"column":0}}"#;
        assert!(serde_json::from_str::<Range>(json).is_err());
    }
}
