//! The caret window (text around the cursor that always reaches the prompt)
//! and token-bounded line windows around arbitrary rows.

use crate::core::budgeter::TokenCounter;
use crate::core::range::{Position, Range};
use crate::infra::config::EngineConfig;
use crate::infra::line_index::NewlineIndex;

/// Prefix and suffix around the cursor, pruned to their token shares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaretWindow
{
    pub cursor: Position,
    /// Whole text before the cursor
    pub full_prefix: String,
    /// Whole text after the cursor
    pub full_suffix: String,
    pub prefix: String,
    pub suffix: String,
}

impl CaretWindow
{
    /// Split `content` at `cursor` and prune both sides.
    ///
    /// The prefix loses whole lines from the top until it fits
    /// `max_prompt_tokens * prefix_percentage`. The suffix loses lines from
    /// the bottom until it fits what the prefix left over, capped at
    /// `max_prompt_tokens * max_suffix_percentage`.
    pub fn build(
        content: &str,
        cursor: Position,
        cfg: &EngineConfig,
        counter: &dyn TokenCounter,
    ) -> Self
    {
        let idx = NewlineIndex::build(content.as_bytes());
        let mut at = idx.byte_of(cursor, content.as_bytes());
        while !content.is_char_boundary(at)
        {
            at -= 1;
        }
        let (full_prefix, full_suffix) = content.split_at(at);

        let max_prefix = (cfg.max_prompt_tokens as f64 * cfg.prefix_percentage) as usize;
        let prefix = prune_from_top(full_prefix, max_prefix, counter);

        let left = cfg.max_prompt_tokens.saturating_sub(counter.count(prefix));
        let max_suffix = left.min((cfg.max_prompt_tokens as f64 * cfg.max_suffix_percentage) as usize);
        let suffix = prune_from_bottom(full_suffix, max_suffix, counter);

        Self {
            cursor,
            full_prefix: full_prefix.to_owned(),
            full_suffix: full_suffix.to_owned(),
            prefix: prefix.to_owned(),
            suffix: suffix.to_owned(),
        }
    }

    /// Pruned prefix followed by pruned suffix
    pub fn text(&self) -> String
    {
        format!("{}{}", self.prefix, self.suffix)
    }

    /// Rows of the file covered by the pruned window, widened by `buffer`
    /// lines on both sides.
    pub fn region(
        &self,
        buffer: usize,
    ) -> Range
    {
        let above = self.prefix.matches('\n').count();
        let below = self.suffix.matches('\n').count();
        let start = self.cursor.row.saturating_sub(above + buffer);
        let end = self.cursor.row + below + buffer;
        Range::spanning(Position::line_start(start), Position::line_start(end))
    }
}

/// Byte offsets just past each '\n', i.e. where each following line starts.
fn line_starts(s: &str) -> Vec<usize>
{
    memchr::memchr_iter(b'\n', s.as_bytes())
        .map(|i| i + 1)
        .collect()
}

/// Smallest number of leading lines to drop so the rest fits `max`.
fn prune_from_top<'a>(
    s: &'a str,
    max: usize,
    counter: &dyn TokenCounter,
) -> &'a str
{
    if counter.count(s) <= max
    {
        return s;
    }
    let cuts = line_starts(s);

    // Counts shrink as lines are dropped; binary search the first cut that fits
    let (mut lo, mut hi) = (0usize, cuts.len());
    while lo < hi
    {
        let mid = (lo + hi) / 2;
        if counter.count(&s[cuts[mid]..]) <= max { hi = mid } else { lo = mid + 1 }
    }
    cuts.get(lo).map_or("", |&c| &s[c..])
}

/// Smallest number of trailing lines to drop so the rest fits `max`.
fn prune_from_bottom<'a>(
    s: &'a str,
    max: usize,
    counter: &dyn TokenCounter,
) -> &'a str
{
    if counter.count(s) <= max
    {
        return s;
    }
    // Keep prefixes ending after a newline, longest first
    let cuts = line_starts(s);

    let (mut lo, mut hi) = (0usize, cuts.len());
    while lo < hi
    {
        let mid = (lo + hi).div_ceil(2);
        if counter.count(&s[..cuts[mid - 1]]) <= max { lo = mid } else { hi = mid - 1 }
    }
    if lo == 0 { "" } else { &s[..cuts[lo - 1]] }
}

/// A contiguous run of lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineWindow
{
    /// Rows `[start, end)`
    pub range: Range,
    pub text: String,
}

/// Widest line window around `row` whose token count stays under
/// `max_tokens`.
///
/// Grows one line up and one line down at a time while the window still
/// fits, then tries single lines above, then single lines below. The row
/// itself is always included.
pub fn window_around(
    row: usize,
    lines: &[&str],
    max_tokens: usize,
    counter: &dyn TokenCounter,
) -> Option<LineWindow>
{
    if lines.is_empty()
    {
        return None;
    }
    let n = lines.len();
    let row = row.min(n - 1);
    let fits = |lo: usize, hi: usize| counter.count(&lines[lo..hi].join("\n")) < max_tokens;

    let (mut lo, mut hi) = (row, row + 1);

    // Symmetric growth
    loop
    {
        let (nlo, nhi) = (lo.saturating_sub(1), (hi + 1).min(n));
        if (nlo, nhi) == (lo, hi) || !fits(nlo, nhi)
        {
            break;
        }
        (lo, hi) = (nlo, nhi);
    }

    // Fine-tune each side
    while lo > 0 && fits(lo - 1, hi)
    {
        lo -= 1;
    }
    while hi < n && fits(lo, hi + 1)
    {
        hi += 1;
    }

    Some(LineWindow {
        range: Range::spanning(Position::line_start(lo), Position::line_start(hi)),
        text: lines[lo..hi].join("\n"),
    })
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::core::budgeter::WhitespaceCounter;

    fn cfg(max: usize) -> EngineConfig
    {
        EngineConfig { max_prompt_tokens: max, prefix_percentage: 0.5, max_suffix_percentage: 0.25, ..Default::default() }
    }

    #[test]
    fn splits_at_cursor_without_pruning_when_small()
    {
        let text = "a b\nc d\ne f\n";
        let w = CaretWindow::build(text, Position::new(1, 2), &cfg(100), &WhitespaceCounter);
        assert_eq!(w.prefix, "a b\nc ");
        assert_eq!(w.suffix, "d\ne f\n");
        assert_eq!(w.text(), text);
    }

    #[test]
    fn prunes_prefix_top_and_suffix_bottom()
    {
        // Ten one-word lines on each side of the cursor
        let before: String = (0..10).map(|i| format!("p{i}\n")).collect();
        let after: String = (0..10).map(|i| format!("s{i}\n")).collect();
        let text = format!("{before}{after}");

        // prefix share 10 words, suffix share min(20 - 10, 5) = 5 words
        let w = CaretWindow::build(&text, Position::new(10, 0), &cfg(20), &WhitespaceCounter);
        assert_eq!(w.prefix, before);
        assert_eq!(w.suffix, "s0\ns1\ns2\ns3\ns4\n");

        let w = CaretWindow::build(&text, Position::new(10, 0), &cfg(8), &WhitespaceCounter);
        assert_eq!(w.prefix, "p6\np7\np8\np9\n");
        assert_eq!(w.suffix, "s0\ns1\n");
    }

    #[test]
    fn region_covers_window_plus_buffer()
    {
        let text: String = (0..40).map(|i| format!("l{i}\n")).collect();
        let w = CaretWindow::build(&text, Position::new(20, 0), &cfg(8), &WhitespaceCounter);
        // prefix keeps rows 16..20, suffix rows 20..22
        assert_eq!(w.region(2), Range::rows(14, 24).unwrap());
        assert_eq!(w.region(100).start(), Position::line_start(0));
    }

    #[test]
    fn window_grows_symmetrically_then_fine_tunes()
    {
        let lines: Vec<&str> = vec!["a", "b", "c", "d e f g", "h", "i"];
        // Whole file is 9 words; limit 6 means < 6 words
        let w = window_around(1, &lines, 6, &WhitespaceCounter).unwrap();
        assert_eq!(w.range, Range::rows(0, 3).unwrap());
        assert_eq!(w.text, "a\nb\nc");

        let w = window_around(4, &lines, 100, &WhitespaceCounter).unwrap();
        assert_eq!(w.range, Range::rows(0, 6).unwrap());
    }

    #[test]
    fn window_clamps_row_and_handles_empty()
    {
        assert!(window_around(0, &[], 10, &WhitespaceCounter).is_none());
        let w = window_around(99, &["x", "y"], 1, &WhitespaceCounter).unwrap();
        assert_eq!(w.text, "y");
    }
}
