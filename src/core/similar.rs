//! Similar-code retrieval over fixed-size line windows.
//!
//! Every workspace file is cut into overlapping windows of `window_lines`
//! rows, one every `window_lines / slice_size` rows. Windows with identical
//! text are stored once with all of their sites. A request scores each window
//! against the lines just above the cursor and keeps the `top_k` best.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, instrument, warn};

use crate::core::range::{Position, Range};
use crate::core::ranking::{jaccard, symbols_of};
use crate::core::snippet::{Definition, SnippetOrigin};
use crate::infra::io::read_source;
use crate::infra::walk::FileWalker;
use crate::parsers::grammar::Grammar;

/// Window geometry and result count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimilarOptions
{
    pub window_lines: usize,
    pub slice_size: usize,
    pub top_k: usize,
}

impl SimilarOptions
{
    /// Rows between consecutive window centres, at least one
    pub fn step(&self) -> usize
    {
        (self.window_lines / self.slice_size.max(1)).max(1)
    }
}

/// One distinct window text and every place it occurs, in discovery order
#[derive(Debug, Clone, PartialEq)]
pub struct CodeWindow
{
    pub code: String,
    pub sites: Vec<(PathBuf, Range)>,
}

/// Windows of `text`, each centred on a row that is a multiple of the step.
///
/// A window spans `window_lines / 2` rows above its centre and the rest
/// below it, clamped to the file. Blank windows are skipped.
pub fn file_windows(
    text: &str,
    opts: SimilarOptions,
) -> Vec<(Range, String)>
{
    let lines: Vec<&str> = text.split('\n').collect();
    let above = opts.window_lines / 2;

    (0..lines.len())
        .step_by(opts.step())
        .filter_map(|row| {
            let start = row.saturating_sub(above);
            let end = (row + opts.window_lines - above).min(lines.len());
            let code = lines[start..end].join("\n");
            (!code.trim().is_empty())
                .then(|| (Range::spanning(Position::line_start(start), Position::line_start(end)), code))
        })
        .collect()
}

pub struct SimilarCodeIndex
{
    windows: Vec<CodeWindow>,
    opts: SimilarOptions,
}

impl SimilarCodeIndex
{
    /// Index already loaded texts; identical windows are merged.
    pub fn from_files<I>(
        files: I,
        opts: SimilarOptions,
    ) -> Self
    where
        I: IntoIterator<Item = (PathBuf, String)>,
    {
        let mut merged: IndexMap<String, Vec<(PathBuf, Range)>> = IndexMap::new();
        for (path, text) in files
        {
            for (range, code) in file_windows(&text, opts)
            {
                merged
                    .entry(code)
                    .or_default()
                    .push((path.clone(), range));
            }
        }

        let windows = merged
            .into_iter()
            .map(|(code, sites)| CodeWindow { code, sites })
            .collect();
        Self { windows, opts }
    }

    /// Read and window every file of `grammar` under `root`, in parallel.
    #[instrument(level = "info", skip_all, fields(root = %root.display(), %grammar))]
    pub fn build(
        root: &Path,
        grammar: Grammar,
        ignores: &[String],
        opts: SimilarOptions,
    ) -> Result<Self>
    {
        let root = dunce::canonicalize(root)
            .with_context(|| format!("Failed to resolve workspace root {}", root.display()))?;
        let files = FileWalker::new(ignores)?
            .with_grammar(grammar)
            .walk_files(&root);

        let texts: Vec<(PathBuf, String)> = files
            .into_par_iter()
            .filter_map(|path| match read_source(&path)
            {
                Ok(text) => Some((path, text)),
                Err(e) =>
                {
                    warn!(path = %path.display(), error = %e, "skipping unreadable file");
                    None
                }
            })
            .collect();

        let index = Self::from_files(texts, opts);
        debug!(windows = index.len(), "similar-code windows built");
        Ok(index)
    }

    pub fn len(&self) -> usize
    {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.windows.is_empty()
    }

    pub fn windows(&self) -> &[CodeWindow]
    {
        &self.windows
    }

    /// The rows above the cursor, at most half a window of them
    pub fn query_window(
        &self,
        content: &str,
        cursor: Position,
    ) -> String
    {
        let lines: Vec<&str> = content.split('\n').collect();
        let end = cursor.row.min(lines.len());
        let start = end.saturating_sub(self.opts.window_lines / 2);
        lines[start..end].join("\n")
    }

    /// Best `top_k` windows by Jaccard overlap with the query window.
    ///
    /// Windows that only occur in `file` and windows sharing no symbol with
    /// the query are skipped. Ties keep index order. Results are left
    /// unscored so the pipeline ranks them with every other candidate.
    #[instrument(level = "debug", skip_all, fields(file = %file.display(), cursor = %cursor))]
    pub fn retrieve(
        &self,
        file: &Path,
        content: &str,
        cursor: Position,
    ) -> Vec<Definition>
    {
        let query = self.query_window(content, cursor);
        let query = symbols_of(&query);
        if query.is_empty()
        {
            debug!("nothing above the cursor to match");
            return Vec::new();
        }

        let mut scored: Vec<(f32, usize, &PathBuf, Range)> = self
            .windows
            .par_iter()
            .enumerate()
            .filter_map(|(i, w)| {
                let (path, range) = w.sites.iter().find(|(p, _)| p != file)?;
                let sim = jaccard(&query, &symbols_of(&w.code));
                (sim > 0.0).then_some((sim, i, path, *range))
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        scored
            .into_iter()
            .take(self.opts.top_k)
            .map(|(_, i, path, range)| {
                Definition::new(path.clone(), range, self.windows[i].code.clone(), SnippetOrigin::SimilarCode)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn opts(
        window_lines: usize,
        top_k: usize,
    ) -> SimilarOptions
    {
        SimilarOptions { window_lines, slice_size: 2, top_k }
    }

    fn numbered(n: usize) -> String
    {
        (0..n).map(|i| format!("l{i}")).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn windows_step_by_half_a_window()
    {
        let windows = file_windows(&numbered(10), opts(4, 5));
        let spans: Vec<(usize, usize)> = windows
            .iter()
            .map(|(r, _)| (r.start().row, r.end().row))
            .collect();

        // Centres 0, 2, 4, 6, 8; two rows above, two below
        assert_eq!(spans, [(0, 2), (0, 4), (2, 6), (4, 8), (6, 10)]);
        assert_eq!(windows[2].1, "l2\nl3\nl4\nl5");
    }

    #[test]
    fn step_never_drops_to_zero()
    {
        assert_eq!(SimilarOptions { window_lines: 1, slice_size: 4, top_k: 1 }.step(), 1);
        assert_eq!(SimilarOptions { window_lines: 20, slice_size: 0, top_k: 1 }.step(), 20);
    }

    #[test]
    fn blank_windows_are_skipped()
    {
        assert!(file_windows("\n\n   \n", opts(4, 5)).is_empty());
    }

    #[test]
    fn identical_windows_are_merged_across_files()
    {
        let files = vec![
            (PathBuf::from("a.py"), "x = 1\ny = 2".to_string()),
            (PathBuf::from("b.py"), "x = 1\ny = 2".to_string()),
        ];
        let index = SimilarCodeIndex::from_files(files, opts(20, 5));

        assert_eq!(index.len(), 1);
        assert_eq!(index.windows()[0].sites.len(), 2);
    }

    #[test]
    fn query_is_the_rows_above_the_cursor()
    {
        let index = SimilarCodeIndex::from_files(Vec::new(), opts(4, 5));
        let text = numbered(6);
        assert_eq!(index.query_window(&text, Position::new(4, 1)), "l2\nl3");
        assert_eq!(index.query_window(&text, Position::new(0, 3)), "");
    }

    #[test]
    fn retrieve_keeps_top_k_best_foreign_windows()
    {
        let files = vec![
            (PathBuf::from("cur.py"), "load user config\nsave user config".to_string()),
            (PathBuf::from("best.py"), "load user config".to_string()),
            (PathBuf::from("some.py"), "load the cache".to_string()),
            (PathBuf::from("none.py"), "draw circle".to_string()),
        ];
        let index = SimilarCodeIndex::from_files(files, opts(20, 2));

        let found = index.retrieve(Path::new("cur.py"), "load user config\n", Position::new(1, 0));
        let paths: Vec<_> = found.iter().map(|d| d.source_path.clone()).collect();

        assert_eq!(paths, [PathBuf::from("best.py"), PathBuf::from("some.py")]);
        assert!(found.iter().all(|d| d.score.is_none()));
        assert!(found.iter().all(|d| d.origin == SnippetOrigin::SimilarCode));

        let one = SimilarCodeIndex { opts: opts(20, 1), ..index };
        assert_eq!(one.retrieve(Path::new("cur.py"), "load user config\n", Position::new(1, 0)).len(), 1);
    }

    #[test]
    fn nothing_above_the_cursor_means_no_results()
    {
        let files = vec![(PathBuf::from("a.py"), "x = 1".to_string())];
        let index = SimilarCodeIndex::from_files(files, opts(20, 5));
        assert!(index.retrieve(Path::new("b.py"), "x = 1", Position::new(0, 0)).is_empty());
    }
}
