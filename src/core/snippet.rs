//! Resolved code fragments and the value-semantics operations over them.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::range::{IntersectionMode, Range, intersect, subtract};
use crate::infra::line_index::NewlineIndex;

/// Which candidate source produced a snippet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnippetOrigin
{
    RootPath,
    Definition,
    Usage,
    Import,
    SimilarCode,
}

/// A resolved piece of source offered as completion context.
///
/// Narrowing operations return new values; only `score` is assigned after
/// construction, during ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition
{
    pub source_path: PathBuf,
    pub range: Range,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub score: Option<f32>,
    pub origin: SnippetOrigin,
}

impl Definition
{
    pub fn new(
        source_path: impl Into<PathBuf>,
        range: Range,
        content: impl Into<String>,
        origin: SnippetOrigin,
    ) -> Self
    {
        Self { source_path: source_path.into(), range, content: content.into(), score: None, origin }
    }

    /// Copy with a narrowed range and matching content
    pub fn narrowed(
        &self,
        range: Range,
        content: impl Into<String>,
    ) -> Self
    {
        Self { range, content: content.into(), ..self.clone() }
    }

    pub fn with_score(
        mut self,
        score: f32,
    ) -> Self
    {
        self.score = Some(score);
        self
    }

    /// Same file and overlapping under `mode`
    pub fn overlaps(
        &self,
        other: &Definition,
        mode: IntersectionMode,
    ) -> bool
    {
        self.source_path == other.source_path && intersect(&self.range, &other.range, mode).is_some()
    }
}

fn max_score(
    a: Option<f32>,
    b: Option<f32>,
) -> Option<f32>
{
    match (a, b)
    {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

/// Join `first` and `second` where `second` starts inside `first`.
///
/// The head of `first` is kept up to the overlap boundary and the whole of
/// `second` follows it. When `second` ends inside `first`, `first` already
/// covers it and is kept as is.
fn merge_pair(
    first: &Definition,
    second: &Definition,
) -> Definition
{
    let score = max_score(first.score, second.score);

    if second.range.end() <= first.range.end()
    {
        return Definition { score, ..first.clone() };
    }

    // Rows of `first` that precede `second`
    let keep = second.range.start().row - first.range.start().row;
    let head: Vec<&str> = first.content.split('\n').collect();
    let keep = keep.min(head.len());

    let mut lines: Vec<&str> = head[..keep].to_vec();
    lines.extend(second.content.split('\n'));

    Definition {
        source_path: first.source_path.clone(),
        range: first.range.with_end(second.range.end()),
        content: lines.join("\n"),
        score,
        origin: first.origin,
    }
}

/// Merge same-file snippets whose row spans overlap.
///
/// Files keep the order in which they first appear; within a file the
/// result is sorted by start row. Idempotent.
pub fn merge_overlapping(snippets: Vec<Definition>) -> Vec<Definition>
{
    let mut by_file: IndexMap<PathBuf, Vec<Definition>> = IndexMap::new();
    for s in snippets
    {
        by_file
            .entry(s.source_path.clone())
            .or_default()
            .push(s);
    }

    let mut out = Vec::new();
    for (_, mut group) in by_file
    {
        group.sort_by_key(|d| d.range.start().row);

        let mut merged: Vec<Definition> = Vec::with_capacity(group.len());
        for next in group
        {
            match merged.last_mut()
            {
                // Strictly before the current end row
                Some(last) if next.range.start().row < last.range.end().row =>
                {
                    *last = merge_pair(last, &next);
                }
                _ => merged.push(next),
            }
        }
        out.extend(merged);
    }
    out
}

/// Replace same-file snippets overlapping `region` by what remains outside it.
///
/// Remaining pieces take their content from `current_text`, the file as it
/// looks at completion time. Empty pieces are dropped; snippets from other
/// files pass through.
pub fn excise_region(
    snippets: Vec<Definition>,
    current_path: &Path,
    current_text: &str,
    region: &Range,
) -> Vec<Definition>
{
    let idx = NewlineIndex::build(current_text.as_bytes());

    snippets
        .into_iter()
        .flat_map(|s| {
            if s.source_path != current_path || intersect(&s.range, region, IntersectionMode::Line).is_none()
            {
                return vec![s];
            }
            subtract(&s.range, region)
                .into_iter()
                .map(|piece| s.narrowed(piece, idx.slice(current_text, &piece)))
                .filter(|piece| !piece.content.trim().is_empty())
                .collect()
        })
        .collect()
}
