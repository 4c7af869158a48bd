//! Definition crawling: follow type references out of resolved definitions
//! through the navigator, breadth-first, with label and range dedup.

use std::collections::{HashSet, VecDeque};
use std::path::Path;

use tracing::{debug, instrument};

use crate::core::navigator::{Location, Navigator, NavigatorError};
use crate::core::range::{IntersectionMode, Position, Range};
use crate::core::snippet::{Definition, SnippetOrigin};
use crate::infra::io::read_range;
use crate::parsers::grammar::{Grammar, NodeCategory};
use crate::parsers::source::{SourceTree, descendants, parse};

/// State shared by every step of one crawl.
#[derive(Debug, Default)]
pub struct SearchState
{
    /// Identifier labels already sent to the navigator
    pub searched: HashSet<String>,
    /// Definitions collected so far, in discovery order
    pub results: Vec<Definition>,
}

impl SearchState
{
    /// True when `candidate` overlaps an already collected result in the
    /// same file.
    pub fn covers(
        &self,
        candidate: &Definition,
    ) -> bool
    {
        self.results
            .iter()
            .any(|r| r.overlaps(candidate, IntersectionMode::Point))
    }
}

/// Bounds for a crawl
#[derive(Debug, Clone, Copy)]
pub struct CrawlLimits
{
    pub max_depth: usize,
    pub max_results: usize,
    /// Results longer than this are cut to their header
    pub truncate_lines: usize,
}

/// Turn a navigator answer into a definition snippet.
///
/// Answers that carry no text are read from disk.
pub fn definition_from(
    loc: Location,
    origin: SnippetOrigin,
) -> Option<Definition>
{
    let content = match loc.content
    {
        Some(c) => c,
        None => match read_range(&loc.path, &loc.range)
        {
            Ok(c) => c,
            Err(e) =>
            {
                debug!(path = %loc.path.display(), error = %e, "definition text unreadable");
                return None;
            }
        },
    };
    Some(Definition::new(loc.path, loc.range, content, origin))
}

/// Translate a node position inside `seed.content` into file coordinates.
///
/// The row is clamped to the parsed fragment; the seed's start column only
/// applies on the fragment's first row.
fn to_file_position(
    seed: &Definition,
    local: Position,
    fragment_lines: usize,
) -> Position
{
    let row = local.row.min(fragment_lines.saturating_sub(1));
    let column = if row == 0 { seed.range.start().column + local.column } else { local.column };
    Position::new(seed.range.start().row + row, column)
}

/// Resolve type references reachable from `seed`.
///
/// Walks a worklist: each entry is parsed, its unsearched type-like
/// identifiers are resolved, and new non-overlapping results are queued
/// again with one less level of depth. Depth 0 resolves the seed's own
/// references and stops. The crawl also stops once `max_results` are held.
#[instrument(level = "debug", skip_all, fields(seed = %seed.source_path.display(), depth = limits.max_depth))]
pub fn crawl_definitions(
    seed: &Definition,
    grammar: Grammar,
    limits: CrawlLimits,
    state: &mut SearchState,
    navigator: &dyn Navigator,
) -> Result<(), NavigatorError>
{
    let mut queue: VecDeque<(Definition, usize)> = VecDeque::from([(seed.clone(), limits.max_depth)]);

    while let Some((current, depth)) = queue.pop_front()
    {
        let Some(tree) = parse(&current.content, grammar)
        else
        {
            debug!(path = %current.source_path.display(), "fragment did not parse");
            continue;
        };

        let lines = tree.line_count().max(1);
        let fresh: Vec<(String, Position)> = tree
            .descendants()
            .into_iter()
            .filter(|n| tree.is_type_like(*n))
            .filter_map(|n| {
                let label = tree.node_text(n).to_owned();
                // Mark as searched before resolving so repeats are skipped
                state.searched.insert(label.clone()).then(|| (label, n.start_position().into()))
            })
            .collect();

        for (label, local) in fresh
        {
            if state.results.len() >= limits.max_results
            {
                debug!(max = limits.max_results, "crawl result ceiling reached");
                return Ok(());
            }

            let at = to_file_position(&current, local, lines);
            let Some(found) = navigator
                .goto_definition(&current.source_path, at)?
                .and_then(|loc| definition_from(loc, SnippetOrigin::Definition))
            else
            {
                debug!(%label, %at, "no definition");
                continue;
            };

            if state.covers(&found)
            {
                continue;
            }

            state.results.push(found.clone());
            if depth > 0
            {
                queue.push_back((found, depth - 1));
            }
        }
    }

    Ok(())
}

/// Cut a long callee down to its header.
///
/// Content over `max_lines` lines keeps everything before the body block of
/// its outermost declaration when that declaration is callable; otherwise
/// only the first line survives.
pub fn truncate_body(
    def: Definition,
    grammar: Grammar,
    max_lines: usize,
) -> Definition
{
    if def.content.lines().count() <= max_lines
    {
        return def;
    }

    let header = parse(&def.content, grammar)
        .and_then(|tree| header_of(&tree).map(str::to_owned))
        .unwrap_or_else(|| def.content.lines().next().unwrap_or("").to_owned());

    let end = def.range.start().after_text(&header);
    let range = Range::new(def.range.start(), end).unwrap_or(def.range);
    def.narrowed(range, header)
}

fn header_of(tree: &SourceTree) -> Option<&str>
{
    // Pre-order, so the first declaration is the outermost one
    let decl = tree
        .descendants()
        .into_iter()
        .find(|n| matches!(tree.category(*n), NodeCategory::Declaration(_)))?;
    if !matches!(tree.category(decl), NodeCategory::Declaration(kind) if kind.is_callable())
    {
        return None;
    }
    let block = descendants(decl)
        .into_iter()
        .find(|n| tree.category(*n) == NodeCategory::Block)?;

    let header = tree.text()[..block.start_byte()].trim();
    (!header.is_empty()).then_some(header)
}

/// Definitions behind the calls and instantiations on the cursor's path.
///
/// Innermost first: each callee is resolved and crawled for the types it
/// references. Only called functions are cut down to their header when
/// long; instantiated types are kept whole.
#[instrument(level = "debug", skip_all, fields(file = %file.display()))]
pub fn call_site_definitions(
    tree: &SourceTree,
    path: &[tree_sitter::Node<'_>],
    file: &Path,
    limits: CrawlLimits,
    navigator: &dyn Navigator,
) -> Result<Vec<Definition>, NavigatorError>
{
    let mut state = SearchState::default();

    for node in path.iter().rev()
    {
        if !matches!(tree.category(*node), NodeCategory::Call | NodeCategory::Instantiation)
        {
            continue;
        }
        let Some(callee) = tree.callee(*node)
        else
        {
            continue;
        };

        let label = tree.node_text(callee).to_owned();
        let Some(found) = navigator
            .goto_definition(file, callee.start_position().into())?
            .and_then(|loc| definition_from(loc, SnippetOrigin::Definition))
        else
        {
            debug!(%label, "callee not resolved");
            continue;
        };

        let found = match tree.category(*node)
        {
            NodeCategory::Call => truncate_body(found, tree.grammar(), limits.truncate_lines),
            _ => found,
        };
        state.searched.insert(label);
        if state.covers(&found)
        {
            continue;
        }
        state.results.push(found.clone());
        crawl_definitions(&found, tree.grammar(), limits, &mut state, navigator)?;
    }

    Ok(state.results)
}
