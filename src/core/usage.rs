//! Usage sites: other places that call what the cursor is calling.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, instrument, warn};

use crate::core::budgeter::TokenCounter;
use crate::core::navigator::{Location, Navigator, NavigatorError};
use crate::core::range::{Position, Range};
use crate::core::snippet::{Definition, SnippetOrigin};
use crate::core::window::window_around;
use crate::infra::io::{read_range, read_source};
use crate::parsers::grammar::NodeCategory;
use crate::parsers::source::SourceTree;

/// Usage context settings
#[derive(Debug, Clone, Copy)]
pub struct UsageOptions
{
    /// Token ceiling of each line window
    pub window_tokens: usize,
}

/// References to the callees on `path`, innermost first, expanded into
/// line windows.
///
/// The callee's declaration itself and the call under the cursor are left
/// out; calls inside the callee's body, recursive ones included, are kept.
#[instrument(level = "debug", skip_all, fields(file = %file.display()))]
pub fn collect_usages(
    tree: &SourceTree,
    path: &[tree_sitter::Node<'_>],
    file: &Path,
    opts: UsageOptions,
    navigator: &dyn Navigator,
    counter: &dyn TokenCounter,
) -> Result<Vec<Definition>, NavigatorError>
{
    let mut resolved: HashSet<Position> = HashSet::new();
    let mut sites: Vec<Location> = Vec::new();

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
        let call_site: Position = callee.start_position().into();
        if !resolved.insert(call_site)
        {
            continue;
        }

        let Some(def) = navigator.goto_definition(file, call_site)?
        else
        {
            debug!(label = tree.node_text(callee), "callee not resolved");
            continue;
        };

        let refs = navigator
            .find_references(&def.path, def.range.start())?
            .unwrap_or_default();

        let label = tree.node_text(callee);
        let name = name_span(&def, label);
        sites.extend(refs.into_iter().filter(|r| {
            let at = r.range.start();
            let at_definition = r.path == def.path
                && match name
                {
                    Some(span) => at == def.range.start() || span.contains(at),
                    // Name unknown: the declaring row stands in for it
                    None => at.row == def.range.start().row,
                };
            let at_cursor = r.path == file && at == call_site;
            !at_definition && !at_cursor
        }));
    }

    Ok(expand_sites(sites, file, tree.text(), opts, counter))
}

/// Span of the first whole-word occurrence of `label` in the definition
/// text, in file coordinates.
fn name_span(
    def: &Location,
    label: &str,
) -> Option<Range>
{
    let text = match &def.content
    {
        Some(c) => c.clone(),
        None => match read_range(&def.path, &def.range)
        {
            Ok(c) => c,
            Err(e) =>
            {
                debug!(path = %def.path.display(), error = %e, "definition text unreadable");
                return None;
            }
        },
    };

    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let idx = text.match_indices(label).map(|(i, _)| i).find(|&i| {
        let before = text[..i].chars().next_back().is_none_or(|c| !is_word(c));
        let after = text[i + label.len()..].chars().next().is_none_or(|c| !is_word(c));
        before && after
    })?;

    let start = def.range.start().after_text(&text[..idx]);
    Range::new(start, start.after_text(label)).ok()
}

/// Read each site's file once and cut a line window around it.
fn expand_sites(
    sites: Vec<Location>,
    current: &Path,
    current_text: &str,
    opts: UsageOptions,
    counter: &dyn TokenCounter,
) -> Vec<Definition>
{
    let mut out = Vec::with_capacity(sites.len());
    let mut cache: std::collections::HashMap<&Path, String> = std::collections::HashMap::new();

    for site in &sites
    {
        let text = if site.path == current
        {
            current_text
        }
        else
        {
            if !cache.contains_key(site.path.as_path())
            {
                match read_source(&site.path)
                {
                    Ok(t) =>
                    {
                        cache.insert(site.path.as_path(), t);
                    }
                    Err(e) =>
                    {
                        warn!(path = %site.path.display(), error = %e, "usage site unreadable");
                        continue;
                    }
                }
            }
            cache.get(site.path.as_path()).map_or("", String::as_str)
        };

        let lines: Vec<&str> = text.lines().collect();
        if let Some(w) = window_around(site.range.start().row, &lines, opts.window_tokens, counter)
        {
            out.push(Definition::new(site.path.clone(), w.range, w.text, SnippetOrigin::Usage));
        }
    }

    out
}
