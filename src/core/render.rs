//! Prompt templates: turn a packed context into a model prompt and its stop
//! sequences.

use std::path::{Component, Path};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::core::engine::PackedContext;
use crate::parsers::grammar::Grammar;

/// Stop sequences every template adds
pub const COMMON_STOPS: [&str; 3] = ["/src/", "#- coding: utf-8", "```"];

const FIM_BEGIN: &str = "<｜fim▁begin｜>";
const FIM_HOLE: &str = "<｜fim▁hole｜>";
const FIM_END: &str = "<｜fim▁end｜>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PromptTemplate
{
    /// Snippets as line comments above the prefix, fill-in-the-middle markers
    #[default]
    CommentedFim,
    /// `+++++ path` file headers, suffix before prefix
    FileMarkers,
}

/// A finished prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rendered
{
    pub prompt: String,
    /// Prefix as sent, with snippets or headers folded in
    pub prefix: String,
    pub suffix: String,
    pub stops: Vec<String>,
}

impl PromptTemplate
{
    pub fn render(
        self,
        ctx: &PackedContext,
        grammar: Grammar,
    ) -> Rendered
    {
        match self
        {
            PromptTemplate::CommentedFim => commented_fim(ctx, grammar),
            PromptTemplate::FileMarkers => file_markers(ctx),
        }
    }
}

fn is_blank_file(ctx: &PackedContext) -> bool
{
    ctx.prefix.trim().is_empty() && ctx.suffix.trim().is_empty()
}

fn with_common_stops(stops: &[&str]) -> Vec<String>
{
    stops
        .iter()
        .chain(COMMON_STOPS.iter())
        .map(|s| (*s).to_owned())
        .collect()
}

fn commented_fim(
    ctx: &PackedContext,
    grammar: Grammar,
) -> Rendered
{
    let comment = grammar.comment_symbol();
    let blocks: Vec<String> = ctx
        .snippets
        .iter()
        .map(|s| {
            let name = s
                .source_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut lines = vec![format!("{comment} Path: {name}")];
            lines.extend(s.content.trim().lines().map(|l| format!("{comment} {l}")));
            lines.push(comment.to_owned());
            lines.join("\n")
        })
        .collect();

    let prefix = if !blocks.is_empty()
    {
        format!("{}\n\n{}", blocks.join("\n"), ctx.prefix)
    }
    else if is_blank_file(ctx)
    {
        format!("{comment} {}\n{}", last_parts(&ctx.path, 2), ctx.prefix)
    }
    else
    {
        ctx.prefix.clone()
    };

    Rendered {
        prompt: format!("{FIM_BEGIN}{prefix}{FIM_HOLE}{}{FIM_END}", ctx.suffix),
        prefix,
        suffix: ctx.suffix.clone(),
        stops: with_common_stops(&[FIM_BEGIN, FIM_HOLE, FIM_END, "//", "<｜end▁of▁sentence｜>"]),
    }
}

fn file_markers(ctx: &PackedContext) -> Rendered
{
    let prefix = if ctx.snippets.is_empty()
    {
        if is_blank_file(ctx)
        {
            format!("+++++ {}\n{}", last_parts(&ctx.path, 2), ctx.prefix)
        }
        else
        {
            ctx.prefix.clone()
        }
    }
    else
    {
        let mut paths: Vec<&Path> = ctx
            .snippets
            .iter()
            .map(|s| s.source_path.as_path())
            .collect();
        paths.push(&ctx.path);
        let names = shortest_unique_suffixes(&paths);

        let others: Vec<String> = ctx
            .snippets
            .iter()
            .zip(&names)
            .map(|(s, name)| format!("+++++ {name}\n{}", s.content))
            .collect();
        let own = names.last().map_or("", String::as_str);
        format!("{}\n\n+++++ {own}\n{}", others.join("\n\n"), ctx.prefix)
    };

    Rendered {
        prompt: format!("[SUFFIX]{}[PREFIX]{prefix}", ctx.suffix),
        prefix,
        suffix: ctx.suffix.clone(),
        stops: with_common_stops(&["[PREFIX]", "[SUFFIX]"]),
    }
}

fn normal_parts(path: &Path) -> Vec<String>
{
    path.components()
        .filter_map(|c| match c
        {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// The last `n` components of `path`, joined with `/`.
pub fn last_parts(
    path: &Path,
    n: usize,
) -> String
{
    let parts = normal_parts(path);
    parts[parts.len().saturating_sub(n)..].join("/")
}

/// Shortest trailing component run per path that tells distinct paths
/// apart. Equal paths share a name.
pub fn shortest_unique_suffixes(paths: &[&Path]) -> Vec<String>
{
    let depth: Vec<usize> = paths
        .iter()
        .map(|p| normal_parts(p).len())
        .collect();
    let mut take = vec![1usize; paths.len()];

    loop
    {
        let names: Vec<String> = paths
            .iter()
            .zip(&take)
            .map(|(p, &n)| last_parts(p, n))
            .collect();

        let mut grew = false;
        for i in 0..paths.len()
        {
            let clash = (0..paths.len()).any(|j| paths[j] != paths[i] && names[j] == names[i]);
            if clash && take[i] < depth[i]
            {
                take[i] += 1;
                grew = true;
            }
        }
        if !grew
        {
            return names;
        }
    }
}
