//! `build` and `path` commands: one cursor position, printed for humans or
//! as JSON.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::warn;

use crate::cli::{AppContext, BuildArgs, PathArgs};
use crate::core::budgeter::counter_for;
use crate::core::engine::{CompletionRequest, Engine, PackedContext};
use crate::core::navigator::{CachedNavigator, RetryingNavigator};
use crate::core::range::Position;
use crate::core::render::Rendered;
use crate::core::similar::SimilarCodeIndex;
use crate::core::syntax::SyntaxNode;
use crate::core::workspace::WorkspaceNavigator;
use crate::infra::config::{Config, load_config};
use crate::infra::io::read_source;
use crate::parsers::grammar::Grammar;
use crate::parsers::source::parse;

/// Explicit grammar, else the one the file extension names
pub fn resolve_grammar(
    explicit: Option<Grammar>,
    file: &Path,
) -> Result<Grammar>
{
    explicit
        .or_else(|| Grammar::from_path(file))
        .with_context(|| format!("Cannot infer a grammar for {}; pass --grammar", file.display()))
}

/// Config from disk and environment, defaults when it cannot be read
pub fn effective_config() -> Config
{
    match load_config()
    {
        Ok(cfg) => cfg,
        Err(e) =>
        {
            warn!(error = %format!("{e:#}"), "config not loaded, using defaults");
            Config::default()
        }
    }
}

#[derive(Serialize)]
struct BuildOutput<'a>
{
    #[serde(flatten)]
    context: &'a PackedContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    rendered: Option<&'a Rendered>,
}

pub fn run(
    args: BuildArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let mut cfg = effective_config();
    cfg.apply_overrides(&args.engine);

    let grammar = resolve_grammar(args.grammar, &args.file)?;
    let workspace = WorkspaceNavigator::index(&args.root, grammar, &cfg.ignore_patterns)?;
    let file = workspace.resolve(&args.file);
    let content = read_source(&file)?;
    let counter = counter_for(&cfg.tokenizer.model)?;

    let similar = if cfg.engine.use_similar_code
    {
        Some(SimilarCodeIndex::build(workspace.root(), grammar, &cfg.ignore_patterns, cfg.engine.similar_options())?)
    }
    else
    {
        None
    };

    let navigator = CachedNavigator::new(RetryingNavigator::new(&workspace, &cfg.navigator), cfg.navigator.cache_size);
    let mut engine = Engine::new(cfg.engine.clone(), grammar, &navigator, counter.as_ref());
    if let Some(index) = &similar
    {
        engine = engine.with_similar_code(index);
    }

    let cursor = Position::new(args.cursor.line, args.cursor.column);
    let packed = engine.build(&CompletionRequest { path: &file, content: &content, cursor });
    let rendered = args.template.map(|t| t.render(&packed, grammar));

    if args.json
    {
        let out = BuildOutput { context: &packed, rendered: rendered.as_ref() };
        println!("{}", serde_json::to_string_pretty(&out).context("Failed to serialize output")?);
        return Ok(());
    }

    for snippet in &packed.snippets
    {
        let shown = snippet
            .source_path
            .strip_prefix(workspace.root())
            .unwrap_or(&snippet.source_path);
        let header = format!(
            "== {}:{} [{:?}] score {:.3}",
            shown.display(),
            snippet.range,
            snippet.origin,
            snippet.score.unwrap_or(0.0)
        );
        if ctx.no_color
        {
            println!("{header}");
        }
        else
        {
            println!("{}", header.cyan());
        }
        println!("{}\n", snippet.content);
    }

    if let Some(r) = rendered
    {
        println!("{}", r.prompt);
        println!("stops: {:?}", r.stops);
    }

    if !ctx.quiet
    {
        eprintln!("{} snippets, budget {} tokens", packed.snippets.len(), packed.budget);
    }
    Ok(())
}

/// Print the syntax path at the cursor, one node per line, indented by depth
pub fn path_run(
    args: PathArgs,
    _ctx: &AppContext,
) -> Result<()>
{
    let grammar = resolve_grammar(args.grammar, &args.file)?;
    let content = read_source(&args.file)?;
    let tree = parse(&content, grammar).with_context(|| format!("Failed to parse {}", args.file.display()))?;

    let cursor = Position::new(args.cursor.line, args.cursor.column);
    for (depth, node) in tree.path_at(cursor).iter().enumerate()
    {
        println!("{}{} {} {:?}", "  ".repeat(depth), node.tag(), node.span(), tree.category(*node));
    }
    Ok(())
}
