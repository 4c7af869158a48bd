//! Batch driver: run many completion cases against repository checkouts.
//!
//! Cases are grouped by checkout. Groups run in parallel on a rayon pool;
//! cases inside one group run in order, since each rewrites a file of the
//! shared checkout while its navigator session is live.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::cli::{AppContext, BenchArgs};
use crate::core::budgeter::{TokenCounter, counter_for};
use crate::core::build::effective_config;
use crate::core::engine::{CompletionRequest, Engine, PackedContext};
use crate::core::navigator::{CachedNavigator, RetryingNavigator};
use crate::core::range::Position;
use crate::core::render::{PromptTemplate, Rendered};
use crate::core::similar::SimilarCodeIndex;
use crate::core::workspace::WorkspaceNavigator;
use crate::infra::checkout::CheckoutGuard;
use crate::infra::config::Config;
use crate::parsers::grammar::Grammar;

/// One completion point: the file is cut at the end of `prompt`.
#[derive(Debug, Clone, Deserialize)]
pub struct BenchCase
{
    #[serde(default)]
    pub id: Option<String>,
    /// Checkout directory name under the repos root
    pub repo: String,
    /// File path inside the checkout
    pub file: PathBuf,
    /// Text before the cursor
    pub prompt: String,
    /// Text after the cursor
    pub right_context: String,
    #[serde(default)]
    pub grammar: Option<Grammar>,
}

impl BenchCase
{
    /// Cursor at the end of `prompt`
    pub fn cursor(&self) -> Position
    {
        let row = self.prompt.matches('\n').count();
        let column = self.prompt.rsplit('\n').next().map_or(0, str::len);
        Position::new(row, column)
    }

    fn grammar(&self) -> Option<Grammar>
    {
        self.grammar.or_else(|| Grammar::from_path(&self.file))
    }
}

/// Output line for one case
#[derive(Debug, Serialize)]
pub struct BenchRecord
{
    /// Position of the case in the input file
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub repo: String,
    pub file: PathBuf,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<PackedContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered: Option<Rendered>,
}

impl BenchRecord
{
    fn new(
        index: usize,
        case: &BenchCase,
        outcome: Result<(PackedContext, Rendered)>,
    ) -> Self
    {
        let (ok, error, context, rendered) = match outcome
        {
            Ok((c, r)) => (true, None, Some(c), Some(r)),
            Err(e) => (false, Some(format!("{e:#}")), None, None),
        };
        Self { index, id: case.id.clone(), repo: case.repo.clone(), file: case.file.clone(), ok, error, context, rendered }
    }
}

/// Settings shared by every case of a run
pub struct BenchOptions<'a>
{
    pub repos: PathBuf,
    pub template: PromptTemplate,
    pub config: Config,
    pub counter: &'a dyn TokenCounter,
}

/// Parse a JSONL case file, skipping blank lines.
pub fn load_cases(path: &Path) -> Result<Vec<BenchCase>>
{
    let f = File::open(path).with_context(|| format!("Failed to open cases file: {}", path.display()))?;
    let mut cases = Vec::new();

    for (i, line) in BufReader::new(f).lines().enumerate()
    {
        let line = line.with_context(|| format!("Failed to read line {}", i + 1))?;
        if line.trim().is_empty()
        {
            continue;
        }
        let case: BenchCase =
            serde_json::from_str(&line).with_context(|| format!("Failed to parse case on line {}", i + 1))?;
        cases.push(case);
    }

    Ok(cases)
}

/// Rewrite the case file, build and render its context, restore the file.
#[instrument(level = "debug", skip_all, fields(repo = %case.repo, file = %case.file.display()))]
fn run_case(
    workspace: &mut WorkspaceNavigator,
    similar: Option<&SimilarCodeIndex>,
    case: &BenchCase,
    grammar: Grammar,
    opts: &BenchOptions<'_>,
) -> Result<(PackedContext, Rendered)>
{
    let path = workspace.root().join(&case.file);
    let content = format!("{}{}", case.prompt, case.right_context);

    let guard = CheckoutGuard::rewrite(&path, &content)?;
    workspace.refresh(&path);

    let outcome = {
        let nav_cfg = &opts.config.navigator;
        let navigator = CachedNavigator::new(RetryingNavigator::new(&*workspace, nav_cfg), nav_cfg.cache_size);
        let mut engine = Engine::new(opts.config.engine.clone(), grammar, &navigator, opts.counter);
        if let Some(index) = similar
        {
            engine = engine.with_similar_code(index);
        }

        let file = workspace.resolve(&path);
        let packed = engine.build(&CompletionRequest { path: &file, content: &content, cursor: case.cursor() });
        let rendered = opts.template.render(&packed, grammar);
        (packed, rendered)
    };

    let restored = guard.restore();
    workspace.refresh(&path);
    restored?;
    Ok(outcome)
}

/// All cases of one checkout and grammar, in input order.
fn run_group(
    repo: &str,
    grammar: Grammar,
    cases: &[(usize, &BenchCase)],
    opts: &BenchOptions<'_>,
    progress: &ProgressBar,
) -> Vec<BenchRecord>
{
    let root = opts.repos.join(repo);
    let mut workspace = match WorkspaceNavigator::index(&root, grammar, &opts.config.ignore_patterns)
    {
        Ok(ws) => Some(ws),
        Err(e) =>
        {
            warn!(repo, error = %format!("{e:#}"), "checkout not indexed");
            None
        }
    };

    // Built before any case rewrites a file; the caret file never
    // contributes windows
    let similar = if opts.config.engine.use_similar_code && workspace.is_some()
    {
        let engine = &opts.config.engine;
        match SimilarCodeIndex::build(&root, grammar, &opts.config.ignore_patterns, engine.similar_options())
        {
            Ok(index) => Some(index),
            Err(e) =>
            {
                warn!(repo, error = %format!("{e:#}"), "similar-code windows not built");
                None
            }
        }
    }
    else
    {
        None
    };

    cases
        .iter()
        .map(|&(index, case)| {
            let outcome = match workspace.as_mut()
            {
                Some(ws) => run_case(ws, similar.as_ref(), case, grammar, opts),
                None => Err(anyhow::anyhow!("checkout {} could not be indexed", root.display())),
            };
            if let Err(e) = &outcome
            {
                warn!(index, repo, error = %format!("{e:#}"), "case failed");
            }
            progress.inc(1);
            BenchRecord::new(index, case, outcome)
        })
        .collect()
}

/// Run every case; failures become `ok: false` records. Output follows
/// input order.
pub fn run_cases(
    cases: &[BenchCase],
    opts: &BenchOptions<'_>,
    progress: &ProgressBar,
) -> Vec<BenchRecord>
{
    let mut records = Vec::with_capacity(cases.len());
    let mut groups: IndexMap<(String, Grammar), Vec<(usize, &BenchCase)>> = IndexMap::new();

    for (index, case) in cases.iter().enumerate()
    {
        match case.grammar()
        {
            Some(g) => groups
                .entry((case.repo.clone(), g))
                .or_default()
                .push((index, case)),
            None =>
            {
                let err = anyhow::anyhow!("no grammar for {}", case.file.display());
                progress.inc(1);
                records.push(BenchRecord::new(index, case, Err(err)));
            }
        }
    }

    let groups: Vec<_> = groups.into_iter().collect();
    let grouped: Vec<Vec<BenchRecord>> = groups
        .par_iter()
        .map(|((repo, grammar), members)| run_group(repo, *grammar, members, opts, progress))
        .collect();

    records.extend(grouped.into_iter().flatten());
    records.sort_by_key(|r| r.index);
    records
}

fn write_records(
    path: &Path,
    records: &[BenchRecord],
) -> Result<()>
{
    let f = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(f);
    for r in records
    {
        serde_json::to_writer(&mut out, r).context("Failed to serialize record")?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

pub fn run(
    args: BenchArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let mut config = effective_config();
    config.apply_overrides(&args.engine);

    let cases = load_cases(&args.cases)?;
    let counter = counter_for(&config.tokenizer.model)?;

    let progress = if ctx.quiet
    {
        ProgressBar::hidden()
    }
    else
    {
        let pb = ProgressBar::new(cases.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .context("Invalid progress template")?
                .progress_chars("#>-"),
        );
        pb
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.jobs)
        .build()
        .context("Failed to start worker pool")?;

    let opts = BenchOptions { repos: args.repos, template: args.template, config, counter: counter.as_ref() };
    let records = pool.install(|| run_cases(&cases, &opts, &progress));
    progress.finish_and_clear();

    write_records(&args.output, &records)?;

    if !ctx.quiet
    {
        let failed = records.iter().filter(|r| !r.ok).count();
        println!("{} cases, {} failed, results in {}", records.len(), failed, args.output.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::core::budgeter::WhitespaceCounter;

    fn case(
        repo: &str,
        file: &str,
        prompt: &str,
        right: &str,
    ) -> BenchCase
    {
        BenchCase {
            id: None,
            repo: repo.into(),
            file: file.into(),
            prompt: prompt.into(),
            right_context: right.into(),
            grammar: None,
        }
    }

    #[test]
    fn cursor_sits_at_end_of_prompt()
    {
        assert_eq!(case("r", "A.java", "class A {\n  int x", "").cursor(), Position::new(1, 7));
        assert_eq!(case("r", "A.java", "", "").cursor(), Position::new(0, 0));
        assert_eq!(case("r", "A.java", "a\n", "").cursor(), Position::new(1, 0));
    }

    #[test]
    fn cases_run_and_checkout_is_restored() -> Result<()>
    {
        let repos = TempDir::new()?;
        let repo = repos.path().join("demo");
        fs::create_dir_all(&repo)?;
        fs::write(repo.join("Base.java"), "class Base {\n  int id;\n}\n")?;
        fs::write(repo.join("Repo.java"), "class Repo {}\n")?;

        let cases = vec![
            case("demo", "Repo.java", "class Repo extends Base {\n  void save() {\n    ", "\n  }\n}\n"),
            case("missing", "X.java", "class X {", "}"),
            case("demo", "notes.txt", "hello", ""),
        ];

        let opts = BenchOptions {
            repos: repos.path().to_path_buf(),
            template: PromptTemplate::CommentedFim,
            config: Config::default(),
            counter: &WhitespaceCounter,
        };
        let records = run_cases(&cases, &opts, &ProgressBar::hidden());

        assert_eq!(records.iter().map(|r| r.index).collect::<Vec<_>>(), [0, 1, 2]);
        assert!(records[0].ok);
        assert!(!records[1].ok);
        assert!(!records[2].ok);

        let context = records[0].context.as_ref().unwrap();
        assert!(context.snippets.iter().any(|s| s.content.contains("class Base")));
        assert!(records[0].rendered.as_ref().unwrap().prompt.contains("// Path: Base.java"));

        assert_eq!(fs::read_to_string(repo.join("Repo.java"))?, "class Repo {}\n");
        Ok(())
    }

    #[test]
    fn loads_jsonl_and_skips_blank_lines() -> Result<()>
    {
        let dir = TempDir::new()?;
        let path = dir.path().join("cases.jsonl");
        fs::write(
            &path,
            "{\"repo\":\"r\",\"file\":\"a.py\",\"prompt\":\"x = \",\"right_context\":\"\"}\n\n{\"id\":\"2\",\"repo\":\"r\",\"file\":\"b.rs\",\"prompt\":\"\",\"right_context\":\"\",\"grammar\":\"rust\"}\n",
        )?;

        let cases = load_cases(&path)?;
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1].id.as_deref(), Some("2"));
        assert_eq!(cases[1].grammar, Some(Grammar::Rust));
        Ok(())
    }
}
