//! Request-level pipeline: gather candidates from every enabled source,
//! clean them up, rank them and pack them under the prompt budget.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::budgeter::{TokenCounter, pack};
use crate::core::crawler::{CrawlLimits, call_site_definitions};
use crate::core::imports::collect_imports;
use crate::core::navigator::{Navigator, NavigatorError};
use crate::core::range::{Position, Range};
use crate::core::ranking::{drop_redundant, order, score, scoring_window};
use crate::core::root_path::collect_root_path;
use crate::core::similar::SimilarCodeIndex;
use crate::core::snippet::{Definition, excise_region, merge_overlapping};
use crate::core::usage::{UsageOptions, collect_usages};
use crate::core::window::CaretWindow;
use crate::infra::config::EngineConfig;
use crate::parsers::grammar::Grammar;
use crate::parsers::queries::QueryCatalogue;
use crate::parsers::source::parse;

/// One completion point.
///
/// `path` must name the file the way the navigator does, so same-file
/// snippets can be recognised.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a>
{
    pub path: &'a Path,
    /// The file as it looks at completion time
    pub content: &'a str,
    pub cursor: Position,
}

/// Everything a prompt renderer needs.
#[derive(Debug, Clone, Serialize)]
pub struct PackedContext
{
    pub path: PathBuf,
    pub prefix: String,
    pub suffix: String,
    pub snippets: Vec<Definition>,
    /// Tokens the snippets were allowed to use
    pub budget: usize,
}

pub struct Engine<'n>
{
    cfg: EngineConfig,
    catalogue: QueryCatalogue,
    navigator: &'n dyn Navigator,
    counter: &'n dyn TokenCounter,
    similar: Option<&'n SimilarCodeIndex>,
}

impl<'n> Engine<'n>
{
    pub fn new(
        cfg: EngineConfig,
        grammar: Grammar,
        navigator: &'n dyn Navigator,
        counter: &'n dyn TokenCounter,
    ) -> Self
    {
        Self { cfg, catalogue: QueryCatalogue::new(grammar), navigator, counter, similar: None }
    }

    /// Also draw similar-code windows from `index`
    pub fn with_similar_code(
        mut self,
        index: &'n SimilarCodeIndex,
    ) -> Self
    {
        self.similar = Some(index);
        self
    }

    pub fn grammar(&self) -> Grammar
    {
        self.catalogue.grammar()
    }

    pub fn config(&self) -> &EngineConfig
    {
        &self.cfg
    }

    /// Caret window plus the packed snippets.
    pub fn build(
        &self,
        req: &CompletionRequest<'_>,
    ) -> PackedContext
    {
        let caret = CaretWindow::build(req.content, req.cursor, &self.cfg, self.counter);
        let budget = self
            .cfg
            .max_prompt_tokens
            .saturating_sub(self.counter.count(&caret.text()));
        let snippets = self.snippets_for(req, &caret, budget);

        PackedContext {
            path: req.path.to_path_buf(),
            prefix: caret.prefix,
            suffix: caret.suffix,
            snippets,
            budget,
        }
    }

    /// Ranked snippets that fit next to the caret window.
    ///
    /// Never fails: when the navigator gives up the result is empty and the
    /// prompt falls back to the caret window alone.
    pub fn build_snippets(
        &self,
        req: &CompletionRequest<'_>,
    ) -> Vec<Definition>
    {
        self.build(req).snippets
    }

    #[instrument(level = "debug", skip_all, fields(file = %req.path.display(), cursor = %req.cursor))]
    fn snippets_for(
        &self,
        req: &CompletionRequest<'_>,
        caret: &CaretWindow,
        budget: usize,
    ) -> Vec<Definition>
    {
        let candidates = match self.candidates(req, caret)
        {
            Ok(c) => c,
            Err(e) =>
            {
                warn!(error = %e, file = %req.path.display(), "navigator failed, using caret window only");
                Vec::new()
            }
        };
        let found = candidates.len();

        let kept = drop_redundant(candidates, &caret.text());
        let kept = dedup_exact(kept);
        let region = caret.region(self.cfg.caret_buffer_lines);
        let kept = excise_region(kept, req.path, req.content, &region);
        let kept = merge_overlapping(kept);

        let window = scoring_window(
            &caret.full_prefix,
            &caret.full_suffix,
            self.cfg.sliding_window_size,
            self.cfg.sliding_window_prefix_percentage,
        );
        let ranked = order(score(kept, &window), self.cfg.ranking_strategy());
        let ranked_len = ranked.len();

        let packed = pack(ranked, budget, self.cfg.snippet_overhead_tokens, self.counter);
        info!(found, ranked = ranked_len, packed = packed.len(), budget, "snippets built");
        packed
    }

    /// Run every enabled source, in a fixed order.
    fn candidates(
        &self,
        req: &CompletionRequest<'_>,
        caret: &CaretWindow,
    ) -> Result<Vec<Definition>, NavigatorError>
    {
        let cfg = &self.cfg;
        let mut out = Vec::new();

        // Text only; needs neither a parse nor the navigator
        if cfg.use_similar_code
        {
            if let Some(index) = self.similar
            {
                out.extend(index.retrieve(req.path, req.content, req.cursor));
            }
        }

        let text = completable(caret);
        let Some(tree) = parse(&text, self.grammar())
        else
        {
            debug!(file = %req.path.display(), "caret file did not parse");
            return Ok(out);
        };
        let path = tree.path_at(req.cursor);
        self.navigator.open_file(req.path)?;

        if cfg.use_root_path
        {
            out.extend(collect_root_path(&tree, &path, req.path, &self.catalogue, self.navigator)?);
        }
        if cfg.use_definitions
        {
            let limits = CrawlLimits {
                max_depth: cfg.crawl_depth,
                max_results: cfg.max_crawl_results,
                truncate_lines: cfg.truncate_body_lines,
            };
            out.extend(call_site_definitions(&tree, &path, req.path, limits, self.navigator)?);
        }
        if cfg.use_usages
        {
            let opts = UsageOptions { window_tokens: cfg.usage_window_tokens };
            out.extend(collect_usages(&tree, &path, req.path, opts, self.navigator, self.counter)?);
        }
        if cfg.use_imports
        {
            out.extend(collect_imports(&tree, req.path, caret, &self.catalogue, self.navigator)?);
        }

        Ok(out)
    }
}

/// File text to parse; an open call at the cursor is closed so it parses
/// as a call.
fn completable(caret: &CaretWindow) -> String
{
    let close = if caret.full_prefix.ends_with('(') { ")" } else { "" };
    format!("{}{close}{}", caret.full_prefix, caret.full_suffix)
}

/// Keep the first of several snippets with the same file and range.
fn dedup_exact(snippets: Vec<Definition>) -> Vec<Definition>
{
    let mut seen: HashSet<(PathBuf, Range)> = HashSet::new();
    snippets
        .into_iter()
        .filter(|s| seen.insert((s.source_path.clone(), s.range)))
        .collect()
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::core::budgeter::WhitespaceCounter;
    use crate::core::navigator::Location;
    use crate::core::snippet::SnippetOrigin;

    const FILE: &str = "Repo.java";
    const SRC: &str = "class Repo extends Base {\n  void save() {\n    \n  }\n}\n";

    /// Answers every lookup with the same location
    struct Always(Location);

    impl Navigator for Always
    {
        fn goto_definition(
            &self,
            _path: &Path,
            _position: Position,
        ) -> Result<Option<Location>, NavigatorError>
        {
            Ok(Some(self.0.clone()))
        }

        fn find_references(
            &self,
            _path: &Path,
            _position: Position,
        ) -> Result<Option<Vec<Location>>, NavigatorError>
        {
            Ok(None)
        }
    }

    struct Down;

    impl Navigator for Down
    {
        fn goto_definition(
            &self,
            _path: &Path,
            _position: Position,
        ) -> Result<Option<Location>, NavigatorError>
        {
            Err(NavigatorError::Timeout)
        }

        fn find_references(
            &self,
            _path: &Path,
            _position: Position,
        ) -> Result<Option<Vec<Location>>, NavigatorError>
        {
            Err(NavigatorError::Timeout)
        }
    }

    fn located(content: &str) -> Always
    {
        Always(Location {
            path: PathBuf::from("Base.java"),
            range: Range::rows(0, 1).unwrap(),
            content: Some(content.into()),
        })
    }

    fn request() -> CompletionRequest<'static>
    {
        CompletionRequest { path: Path::new(FILE), content: SRC, cursor: Position::new(2, 4) }
    }

    #[test]
    fn superclass_definition_is_packed()
    {
        let nav = located("class Base { int id; }");
        let engine = Engine::new(EngineConfig::default(), Grammar::Java, &nav, &WhitespaceCounter);

        let snippets = engine.build_snippets(&request());
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].origin, SnippetOrigin::RootPath);
        assert!(snippets[0].score.is_some());
    }

    #[test]
    fn navigator_failure_degrades_to_caret_only()
    {
        let engine = Engine::new(EngineConfig::default(), Grammar::Java, &Down, &WhitespaceCounter);
        let packed = engine.build(&request());

        assert!(packed.snippets.is_empty());
        assert_eq!(packed.prefix, "class Repo extends Base {\n  void save() {\n    ");
        assert_eq!(packed.suffix, "\n  }\n}\n");
    }

    #[test]
    fn text_already_in_caret_window_is_dropped()
    {
        let nav = located("void save() {");
        let engine = Engine::new(EngineConfig::default(), Grammar::Java, &nav, &WhitespaceCounter);
        assert!(engine.build_snippets(&request()).is_empty());
    }

    #[test]
    fn disabled_sources_issue_no_lookups()
    {
        let cfg = EngineConfig {
            use_root_path: false,
            use_definitions: false,
            use_usages: false,
            use_imports: false,
            ..EngineConfig::default()
        };
        let engine = Engine::new(cfg, Grammar::Java, &Down, &WhitespaceCounter);
        assert!(engine.build_snippets(&request()).is_empty());
    }

    fn similar_index() -> SimilarCodeIndex
    {
        let files = vec![
            (PathBuf::from(FILE), SRC.to_string()),
            (PathBuf::from("Other.java"), "class Other extends Base {\n  void load() {\n  }\n}\n".to_string()),
        ];
        SimilarCodeIndex::from_files(files, EngineConfig::default().similar_options())
    }

    fn text_only() -> EngineConfig
    {
        EngineConfig {
            use_root_path: false,
            use_definitions: false,
            use_usages: false,
            use_imports: false,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn similar_windows_from_other_files_are_packed()
    {
        let index = similar_index();
        let engine = Engine::new(text_only(), Grammar::Java, &Down, &WhitespaceCounter).with_similar_code(&index);

        let snippets = engine.build_snippets(&request());
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].origin, SnippetOrigin::SimilarCode);
        assert_eq!(snippets[0].source_path, PathBuf::from("Other.java"));
    }

    #[test]
    fn similar_code_toggle_is_honoured()
    {
        let index = similar_index();
        let cfg = EngineConfig { use_similar_code: false, ..text_only() };
        let engine = Engine::new(cfg, Grammar::Java, &Down, &WhitespaceCounter).with_similar_code(&index);
        assert!(engine.build_snippets(&request()).is_empty());
    }

    #[test]
    fn budget_is_what_the_caret_window_leaves()
    {
        let nav = located("class Base { int id; }");
        let cfg = EngineConfig { max_prompt_tokens: 20, ..EngineConfig::default() };
        let engine = Engine::new(cfg, Grammar::Java, &nav, &WhitespaceCounter);

        let packed = engine.build(&request());
        assert_eq!(packed.prefix, "  void save() {\n    ");
        assert_eq!(packed.budget, 15);
        // 6 tokens plus overhead no longer fit
        assert!(packed.snippets.is_empty());
    }

    #[test]
    fn open_call_is_closed_before_parsing()
    {
        let caret = CaretWindow {
            cursor: Position::new(0, 7),
            full_prefix: "helper(".into(),
            full_suffix: ";".into(),
            prefix: String::new(),
            suffix: String::new(),
        };
        assert_eq!(completable(&caret), "helper();");
    }
}
