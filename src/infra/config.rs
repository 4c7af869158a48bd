use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, EngineArgs, InitArgs};
use crate::core::ranking::{RankingOrder, RankingStrategy};
use crate::core::similar::SimilarOptions;

/// Candidate file names, first existing one wins
const CONFIG_FILES: [&str; 4] = ["snippack.toml", "snippack.yaml", "snippack.json", ".snippack.toml"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Globs skipped when indexing a workspace (in addition to .gitignore)
    pub ignore_patterns: Vec<String>,

    /// Retrieval, ranking and packing knobs
    pub engine: EngineConfig,

    /// Retry, timeout and cache policy for the source navigator
    pub navigator: NavigatorConfig,

    /// Token counting
    pub tokenizer: TokenizerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig
{
    pub max_prompt_tokens: usize,
    pub prefix_percentage: f64,
    pub max_suffix_percentage: f64,
    pub sliding_window_size: usize,
    pub sliding_window_prefix_percentage: f64,
    pub snippet_overhead_tokens: usize,
    pub crawl_depth: usize,
    pub max_crawl_results: usize,
    pub usage_window_tokens: usize,
    pub caret_buffer_lines: usize,
    pub truncate_body_lines: usize,
    pub ranking: RankingOrder,
    pub shuffle_seed: u64,
    pub use_root_path: bool,
    pub use_definitions: bool,
    pub use_usages: bool,
    pub use_imports: bool,
    pub use_similar_code: bool,
    /// Rows per similar-code window
    pub similar_window_lines: usize,
    /// Windows overlapping each row; the step is `window / slice`
    pub similar_slice_size: usize,
    pub similar_top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig
{
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub timeout_ms: u64,
    pub cache_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig
{
    /// Any tiktoken model name, or `cl100k_base` / `o200k_base`
    pub model: String,
}

impl Default for EngineConfig
{
    fn default() -> Self
    {
        Self {
            max_prompt_tokens: 1024,
            prefix_percentage: 0.3,
            max_suffix_percentage: 0.2,
            sliding_window_size: 500,
            sliding_window_prefix_percentage: 0.75,
            snippet_overhead_tokens: 10,
            crawl_depth: 1,
            max_crawl_results: 64,
            usage_window_tokens: 128,
            caret_buffer_lines: 8,
            truncate_body_lines: 15,
            ranking: RankingOrder::Descending,
            shuffle_seed: 0,
            use_root_path: true,
            use_definitions: true,
            use_usages: true,
            use_imports: true,
            use_similar_code: true,
            similar_window_lines: 20,
            similar_slice_size: 2,
            similar_top_k: 10,
        }
    }
}

impl EngineConfig
{
    pub fn ranking_strategy(&self) -> RankingStrategy
    {
        self.ranking.with_seed(self.shuffle_seed)
    }

    pub fn similar_options(&self) -> SimilarOptions
    {
        SimilarOptions {
            window_lines: self.similar_window_lines,
            slice_size: self.similar_slice_size,
            top_k: self.similar_top_k,
        }
    }
}

impl Default for NavigatorConfig
{
    fn default() -> Self
    {
        Self { max_retries: 3, backoff_ms: 200, timeout_ms: 5000, cache_size: 50 }
    }
}

impl Default for TokenizerConfig
{
    fn default() -> Self
    {
        Self { model: "gpt-4o".to_string() }
    }
}

impl Config
{
    /// Default plus the usual build/vendor directories ignored
    pub fn with_default_ignores() -> Self
    {
        Self {
            ignore_patterns: ["**/target", "**/node_modules", "**/build", "**/dist", "**/__pycache__", "**/.git"]
                .into_iter()
                .map(String::from)
                .collect(),
            ..Self::default()
        }
    }

    /// Layer command-line overrides over the loaded values
    pub fn apply_overrides(
        &mut self,
        args: &EngineArgs,
    )
    {
        if let Some(budget) = args.budget
        {
            self.engine.max_prompt_tokens = budget;
        }
        if let Some(model) = &args.model
        {
            self.tokenizer.model = model.clone();
        }
        if let Some(strategy) = args.strategy
        {
            self.engine.ranking = strategy;
        }
        if let Some(seed) = args.seed
        {
            self.engine.shuffle_seed = seed;
        }
        self.ignore_patterns.extend(args.ignore.iter().cloned());
    }
}

/// Load configuration from the working directory and the environment
pub fn load_config() -> Result<Config>
{
    load_config_in(Path::new("."))
}

/// Load configuration rooted at `dir`.
///
/// The first existing candidate file is layered under `SNIPPACK_*`
/// environment variables (`SNIPPACK_ENGINE__MAX_PROMPT_TOKENS=2048`).
pub fn load_config_in(dir: &Path) -> Result<Config>
{
    let mut builder = config::Config::builder();

    if let Some(path) = CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
    {
        tracing::debug!(path = %path.display(), "loading config file");
        builder = builder.add_source(config::File::from(path));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SNIPPACK")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

/// Path the `init` command writes to
pub fn config_path(dir: &Path) -> PathBuf
{
    dir.join(CONFIG_FILES[0])
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = config_path(&args.path);

    if config_path.exists() && !args.force
    {
        anyhow::bail!("Config file already exists at {}. Use --force to overwrite.", config_path.display());
    }

    let config = Config::with_default_ignores();
    let toml_string = toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn defaults_match_documented_values()
    {
        let cfg = Config::default();
        assert_eq!(cfg.engine.max_prompt_tokens, 1024);
        assert_eq!(cfg.engine.snippet_overhead_tokens, 10);
        assert_eq!(cfg.engine.ranking_strategy(), RankingStrategy::Descending);
        assert_eq!(cfg.navigator.cache_size, 50);
        assert_eq!(cfg.tokenizer.model, "gpt-4o");
        assert!(cfg.engine.use_similar_code);
        assert_eq!(cfg.engine.similar_options(), SimilarOptions { window_lines: 20, slice_size: 2, top_k: 10 });
    }

    #[test]
    fn partial_file_fills_in_defaults() -> Result<()>
    {
        let dir = tempfile::tempdir()?;
        std::fs::write(
            dir.path().join("snippack.toml"),
            "[engine]\nmax_prompt_tokens = 2048\nranking = \"shuffled\"\nshuffle_seed = 7\n",
        )?;

        let cfg = load_config_in(dir.path())?;
        assert_eq!(cfg.engine.max_prompt_tokens, 2048);
        assert_eq!(cfg.engine.prefix_percentage, 0.3);
        assert_eq!(cfg.engine.ranking_strategy(), RankingStrategy::Shuffled { seed: 7 });
        assert_eq!(cfg.navigator.max_retries, 3);
        Ok(())
    }

    #[test]
    fn cli_overrides_win()
    {
        let mut cfg = Config::default();
        cfg.apply_overrides(&EngineArgs {
            budget: Some(512),
            model: Some("whitespace".into()),
            strategy: Some(RankingOrder::Shuffled),
            seed: Some(3),
            ignore: vec!["gen/**".into()],
        });

        assert_eq!(cfg.engine.max_prompt_tokens, 512);
        assert_eq!(cfg.tokenizer.model, "whitespace");
        assert_eq!(cfg.engine.ranking_strategy(), RankingStrategy::Shuffled { seed: 3 });
        assert_eq!(cfg.ignore_patterns, ["gen/**"]);
    }

    #[test]
    fn written_default_round_trips() -> Result<()>
    {
        let dir = tempfile::tempdir()?;
        let ctx = AppContext { quiet: true, verbose: false, no_color: true };
        init(InitArgs { path: dir.path().to_path_buf(), force: false }, &ctx)?;

        let cfg = load_config_in(dir.path())?;
        assert!(cfg.ignore_patterns.iter().any(|p| p == "**/target"));

        // Second init without --force refuses to overwrite
        let again = init(InitArgs { path: dir.path().to_path_buf(), force: false }, &ctx);
        assert!(again.is_err());
        Ok(())
    }
}
