use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::core::ranking::RankingOrder;
use crate::core::render::PromptTemplate;
use crate::parsers::grammar::Grammar;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub verbose: bool,  // global --verbose
    pub no_color: bool, // global --no-color
}

#[derive(Parser)]
#[command(name = "snippack")]
#[command(about = "Gather, rank and pack repository context for code-completion prompts")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Log pipeline decisions to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the packed snippets for one cursor position
    Build(BuildArgs),

    /// Print the syntax path enclosing a cursor position
    Path(PathArgs),

    /// Run a JSONL batch of completion cases against repository checkouts
    Bench(BenchArgs),

    /// Initialize a snippack.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Zero-based cursor position
#[derive(Debug, Clone, Copy, Args)]
pub struct CursorArgs {
    /// Cursor row (0-based)
    #[arg(long)]
    pub line: usize,

    /// Cursor column in bytes (0-based)
    #[arg(long, default_value = "0")]
    pub column: usize,
}

/// Overrides applied on top of the loaded config
#[derive(Debug, Clone, Default, Args)]
pub struct EngineArgs {
    /// Maximum prompt size in tokens
    #[arg(long)]
    pub budget: Option<usize>,

    /// Tokenizer model or encoding (e.g., gpt-4o, cl100k_base, whitespace)
    #[arg(long)]
    pub model: Option<String>,

    /// Candidate order before packing
    #[arg(long, value_enum)]
    pub strategy: Option<RankingOrder>,

    /// Seed for the shuffled strategy
    #[arg(long)]
    pub seed: Option<u64>,

    /// Additional glob patterns to ignore while indexing
    #[arg(short, long)]
    pub ignore: Vec<String>,
}

#[derive(Debug, Parser)]
pub struct BuildArgs {
    /// Workspace root to index
    pub root: PathBuf,

    /// File containing the cursor, relative to the root or absolute
    pub file: PathBuf,

    #[command(flatten)]
    pub cursor: CursorArgs,

    /// Grammar override (defaults to the file extension)
    #[arg(long, value_enum)]
    pub grammar: Option<Grammar>,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Also render the prompt with this template
    #[arg(long, value_enum)]
    pub template: Option<PromptTemplate>,

    /// Emit JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct PathArgs {
    /// Source file to parse
    pub file: PathBuf,

    #[command(flatten)]
    pub cursor: CursorArgs,

    /// Grammar override (defaults to the file extension)
    #[arg(long, value_enum)]
    pub grammar: Option<Grammar>,
}

#[derive(Debug, Parser)]
pub struct BenchArgs {
    /// JSONL file with one case per line (repo, file, prompt, right_context)
    pub cases: PathBuf,

    /// Directory holding one checkout per `repo` value
    #[arg(long)]
    pub repos: PathBuf,

    /// JSONL output path
    #[arg(short, long, default_value = "snippack-results.jsonl")]
    pub output: PathBuf,

    /// Worker threads (0 = one per core)
    #[arg(short, long, default_value = "0")]
    pub jobs: usize,

    /// Prompt template for the rendered output
    #[arg(long, value_enum, default_value = "commented-fim")]
    pub template: PromptTemplate,

    #[command(flatten)]
    pub engine: EngineArgs,
}

#[derive(Debug, Parser)]
pub struct InitArgs {
    /// Directory to write snippack.toml into
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Directory to write the script into (required without --stdout)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
