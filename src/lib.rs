//! **snippack** - retrieval-augmented context for code-completion prompts
//!
//! Given a cursor inside a source file, finds the structurally related code
//! around it (enclosing declarations, callees, usages, imports) and the
//! lexically similar windows elsewhere in the workspace, trims and
//! deduplicates the spans, ranks them by lexical overlap with the cursor
//! window and packs them under a token budget.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Retrieval pipeline, from range algebra up to the batch driver
pub mod core {
    /// Positions, ranges, intersection and subtraction
    pub mod range;
    pub use range::{IntersectionMode, Position, Range, RangeError};

    /// Definitions (snippets), overlap merging and caret-region excision
    pub mod snippet;
    pub use snippet::{Definition, SnippetOrigin};

    /// Syntax path from the root to the node under the cursor
    pub mod syntax;

    /// Goto-definition / find-references seam with retry and memo layers
    pub mod navigator;
    pub use navigator::{Location, Navigator, NavigatorError};

    /// Token counting (tiktoken + moka) and the greedy packer
    pub mod budgeter;
    pub use budgeter::{Budgeter, TokenCounter};

    /// Caret window and token-bounded line windows
    pub mod window;

    /// Jaccard scoring and ordering strategies
    pub mod ranking;

    /// Breadth-first definition crawl and call-site definitions
    pub mod crawler;

    /// Identifiers named by the enclosing declarations
    pub mod root_path;

    /// Call sites of what the cursor calls
    pub mod usage;

    /// Imported symbols used near the cursor
    pub mod imports;

    /// Sliding line windows ranked against the text above the cursor
    pub mod similar;
    pub use similar::SimilarCodeIndex;

    /// Per-request pipeline
    pub mod engine;
    pub use engine::{CompletionRequest, Engine, PackedContext};

    /// Prompt templates and stop sequences
    pub mod render;

    /// Name-based navigator over a parsed workspace (rayon-indexed)
    pub mod workspace;
    pub use workspace::WorkspaceNavigator;

    /// `build` and `path` commands
    pub mod build;
    pub use build::{path_run, run as build_run};

    /// JSONL batch driver over repository checkouts
    pub mod bench;
    pub use bench::run as bench_run;
}

/// Tree-sitter grammars, parsed sources and the query catalogue
pub mod parsers {
    /// Grammar enum and node-category lookup tables
    pub mod grammar;
    pub use grammar::{DeclKind, Grammar, NodeCategory};

    /// Parsed text + tree
    pub mod source;
    pub use source::{SourceTree, parse};

    /// Root-path and import queries per grammar
    pub mod queries;
    pub use queries::QueryCatalogue;
}

/// Infrastructure - configuration, I/O, walking and checkout mutation
pub mod infra {
    /// Layered configuration (file + SNIPPACK_* environment)
    pub mod config;
    pub use config::{Config, EngineConfig, init as config_init, load_config};

    /// Memory-mapped file I/O for large files (>1MB threshold)
    pub mod io;
    pub use io::{FileContent, read_file_smart};

    /// Row/column to byte mapping
    pub mod line_index;
    pub use line_index::NewlineIndex;

    /// Gitignore-aware directory walking
    pub mod walk;
    pub use walk::FileWalker;

    /// Scoped rewrites of checkout files, restored on drop
    pub mod checkout;
    pub use checkout::CheckoutGuard;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use core::{bench_run, build_run, path_run};
pub use infra::{Config, FileWalker, load_config};
