use anyhow::Result;
use clap::Parser;
use snippack::cli::{AppContext, Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        verbose: cli.verbose,
        no_color: cli.no_color,
    };
    init_tracing(&ctx);

    match cli.command {
        Commands::Build(args) => snippack::build_run(args, &ctx),
        Commands::Path(args) => snippack::path_run(args, &ctx),
        Commands::Bench(args) => snippack::bench_run(args, &ctx),
        Commands::Init(args) => snippack::infra::config::init(args, &ctx),
        Commands::Completions(args) => snippack::completion::run(args, &ctx),
    }
}

/// Logs go to stderr; RUST_LOG wins over --verbose
fn init_tracing(ctx: &AppContext) {
    let fallback = if ctx.verbose { "snippack=info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!ctx.no_color)
        .with_target(false)
        .init();
}
