//! `snippack completions`: shell scripts generated from the clap definition.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{Shell as CompletionShell, generate, generate_to};

use crate::cli::{AppContext, Cli, CompletionsArgs, Shell};

/// Binary name the scripts complete
const BIN: &str = "snippack";

impl From<Shell> for CompletionShell {
    fn from(shell: Shell) -> Self {
        match shell {
            Shell::Bash => Self::Bash,
            Shell::Zsh => Self::Zsh,
            Shell::Fish => Self::Fish,
            Shell::PowerShell => Self::PowerShell,
            Shell::Elvish => Self::Elvish,
        }
    }
}

/// Write the script for `shell` into `dir`, returning the file written
pub fn write_script(shell: Shell, dir: &std::path::Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    generate_to(CompletionShell::from(shell), &mut Cli::command(), BIN, dir)
        .with_context(|| format!("Failed to write completion script into {}", dir.display()))
}

pub fn run(args: CompletionsArgs, ctx: &AppContext) -> Result<()> {
    if args.stdout {
        generate(CompletionShell::from(args.shell), &mut Cli::command(), BIN, &mut io::stdout());
        return Ok(());
    }

    let Some(dir) = args.out_dir else {
        anyhow::bail!("Pass --out-dir DIR or --stdout");
    };
    let path = write_script(args.shell, &dir)?;

    if !ctx.quiet {
        eprintln!("Wrote completion to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_lands_in_out_dir() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_script(Shell::Fish, &dir.path().join("fish"))?;

        assert!(path.starts_with(dir.path()));
        assert!(std::fs::read_to_string(&path)?.contains("snippack"));
        Ok(())
    }
}
