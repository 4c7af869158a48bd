//! Source discovery for workspace indexing.
//!
//! Git ignore rules apply whether or not the root is a checkout. Configured
//! globs and the grammar's extensions narrow the result further, and the
//! output is sorted so name resolution is stable across runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{DirEntry, WalkBuilder};

use crate::parsers::grammar::Grammar;

/// Walker over the source files of a workspace.
///
/// Configured globs prune matching directories during the walk and are
/// checked again against every file that survives it.
pub struct FileWalker
{
    /// Compiled set of additional ignore patterns
    ignore_patterns: GlobSet,

    /// Accepted file extensions; empty accepts every file
    extensions: Vec<&'static str>,

    /// Include hidden (dot) files; default false
    include_hidden: bool,
}

impl FileWalker
{
    /// Walker skipping `additional_ignores`, globs matched against paths
    /// relative to the walked root.
    pub fn new(additional_ignores: &[String]) -> Result<Self>
    {
        let mut builder = GlobSetBuilder::new();

        for pattern in additional_ignores
        {
            builder.add(Glob::new(pattern).with_context(|| format!("invalid ignore glob {pattern:?}"))?);
        }

        Ok(Self { ignore_patterns: builder.build()?, extensions: Vec::new(), include_hidden: false })
    }

    /// Only yield files the given grammar parses.
    pub fn with_grammar(
        mut self,
        grammar: Grammar,
    ) -> Self
    {
        self.extensions = grammar.extensions().to_vec();
        self
    }

    /// Include or exclude hidden files (dotfiles).
    pub fn with_include_hidden(
        mut self,
        include_hidden: bool,
    ) -> Self
    {
        self.include_hidden = include_hidden;
        self
    }

    fn build_walk(
        &self,
        root: &Path,
    ) -> WalkBuilder
    {
        let mut b = WalkBuilder::new(root);

        // hidden(true) skips dotfiles
        b.hidden(!self.include_hidden);

        b.git_ignore(true);
        b.git_global(true);
        b.git_exclude(true);
        // Honour .gitignore even outside a git checkout
        b.require_git(false);

        // Early directory pruning using extra ignores
        let extra = self.ignore_patterns.clone();
        let root_owned = root.to_path_buf();
        b.filter_entry(move |ent: &DirEntry| {
            let is_dir = ent.file_type().is_some_and(|ft| ft.is_dir());
            let rel = ent.path().strip_prefix(&root_owned).unwrap_or(ent.path());
            !(is_dir && extra.is_match(rel))
        });

        b
    }

    fn accepts(
        &self,
        path: &Path,
    ) -> bool
    {
        if self.extensions.is_empty()
        {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
    }

    /// Files under `root`, sorted.
    pub fn walk_files<P: AsRef<Path>>(
        &self,
        root: P,
    ) -> Vec<PathBuf>
    {
        let root_path = root.as_ref();

        let mut out: Vec<PathBuf> = self
            .build_walk(root_path)
            .build()
            .filter_map(|res| match res
            {
                Ok(entry) => Some(entry),
                Err(e) =>
                {
                    tracing::debug!(error = %e, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .map(|entry| entry.into_path())
            .filter(|abs| self.accepts(abs))
            .filter(|abs| {
                let rel = abs.strip_prefix(root_path).unwrap_or(abs);
                !self.ignore_patterns.is_match(rel)
            })
            .collect();

        out.sort();
        out
    }
}

#[cfg(test)]
mod tests
{
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn write_file(
        root: &Path,
        rel: &str,
        contents: &str,
    ) -> Result<()>
    {
        let path = root.join(rel);
        if let Some(parent) = path.parent()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    fn relative(
        root: &Path,
        files: Vec<PathBuf>,
    ) -> Vec<PathBuf>
    {
        files
            .into_iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect()
    }

    #[test]
    fn grammar_filter_keeps_matching_sources() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let root = tmp.path();

        write_file(root, "src/Main.java", "class Main {}")?;
        write_file(root, "src/util/Helper.java", "class Helper {}")?;
        write_file(root, "README.md", "# readme")?;
        write_file(root, "tool.py", "print('hi')")?;

        let walker = FileWalker::new(&[])?.with_grammar(Grammar::Java);
        let files = relative(root, walker.walk_files(root));

        assert_eq!(files, vec![PathBuf::from("src/Main.java"), PathBuf::from("src/util/Helper.java")]);
        Ok(())
    }

    #[test]
    fn respects_gitignore_without_git_dir() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let root = tmp.path();

        write_file(root, ".gitignore", "generated/\n")?;
        write_file(root, "generated/Stub.java", "class Stub {}")?;
        write_file(root, "Keep.java", "class Keep {}")?;

        let walker = FileWalker::new(&[])?.with_grammar(Grammar::Java);
        let files = relative(root, walker.walk_files(root));

        assert_eq!(files, vec![PathBuf::from("Keep.java")]);
        Ok(())
    }

    #[test]
    fn additional_globs_prune_and_filter() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let root = tmp.path();

        write_file(root, "target/debug/build.rs", "fn main() {}")?;
        write_file(root, "src/lib.rs", "pub fn x() {}")?;
        write_file(root, "src/gen.rs", "pub fn y() {}")?;

        let ignores = vec!["target".to_string(), "**/gen.rs".to_string()];
        let walker = FileWalker::new(&ignores)?.with_grammar(Grammar::Rust);
        let files = relative(root, walker.walk_files(root));

        assert_eq!(files, vec![PathBuf::from("src/lib.rs")]);
        Ok(())
    }

    #[test]
    fn hidden_files_opt_in() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let root = tmp.path();

        write_file(root, ".hidden/a.py", "x = 1")?;
        write_file(root, "b.py", "y = 2")?;

        let walker = FileWalker::new(&[])?.with_grammar(Grammar::Python);
        assert_eq!(relative(root, walker.walk_files(root)), vec![PathBuf::from("b.py")]);

        let walker = FileWalker::new(&[])?
            .with_grammar(Grammar::Python)
            .with_include_hidden(true);
        assert_eq!(walker.walk_files(root).len(), 2);
        Ok(())
    }

    #[test]
    fn invalid_glob_is_reported()
    {
        let err = FileWalker::new(&["[".to_string()]).err().unwrap();
        assert!(err.to_string().contains("invalid ignore glob"));
    }
}
