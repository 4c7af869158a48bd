//! In-process navigator over one workspace checkout.
//!
//! Every file of a grammar is parsed once; declarations are resolved by
//! name (same file first, then path order) and references are found by
//! scanning identifiers with the same text.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::core::navigator::{Location, Navigator, NavigatorError};
use crate::core::range::{Position, Range};
use crate::infra::io::read_source;
use crate::infra::walk::FileWalker;
use crate::parsers::grammar::{DeclKind, Grammar, NodeCategory};
use crate::parsers::source::parse;

#[derive(Debug, Clone)]
struct Declaration
{
    name: String,
    kind: DeclKind,
    range: Range,
    name_range: Range,
    content: String,
}

#[derive(Debug, Clone)]
struct Identifier
{
    text: String,
    range: Range,
}

#[derive(Debug, Default)]
struct FileIndex
{
    declarations: Vec<Declaration>,
    identifiers: Vec<Identifier>,
}

impl FileIndex
{
    fn identifier_at(
        &self,
        pos: Position,
    ) -> Option<&Identifier>
    {
        self.identifiers
            .iter()
            .find(|i| i.range.contains(pos))
    }
}

/// Parse `text` and collect its declarations and identifiers.
fn index_text(
    text: &str,
    grammar: Grammar,
) -> Option<FileIndex>
{
    let tree = parse(text, grammar)?;
    let mut index = FileIndex::default();

    for node in tree.descendants()
    {
        match tree.category(node)
        {
            // Impl blocks name no symbol of their own
            NodeCategory::Declaration(DeclKind::Impl) => {}
            NodeCategory::Declaration(kind) =>
            {
                let Some(name) = node.child_by_field_name("name")
                else
                {
                    continue;
                };
                index.declarations.push(Declaration {
                    name: tree.node_text(name).to_owned(),
                    kind,
                    range: Range::spanning(node.start_position().into(), node.end_position().into()),
                    name_range: Range::spanning(name.start_position().into(), name.end_position().into()),
                    content: tree.node_text(node).to_owned(),
                });
            }
            NodeCategory::Identifier =>
            {
                index.identifiers.push(Identifier {
                    text: tree.node_text(node).to_owned(),
                    range: Range::spanning(node.start_position().into(), node.end_position().into()),
                });
            }
            NodeCategory::TypeReference if node.named_child_count() == 0 =>
            {
                index.identifiers.push(Identifier {
                    text: tree.node_text(node).to_owned(),
                    range: Range::spanning(node.start_position().into(), node.end_position().into()),
                });
            }
            _ => {}
        }
    }

    Some(index)
}

fn index_file(
    path: &Path,
    grammar: Grammar,
) -> Option<FileIndex>
{
    let text = match read_source(path)
    {
        Ok(t) => t,
        Err(e) =>
        {
            warn!(path = %path.display(), error = %e, "skipping unreadable file");
            return None;
        }
    };
    let index = index_text(&text, grammar);
    if index.is_none()
    {
        debug!(path = %path.display(), "file did not parse");
    }
    index
}

/// Name-based navigator over the files of one grammar under a root.
pub struct WorkspaceNavigator
{
    root: PathBuf,
    grammar: Grammar,
    files: IndexMap<PathBuf, FileIndex>,
}

impl WorkspaceNavigator
{
    /// Walk `root` (gitignore-aware, plus `ignores`) and index every file
    /// of `grammar` in parallel.
    #[instrument(level = "info", skip_all, fields(root = %root.display(), %grammar))]
    pub fn index(
        root: &Path,
        grammar: Grammar,
        ignores: &[String],
    ) -> Result<Self>
    {
        let root = dunce::canonicalize(root)
            .with_context(|| format!("Failed to resolve workspace root {}", root.display()))?;
        let files = FileWalker::new(ignores)?
            .with_grammar(grammar)
            .walk_files(&root);

        // Collecting keeps the walker's sorted order
        let indexed: Vec<(PathBuf, Option<FileIndex>)> = files
            .into_par_iter()
            .map(|path| {
                let index = index_file(&path, grammar);
                (path, index)
            })
            .collect();

        let files: IndexMap<PathBuf, FileIndex> = indexed
            .into_iter()
            .filter_map(|(path, index)| index.map(|i| (path, i)))
            .collect();

        info!(files = files.len(), %grammar, "workspace indexed");
        Ok(Self { root, grammar, files })
    }

    pub fn root(&self) -> &Path
    {
        &self.root
    }

    pub fn grammar(&self) -> Grammar
    {
        self.grammar
    }

    /// Number of indexed files
    pub fn len(&self) -> usize
    {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.files.is_empty()
    }

    /// Absolute, canonical form of `path`; relative paths are taken from
    /// the workspace root.
    pub fn resolve(
        &self,
        path: &Path,
    ) -> PathBuf
    {
        let joined = if path.is_absolute() { path.to_path_buf() } else { self.root.join(path) };
        dunce::canonicalize(&joined).unwrap_or(joined)
    }

    /// Re-read one file after it changed on disk. A file that no longer
    /// parses or exists is dropped from the index.
    pub fn refresh(
        &mut self,
        path: &Path,
    )
    {
        let path = self.resolve(path);
        match index_file(&path, self.grammar)
        {
            Some(index) =>
            {
                self.files.insert(path, index);
                self.files.sort_keys();
            }
            None =>
            {
                self.files.shift_remove(&path);
            }
        }
    }

    /// Declarations named `name`, the ones in `near` first.
    fn declarations_named<'a>(
        &'a self,
        name: &'a str,
        near: &'a Path,
    ) -> impl Iterator<Item = (&'a PathBuf, &'a Declaration)> + 'a
    {
        let local = self
            .files
            .get_key_value(near)
            .into_iter()
            .flat_map(|(p, f)| f.declarations.iter().map(move |d| (p, d)));
        let rest = self
            .files
            .iter()
            .filter(move |(p, _)| p.as_path() != near)
            .flat_map(|(p, f)| f.declarations.iter().map(move |d| (p, d)));

        local
            .chain(rest)
            .filter(move |(_, d)| d.name == name)
    }
}

impl Navigator for WorkspaceNavigator
{
    fn goto_definition(
        &self,
        path: &Path,
        position: Position,
    ) -> Result<Option<Location>, NavigatorError>
    {
        let path = self.resolve(path);
        let Some(ident) = self
            .files
            .get(&path)
            .and_then(|f| f.identifier_at(position))
        else
        {
            return Ok(None);
        };

        Ok(self
            .declarations_named(&ident.text, &path)
            .next()
            .map(|(p, d)| {
                debug!(name = %d.name, kind = ?d.kind, path = %p.display(), "definition found");
                Location { path: p.clone(), range: d.range, content: Some(d.content.clone()) }
            }))
    }

    fn find_references(
        &self,
        path: &Path,
        position: Position,
    ) -> Result<Option<Vec<Location>>, NavigatorError>
    {
        let path = self.resolve(path);
        let Some(file) = self.files.get(&path)
        else
        {
            return Ok(None);
        };

        // Either a declaration (its start or its name) or a plain identifier
        let name = file
            .declarations
            .iter()
            .find(|d| d.range.start() == position || d.name_range.contains(position))
            .map(|d| d.name.as_str())
            .or_else(|| file.identifier_at(position).map(|i| i.text.as_str()));
        let Some(name) = name
        else
        {
            return Ok(None);
        };

        let refs = self
            .files
            .iter()
            .flat_map(|(p, f)| {
                f.identifiers
                    .iter()
                    .filter(|i| i.text == name)
                    .map(move |i| Location { path: p.clone(), range: i.range, content: None })
            })
            .collect();
        Ok(Some(refs))
    }

    fn open_file(
        &self,
        path: &Path,
    ) -> Result<(), NavigatorError>
    {
        if !self.files.contains_key(&self.resolve(path))
        {
            debug!(path = %path.display(), "file not in workspace index");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    const SHAPE: &str = "class Shape {\n  int area() { return 0; }\n}\n";
    const MAIN: &str = "class Main {\n  void run() {\n    Shape s = new Shape();\n    s.area();\n  }\n}\n";

    fn workspace() -> Result<(TempDir, WorkspaceNavigator)>
    {
        let tmp = TempDir::new()?;
        fs::write(tmp.path().join("Shape.java"), SHAPE)?;
        fs::write(tmp.path().join("Main.java"), MAIN)?;
        fs::write(tmp.path().join("notes.txt"), "Shape")?;
        let nav = WorkspaceNavigator::index(tmp.path(), Grammar::Java, &[])?;
        Ok((tmp, nav))
    }

    #[test]
    fn indexes_only_grammar_files() -> Result<()>
    {
        let (_tmp, nav) = workspace()?;
        assert_eq!(nav.len(), 2);
        Ok(())
    }

    #[test]
    fn goto_resolves_across_files() -> Result<()>
    {
        let (_tmp, nav) = workspace()?;

        let loc = nav
            .goto_definition(Path::new("Main.java"), Position::new(2, 6))?
            .unwrap();
        assert!(loc.path.ends_with("Shape.java"));
        assert_eq!(loc.range, Range::new(Position::new(0, 0), Position::new(2, 1))?);
        assert_eq!(loc.content.as_deref(), Some(SHAPE.trim_end()));

        let method = nav
            .goto_definition(Path::new("Main.java"), Position::new(3, 6))?
            .unwrap();
        assert!(method.content.unwrap().starts_with("int area()"));

        // `s` is a local variable; no declaration of that name
        assert!(nav.goto_definition(Path::new("Main.java"), Position::new(3, 4))?.is_none());
        Ok(())
    }

    #[test]
    fn references_in_path_order() -> Result<()>
    {
        let (_tmp, nav) = workspace()?;

        let refs = nav
            .find_references(Path::new("Shape.java"), Position::new(0, 0))?
            .unwrap();
        let spots: Vec<(bool, Position)> = refs
            .iter()
            .map(|r| (r.path.ends_with("Main.java"), r.range.start()))
            .collect();
        assert_eq!(
            spots,
            [(true, Position::new(2, 4)), (true, Position::new(2, 18)), (false, Position::new(0, 6))]
        );
        Ok(())
    }

    #[test]
    fn refresh_picks_up_edits() -> Result<()>
    {
        let (tmp, mut nav) = workspace()?;
        fs::write(tmp.path().join("Shape.java"), "class Polygon {}\n")?;
        nav.refresh(Path::new("Shape.java"));

        assert!(nav.goto_definition(Path::new("Main.java"), Position::new(2, 6))?.is_none());
        Ok(())
    }
}
