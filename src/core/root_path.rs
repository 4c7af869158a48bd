//! Root-path context: identifiers named by the declarations that enclose
//! the cursor (superclasses, parameter types, return types, ...).

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, instrument};

use crate::core::crawler::definition_from;
use crate::core::navigator::{Navigator, NavigatorError};
use crate::core::range::Position;
use crate::core::snippet::{Definition, SnippetOrigin};
use crate::parsers::grammar::NodeCategory;
use crate::parsers::queries::QueryCatalogue;
use crate::parsers::source::SourceTree;

/// Resolve the interesting identifiers of every declaration on `path`.
///
/// Each captured identifier is resolved at its end position. Declarations
/// without a query, and identifiers that do not resolve, contribute nothing.
#[instrument(level = "debug", skip_all, fields(file = %file.display()))]
pub fn collect_root_path(
    tree: &SourceTree,
    path: &[tree_sitter::Node<'_>],
    file: &Path,
    catalogue: &QueryCatalogue,
    navigator: &dyn Navigator,
) -> Result<Vec<Definition>, NavigatorError>
{
    let text = tree.text().as_bytes();
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for node in path
    {
        // Program and everything that is not a declaration is skipped
        let NodeCategory::Declaration(kind) = tree.category(*node)
        else
        {
            continue;
        };

        for capture in catalogue.root_path_captures(kind, *node, text)
        {
            let label = tree.node_text(capture);
            if !seen.insert(label.to_owned())
            {
                continue;
            }

            let at: Position = capture.end_position().into();
            match navigator
                .goto_definition(file, at)?
                .and_then(|loc| definition_from(loc, SnippetOrigin::RootPath))
            {
                Some(def) => out.push(def),
                None => debug!(%label, ?kind, "root-path identifier not resolved"),
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests
{
    use std::cell::RefCell;
    use std::path::PathBuf;

    use super::*;
    use crate::core::navigator::Location;
    use crate::core::range::Range;
    use crate::parsers::grammar::Grammar;
    use crate::parsers::source::parse;

    /// Answers every lookup with a snippet naming the queried position.
    #[derive(Default)]
    struct EchoNavigator
    {
        asked: RefCell<Vec<Position>>,
    }

    impl Navigator for EchoNavigator
    {
        fn goto_definition(
            &self,
            _path: &Path,
            position: Position,
        ) -> Result<Option<Location>, NavigatorError>
        {
            self.asked.borrow_mut().push(position);
            Ok(Some(Location {
                path: PathBuf::from(format!("Def{}.java", position.column)),
                range: Range::rows(0, 1).unwrap(),
                content: Some(format!("class Def{} {{}}", position.column)),
            }))
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

    #[test]
    fn resolves_captures_of_enclosing_declarations()
    {
        let src = "class Repo extends Base {\n  Item find(Key k) {\n    return null;\n  }\n}\n";
        let tree = parse(src, Grammar::Java).unwrap();
        let path = tree.path_at(Position::new(2, 6));

        let nav = EchoNavigator::default();
        let cat = QueryCatalogue::new(Grammar::Java);
        let found = collect_root_path(&tree, &path, Path::new("Repo.java"), &cat, &nav).unwrap();

        // Base (class), then Item and Key (method); resolved at capture ends
        assert_eq!(*nav.asked.borrow(), [Position::new(0, 23), Position::new(1, 6), Position::new(1, 15)]);
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|d| d.origin == SnippetOrigin::RootPath));
    }

    #[test]
    fn cursor_outside_declarations_yields_nothing()
    {
        let src = "import a.B;\n\nclass A {}\n";
        let tree = parse(src, Grammar::Java).unwrap();
        let path = tree.path_at(Position::new(1, 0));

        let nav = EchoNavigator::default();
        let cat = QueryCatalogue::new(Grammar::Java);
        let found = collect_root_path(&tree, &path, Path::new("A.java"), &cat, &nav).unwrap();
        assert!(found.is_empty());
        assert!(nav.asked.borrow().is_empty());
    }
}
