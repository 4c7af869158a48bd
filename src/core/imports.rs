//! Imported symbols that the code right around the cursor mentions.

use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, instrument};

use crate::core::crawler::definition_from;
use crate::core::navigator::{Navigator, NavigatorError};
use crate::core::ranking::symbols_of;
use crate::core::snippet::{Definition, SnippetOrigin};
use crate::core::window::CaretWindow;
use crate::parsers::queries::QueryCatalogue;
use crate::parsers::source::SourceTree;

/// Lines of prefix inspected for imported names
const PREFIX_LINES: usize = 5;
/// Lines of suffix inspected for imported names
const SUFFIX_LINES: usize = 3;

/// Text the import source matches against: the last few prefix lines and
/// the first few suffix lines.
pub fn nearby_text(caret: &CaretWindow) -> String
{
    let before: Vec<&str> = caret.full_prefix.split('\n').collect();
    let head = before[before.len().saturating_sub(PREFIX_LINES)..].join("\n");
    let tail: Vec<&str> = caret.full_suffix.split('\n').take(SUFFIX_LINES).collect();
    head + &tail.join("\n")
}

/// Definitions of imported names used near the cursor, in import order.
#[instrument(level = "debug", skip_all, fields(file = %file.display()))]
pub fn collect_imports(
    tree: &SourceTree,
    file: &Path,
    caret: &CaretWindow,
    catalogue: &QueryCatalogue,
    navigator: &dyn Navigator,
) -> Result<Vec<Definition>, NavigatorError>
{
    let nearby = nearby_text(caret);
    let keywords = tree.grammar().keywords();
    let used: Vec<&str> = symbols_of(&nearby)
        .into_iter()
        .filter(|s| !keywords.contains(s))
        .collect();

    let mut resolved: IndexMap<String, Definition> = IndexMap::new();
    for capture in catalogue.import_captures(tree.root(), tree.text().as_bytes())
    {
        let label = tree.node_text(capture);
        if resolved.contains_key(label) || !used.contains(&label)
        {
            continue;
        }
        match navigator
            .goto_definition(file, capture.start_position().into())?
            .and_then(|loc| definition_from(loc, SnippetOrigin::Import))
        {
            Some(def) =>
            {
                resolved.insert(label.to_owned(), def);
            }
            None => debug!(%label, "import not resolved"),
        }
    }

    Ok(resolved.into_values().collect())
}

#[cfg(test)]
mod tests
{
    use std::cell::RefCell;
    use std::path::PathBuf;

    use super::*;
    use crate::core::budgeter::WhitespaceCounter;
    use crate::core::navigator::Location;
    use crate::core::range::{Position, Range};
    use crate::infra::config::EngineConfig;
    use crate::parsers::grammar::Grammar;
    use crate::parsers::source::parse;

    #[derive(Default)]
    struct Recorder
    {
        asked: RefCell<Vec<Position>>,
    }

    impl Navigator for Recorder
    {
        fn goto_definition(
            &self,
            _path: &Path,
            position: Position,
        ) -> Result<Option<Location>, NavigatorError>
        {
            self.asked.borrow_mut().push(position);
            Ok(Some(Location {
                path: PathBuf::from(format!("L{}.py", position.row)),
                range: Range::rows(0, 1).unwrap(),
                content: Some("class X: pass".into()),
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
    fn only_imports_used_near_cursor_are_resolved()
    {
        let src = "from app.models import User\nfrom app.db import Session\n\n\n\n\n\n\ndef load():\n    return User.get(1)\n";
        let tree = parse(src, Grammar::Python).unwrap();
        let caret = CaretWindow::build(src, Position::new(9, 11), &EngineConfig::default(), &WhitespaceCounter);

        let nav = Recorder::default();
        let cat = QueryCatalogue::new(Grammar::Python);
        let found = collect_imports(&tree, Path::new("svc.py"), &caret, &cat, &nav).unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(*nav.asked.borrow(), [Position::new(0, 23)]);
        assert_eq!(found[0].origin, SnippetOrigin::Import);
    }

    #[test]
    fn nearby_text_spans_both_sides()
    {
        let text = "a\nb\nc\nd\ne\nf\ngh\ni\nj\nk\n";
        let caret = CaretWindow::build(text, Position::new(6, 1), &EngineConfig::default(), &WhitespaceCounter);
        assert_eq!(nearby_text(&caret), "c\nd\ne\nf\ngh\ni\nj");
    }
}
