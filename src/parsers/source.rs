//! Parsed source text paired with its tree-sitter tree.

use tree_sitter::{Node, Parser, Tree};

use crate::core::range::Position;
use crate::core::syntax::resolve_path;
use crate::parsers::grammar::{Grammar, NodeCategory};

/// A parsed file or fragment. Owns both the text and the tree so node text
/// can always be sliced from the bytes the parser saw.
pub struct SourceTree {
    grammar: Grammar,
    text: String,
    tree: Tree,
}

/// Parse `content`; `None` when the parser produces no tree.
pub fn parse(content: &str, grammar: Grammar) -> Option<SourceTree> {
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&grammar.language()) {
        tracing::warn!(%grammar, error = %e, "grammar version mismatch");
        return None;
    }

    let tree = parser.parse(content, None)?;
    Some(SourceTree { grammar, text: content.to_owned(), tree })
}

impl SourceTree {
    pub fn grammar(&self) -> Grammar {
        self.grammar
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Number of lines in the parsed text.
    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }

    /// Text of `node`, empty if it does not fall on UTF-8 boundaries.
    pub fn node_text(&self, node: Node<'_>) -> &str {
        node.utf8_text(self.text.as_bytes()).unwrap_or("")
    }

    pub fn category(&self, node: Node<'_>) -> NodeCategory {
        self.grammar.categorize(node.kind())
    }

    /// Syntax path from the root to the innermost node at `cursor`.
    pub fn path_at(&self, cursor: Position) -> Vec<Node<'_>> {
        resolve_path(self.root(), cursor)
    }

    /// Pre-order walk over every node in the tree.
    pub fn descendants(&self) -> Vec<Node<'_>> {
        descendants(self.root())
    }

    /// Node naming the symbol a call or instantiation refers to.
    ///
    /// For calls this is the method/function name, with receivers and
    /// module paths stripped. For instantiations it is the first identifier
    /// or type name child.
    pub fn callee<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        match self.category(node) {
            NodeCategory::Call => {
                if let Some(name) = node.child_by_field_name("name") {
                    return Some(name);
                }
                let target = node
                    .child_by_field_name("function")
                    .or_else(|| node.child_by_field_name("macro"))?;
                ["attribute", "field", "property", "name"]
                    .into_iter()
                    .find_map(|f| target.child_by_field_name(f))
                    .or(Some(target))
            }
            NodeCategory::Instantiation => {
                let mut cursor = node.walk();
                node.named_children(&mut cursor).find(|c| {
                    matches!(self.category(*c), NodeCategory::Identifier | NodeCategory::TypeReference)
                })
            }
            _ => None,
        }
    }

    /// Named type references, plus capitalised identifiers under error
    /// nodes (partial code often parses that way).
    pub fn is_type_like(&self, node: Node<'_>) -> bool {
        match self.category(node) {
            NodeCategory::TypeReference => node.named_child_count() == 0,
            NodeCategory::Identifier => node.parent().is_some_and(|p| match self.category(p) {
                NodeCategory::TypeReference => true,
                NodeCategory::Error => self
                    .node_text(node)
                    .chars()
                    .next()
                    .is_some_and(char::is_uppercase),
                _ => false,
            }),
            _ => false,
        }
    }

    /// Innermost named node covering `pos`.
    pub fn named_node_at(&self, pos: Position) -> Option<Node<'_>> {
        self.root()
            .named_descendant_for_point_range(pos.into(), pos.into())
    }
}

/// Pre-order walk starting at `node`, `node` included.
pub fn descendants(node: Node<'_>) -> Vec<Node<'_>> {
    let mut out = Vec::new();
    let mut stack = vec![node];

    while let Some(n) = stack.pop() {
        out.push(n);
        // Reverse so the leftmost child is visited first
        let mut cursor = n.walk();
        let children: Vec<_> = n.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }

    out
}
