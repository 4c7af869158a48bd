//! Syntax path resolution over any tree exposing spans and children.

use crate::core::range::{Position, Range};

/// The view of a parse-tree node the engine relies on.
///
/// Implemented for `tree_sitter::Node`; tests use small in-memory trees.
pub trait SyntaxNode: Sized
{
    /// Grammar-specific type tag
    fn tag(&self) -> &str;

    /// Start/end span of the node
    fn span(&self) -> Range;

    /// Children in declaration order, anonymous tokens included
    fn child_nodes(&self) -> Vec<Self>;
}

impl<'tree> SyntaxNode for tree_sitter::Node<'tree>
{
    fn tag(&self) -> &str
    {
        self.kind()
    }

    fn span(&self) -> Range
    {
        Range::spanning(self.start_position().into(), self.end_position().into())
    }

    fn child_nodes(&self) -> Vec<Self>
    {
        let mut cursor = self.walk();
        self.children(&mut cursor).collect()
    }
}

/// Chain of nodes from `root` to the innermost node enclosing `cursor`.
///
/// At each level the first child whose span contains the cursor (inclusive
/// on both ends) is taken. Always starts with `root`.
pub fn resolve_path<N: SyntaxNode + Clone>(
    root: N,
    cursor: Position,
) -> Vec<N>
{
    let mut path = vec![root.clone()];
    let mut current = root;

    loop
    {
        let next = current
            .child_nodes()
            .into_iter()
            .find(|c| c.span().contains(cursor));

        match next
        {
            Some(child) =>
            {
                path.push(child.clone());
                current = child;
            }
            None => break,
        }
    }

    path
}
