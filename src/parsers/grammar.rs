//! Supported source grammars and the node-category lookup tables.
//!
//! The engine never branches on raw tree-sitter tag strings: every tag is
//! mapped once, here, onto a [`NodeCategory`], and the rest of the crate
//! dispatches on that enum.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tree_sitter::Language;

/// Source languages the engine can parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Grammar {
    Java,
    Python,
    Rust,
    #[value(name = "typescript", alias = "ts")]
    TypeScript,
}

/// Declaration flavours that carry a root-path query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclKind {
    Class,
    Interface,
    Function,
    Method,
    Constructor,
    Impl,
    Struct,
}

impl DeclKind {
    pub const ALL: [DeclKind; 7] = [
        DeclKind::Class,
        DeclKind::Interface,
        DeclKind::Function,
        DeclKind::Method,
        DeclKind::Constructor,
        DeclKind::Impl,
        DeclKind::Struct,
    ];

    /// Declarations whose bodies get cut down to a header when long.
    pub fn is_callable(self) -> bool {
        matches!(self, DeclKind::Function | DeclKind::Method | DeclKind::Constructor)
    }
}

/// Grammar-independent classification of a syntax node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    Program,
    Declaration(DeclKind),
    Call,
    Instantiation,
    TypeReference,
    Identifier,
    Block,
    Error,
    Other,
}

impl Grammar {
    pub const ALL: [Grammar; 4] = [Grammar::Java, Grammar::Python, Grammar::Rust, Grammar::TypeScript];

    /// Tree-sitter language handle.
    pub fn language(self) -> Language {
        match self {
            Grammar::Java => tree_sitter_java::LANGUAGE.into(),
            Grammar::Python => tree_sitter_python::LANGUAGE.into(),
            Grammar::Rust => tree_sitter_rust::LANGUAGE.into(),
            Grammar::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        }
    }

    /// Detect from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|g| g.extensions().contains(&ext.as_str()))
    }

    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Grammar::Java => &["java"],
            Grammar::Python => &["py", "pyi"],
            Grammar::Rust => &["rs"],
            Grammar::TypeScript => &["ts", "tsx", "mts", "cts"],
        }
    }

    /// Map a tree-sitter node tag to its category.
    pub fn categorize(self, kind: &str) -> NodeCategory {
        use DeclKind::*;
        use NodeCategory::*;

        // Shared across all four grammars
        match kind {
            "ERROR" => return Error,
            "identifier" | "field_identifier" | "property_identifier" => return Identifier,
            _ => {}
        }

        match (self, kind) {
            (Grammar::Java, "program") => Program,
            (Grammar::Java, "class_declaration" | "enum_declaration" | "record_declaration") => {
                Declaration(Class)
            }
            (Grammar::Java, "interface_declaration") => Declaration(Interface),
            (Grammar::Java, "method_declaration") => Declaration(Method),
            (Grammar::Java, "constructor_declaration") => Declaration(Constructor),
            (Grammar::Java, "method_invocation") => Call,
            (Grammar::Java, "object_creation_expression") => Instantiation,
            (Grammar::Java, "type_identifier") => TypeReference,
            (Grammar::Java, "block" | "constructor_body") => Block,

            (Grammar::Python, "module") => Program,
            (Grammar::Python, "class_definition") => Declaration(Class),
            (Grammar::Python, "function_definition") => Declaration(Function),
            (Grammar::Python, "call") => Call,
            (Grammar::Python, "type") => TypeReference,
            (Grammar::Python, "block") => Block,

            (Grammar::Rust, "source_file") => Program,
            (Grammar::Rust, "function_item") => Declaration(Function),
            (Grammar::Rust, "impl_item") => Declaration(Impl),
            (Grammar::Rust, "struct_item" | "enum_item" | "type_item") => Declaration(Struct),
            (Grammar::Rust, "trait_item") => Declaration(Interface),
            (Grammar::Rust, "call_expression" | "macro_invocation") => Call,
            (Grammar::Rust, "struct_expression") => Instantiation,
            (Grammar::Rust, "type_identifier") => TypeReference,
            (Grammar::Rust, "block") => Block,

            (Grammar::TypeScript, "program") => Program,
            (Grammar::TypeScript, "class_declaration" | "abstract_class_declaration") => {
                Declaration(Class)
            }
            (Grammar::TypeScript, "interface_declaration") => Declaration(Interface),
            (Grammar::TypeScript, "function_declaration") => Declaration(Function),
            (Grammar::TypeScript, "method_definition") => Declaration(Method),
            (Grammar::TypeScript, "call_expression") => Call,
            (Grammar::TypeScript, "new_expression") => Instantiation,
            (Grammar::TypeScript, "type_identifier") => TypeReference,
            (Grammar::TypeScript, "statement_block") => Block,

            _ => Other,
        }
    }

    /// Keywords that never name an imported symbol.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Grammar::Java => &[
                "class", "interface", "enum", "import", "package", "public", "private",
                "protected", "static", "final", "void", "new", "return", "extends",
                "implements", "function",
            ],
            Grammar::Python => &[
                "def", "class", "import", "from", "as", "return", "self", "None", "True",
                "False", "if", "else", "for", "in", "while",
            ],
            Grammar::Rust => &[
                "fn", "struct", "enum", "impl", "trait", "use", "mod", "pub", "let", "mut",
                "self", "Self", "crate", "super", "return", "match",
            ],
            Grammar::TypeScript => &[
                "function", "class", "interface", "import", "export", "from", "const", "let",
                "var", "new", "return", "this", "type",
            ],
        }
    }

    /// Line-comment marker used when rendering snippets into a prompt.
    pub fn comment_symbol(self) -> &'static str {
        match self {
            Grammar::Python => "#",
            Grammar::Java | Grammar::Rust | Grammar::TypeScript => "//",
        }
    }

    /// Builtin type names filtered out of root-path captures.
    pub fn builtin_types(self) -> &'static [&'static str] {
        match self {
            Grammar::Java => &["String", "Object", "Integer", "Long", "Boolean", "Double"],
            Grammar::Python => &["str", "int", "float", "bool", "list", "dict", "tuple"],
            Grammar::Rust => &["String", "Vec", "Option", "Result", "Box", "Self"],
            Grammar::TypeScript => &["Array", "Promise", "Record", "Partial", "Map", "Set"],
        }
    }
}

impl std::fmt::Display for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Grammar::Java => "java",
            Grammar::Python => "python",
            Grammar::Rust => "rust",
            Grammar::TypeScript => "typescript",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_grammar_from_extension() {
        assert_eq!(Grammar::from_path(Path::new("a/B.java")), Some(Grammar::Java));
        assert_eq!(Grammar::from_path(Path::new("x.PY")), Some(Grammar::Python));
        assert_eq!(Grammar::from_path(Path::new("lib.rs")), Some(Grammar::Rust));
        assert_eq!(Grammar::from_path(Path::new("app.tsx")), Some(Grammar::TypeScript));
        assert_eq!(Grammar::from_path(Path::new("README")), None);
    }

    #[test]
    fn categories_cover_each_grammar() {
        assert_eq!(Grammar::Java.categorize("method_invocation"), NodeCategory::Call);
        assert_eq!(
            Grammar::Java.categorize("constructor_declaration"),
            NodeCategory::Declaration(DeclKind::Constructor)
        );
        assert_eq!(Grammar::Python.categorize("module"), NodeCategory::Program);
        assert_eq!(Grammar::Rust.categorize("struct_expression"), NodeCategory::Instantiation);
        assert_eq!(Grammar::TypeScript.categorize("statement_block"), NodeCategory::Block);
        assert_eq!(Grammar::Python.categorize("ERROR"), NodeCategory::Error);
        assert_eq!(Grammar::Rust.categorize("line_comment"), NodeCategory::Other);
    }

    #[test]
    fn every_language_loads() {
        for g in Grammar::ALL {
            let mut parser = tree_sitter::Parser::new();
            assert!(parser.set_language(&g.language()).is_ok(), "{g}");
        }
    }
}
