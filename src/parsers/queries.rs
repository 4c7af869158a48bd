//! Pattern-query catalogue: per grammar, which identifiers inside a
//! declaration are worth resolving, and which identifiers an import names.
//!
//! Every pattern is compiled on its own. A pattern the grammar rejects is
//! logged and left out, so one bad pattern never disables its siblings.

use std::collections::HashMap;

use tree_sitter::{Node, Query, QueryCursor, StreamingIterator};

use crate::parsers::grammar::{DeclKind, Grammar};

/// Capture naming the declaration a pattern is anchored on.
const DECL: &str = "decl";

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("{grammar} query failed to compile: {pattern}")]
    Compile {
        grammar: Grammar,
        pattern: String,
        #[source]
        source: tree_sitter::QueryError,
    },
}

/// Compiled root-path and import queries for one grammar.
pub struct QueryCatalogue {
    grammar: Grammar,
    root_path: HashMap<DeclKind, Vec<Query>>,
    imports: Vec<Query>,
}

impl QueryCatalogue {
    /// Compile all patterns for `grammar`, skipping the ones that fail.
    pub fn new(grammar: Grammar) -> Self {
        let mut root_path = HashMap::new();
        for kind in DeclKind::ALL {
            let compiled: Vec<Query> = root_path_patterns(grammar, kind)
                .into_iter()
                .filter_map(|p| compile_logged(grammar, &p))
                .collect();
            if !compiled.is_empty() {
                root_path.insert(kind, compiled);
            }
        }

        let imports = import_patterns(grammar)
            .iter()
            .filter_map(|p| compile_logged(grammar, p))
            .collect();

        Self { grammar, root_path, imports }
    }

    pub fn grammar(&self) -> Grammar {
        self.grammar
    }

    /// True when at least one root-path pattern exists for `kind`.
    pub fn covers(&self, kind: DeclKind) -> bool {
        self.root_path.contains_key(&kind)
    }

    /// Interesting identifiers inside the declaration `decl`.
    ///
    /// Only matches anchored on `decl` itself count; nested declarations
    /// are reached through their own entry on the syntax path.
    pub fn root_path_captures<'t>(&self, kind: DeclKind, decl: Node<'t>, text: &[u8]) -> Vec<Node<'t>> {
        let Some(queries) = self.root_path.get(&kind) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for query in queries {
            let names = query.capture_names();
            let mut cursor = QueryCursor::new();
            let mut matches = cursor.matches(query, decl, text);

            while let Some(m) = matches.next() {
                let anchored = m
                    .captures
                    .iter()
                    .any(|c| names[c.index as usize] == DECL && c.node.id() == decl.id());
                if !anchored {
                    continue;
                }
                out.extend(
                    m.captures
                        .iter()
                        .filter(|c| names[c.index as usize] != DECL)
                        .map(|c| c.node),
                );
            }
        }

        dedup_nodes(out)
    }

    /// Identifiers brought into scope by import statements under `root`.
    pub fn import_captures<'t>(&self, root: Node<'t>, text: &[u8]) -> Vec<Node<'t>> {
        let mut out = Vec::new();
        for query in &self.imports {
            let mut cursor = QueryCursor::new();
            let mut captures = cursor.captures(query, root, text);
            while let Some((m, idx)) = captures.next() {
                out.push(m.captures[*idx].node);
            }
        }
        dedup_nodes(out)
    }
}

fn compile_logged(grammar: Grammar, pattern: &str) -> Option<Query> {
    match Query::new(&grammar.language(), pattern) {
        Ok(q) => Some(q),
        Err(source) => {
            let err = QueryError::Compile { grammar, pattern: pattern.trim().to_owned(), source };
            tracing::warn!(error = %err, cause = %err.source_message(), "skipping query pattern");
            None
        }
    }
}

impl QueryError {
    fn source_message(&self) -> String {
        match self {
            QueryError::Compile { source, .. } => source.message.clone(),
        }
    }
}

/// Keep document order, drop repeated nodes.
fn dedup_nodes(mut nodes: Vec<Node<'_>>) -> Vec<Node<'_>> {
    nodes.sort_by_key(|n| (n.start_byte(), n.end_byte()));
    nodes.dedup_by_key(|n| n.id());
    nodes
}

/// `#not-match?` guard excluding the grammar's builtin type names.
fn not_builtin(grammar: Grammar, capture: &str) -> String {
    format!(r#"(#not-match? @{capture} "^({})$")"#, grammar.builtin_types().join("|"))
}

/// Wrap `body` as a declaration-anchored pattern with a builtin filter.
fn anchored(grammar: Grammar, body: &str, capture: &str) -> String {
    format!("(({body}) @{DECL} {})", not_builtin(grammar, capture))
}

fn root_path_patterns(grammar: Grammar, kind: DeclKind) -> Vec<String> {
    let bodies: &[(&str, &str)] = match (grammar, kind) {
        (Grammar::Java, DeclKind::Class) => &[
            ("class_declaration superclass: (superclass (type_identifier) @super)", "super"),
            (
                "class_declaration interfaces: (super_interfaces (type_list (type_identifier) @iface))",
                "iface",
            ),
        ],
        (Grammar::Java, DeclKind::Interface) => &[(
            "interface_declaration (extends_interfaces (type_list (type_identifier) @super))",
            "super",
        )],
        (Grammar::Java, DeclKind::Method) => &[
            ("method_declaration type: (type_identifier) @ret", "ret"),
            (
                "method_declaration parameters: (formal_parameters (formal_parameter type: (type_identifier) @param))",
                "param",
            ),
            (
                "method_declaration parameters: (formal_parameters (formal_parameter type: (generic_type (type_arguments (type_identifier) @param))))",
                "param",
            ),
        ],
        (Grammar::Java, DeclKind::Constructor) => &[(
            "constructor_declaration parameters: (formal_parameters (formal_parameter type: (type_identifier) @param))",
            "param",
        )],

        (Grammar::Python, DeclKind::Class) => &[(
            "class_definition superclasses: (argument_list (identifier) @super)",
            "super",
        )],
        (Grammar::Python, DeclKind::Function) => &[
            (
                "function_definition parameters: (parameters (typed_parameter type: (type (identifier) @param)))",
                "param",
            ),
            (
                "function_definition parameters: (parameters (typed_default_parameter type: (type (identifier) @param)))",
                "param",
            ),
            ("function_definition return_type: (type (identifier) @ret)", "ret"),
        ],

        (Grammar::Rust, DeclKind::Function) => &[
            ("function_item parameters: (parameters (parameter type: (type_identifier) @param))", "param"),
            (
                "function_item parameters: (parameters (parameter type: (reference_type type: (type_identifier) @param)))",
                "param",
            ),
            (
                "function_item parameters: (parameters (parameter type: (generic_type type_arguments: (type_arguments (type_identifier) @param))))",
                "param",
            ),
            ("function_item return_type: (type_identifier) @ret", "ret"),
            (
                "function_item return_type: (generic_type type_arguments: (type_arguments (type_identifier) @ret))",
                "ret",
            ),
        ],
        (Grammar::Rust, DeclKind::Impl) => &[
            ("impl_item trait: (type_identifier) @trait", "trait"),
            ("impl_item type: (type_identifier) @self_ty", "self_ty"),
        ],
        (Grammar::Rust, DeclKind::Struct) => &[(
            "struct_item body: (field_declaration_list (field_declaration type: (type_identifier) @field))",
            "field",
        )],
        (Grammar::Rust, DeclKind::Interface) => {
            &[("trait_item bounds: (trait_bounds (type_identifier) @super)", "super")]
        }

        (Grammar::TypeScript, DeclKind::Class) => &[
            ("class_declaration (class_heritage (extends_clause value: (identifier) @super))", "super"),
            ("class_declaration (class_heritage (implements_clause (type_identifier) @iface))", "iface"),
            (
                "abstract_class_declaration (class_heritage (extends_clause value: (identifier) @super))",
                "super",
            ),
        ],
        (Grammar::TypeScript, DeclKind::Interface) => &[(
            "interface_declaration (extends_type_clause type: (type_identifier) @super)",
            "super",
        )],
        (Grammar::TypeScript, DeclKind::Function) => &[
            (
                "function_declaration parameters: (formal_parameters (required_parameter type: (type_annotation (type_identifier) @param)))",
                "param",
            ),
            ("function_declaration return_type: (type_annotation (type_identifier) @ret)", "ret"),
        ],
        (Grammar::TypeScript, DeclKind::Method) => &[
            (
                "method_definition parameters: (formal_parameters (required_parameter type: (type_annotation (type_identifier) @param)))",
                "param",
            ),
            ("method_definition return_type: (type_annotation (type_identifier) @ret)", "ret"),
        ],

        _ => &[],
    };

    bodies
        .iter()
        .map(|(body, capture)| anchored(grammar, body, capture))
        .collect()
}

fn import_patterns(grammar: Grammar) -> &'static [&'static str] {
    match grammar {
        Grammar::Java => &["(import_declaration (scoped_identifier name: (identifier) @import))"],
        Grammar::Python => &[
            "(import_from_statement name: (dotted_name (identifier) @import))",
            "(import_statement name: (dotted_name (identifier) @import))",
        ],
        Grammar::Rust => &[
            "(use_declaration argument: (scoped_identifier name: (identifier) @import))",
            "(use_declaration argument: (scoped_use_list list: (use_list (identifier) @import)))",
            "(use_list (scoped_identifier name: (identifier) @import))",
        ],
        Grammar::TypeScript => &[
            "(import_specifier name: (identifier) @import)",
            "(import_clause (identifier) @import)",
        ],
    }
}
