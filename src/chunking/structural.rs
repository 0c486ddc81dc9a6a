//! Structural tier: grammar-backed chunk extraction.
//!
//! Parses the file with tree-sitter and walks the syntax tree by node kind,
//! collecting the definition nodes each grammar exposes. Container nodes
//! (modules, classes, impls, traits) contribute scope to everything nested
//! inside them. Parse faults return `None` so the engine can fall through.

use std::path::Path;

use tree_sitter::{Node, Parser};

use crate::chunk::{Chunk, ChunkId, ChunkKind};
use crate::language::Grammar;

use super::line_spans;

/// What a syntax node contributes to chunking.
enum Role {
    /// Emit a chunk and keep walking the node's children.
    Leaf(ChunkKind),
    /// Emit a chunk (optionally) and push a named scope for children.
    Container { kind: ChunkKind, emit: bool },
    None,
}

fn role(grammar: Grammar, node_kind: &str) -> Role {
    match grammar {
        Grammar::Rust => match node_kind {
            "mod_item" => Role::Container { kind: ChunkKind::Module, emit: true },
            "impl_item" => Role::Container { kind: ChunkKind::Class, emit: false },
            "trait_item" => Role::Container { kind: ChunkKind::Interface, emit: true },
            "struct_item" | "enum_item" | "union_item" => Role::Leaf(ChunkKind::Struct),
            "function_item" => Role::Leaf(ChunkKind::Function),
            _ => Role::None,
        },
        Grammar::Python => match node_kind {
            "class_definition" => Role::Container { kind: ChunkKind::Class, emit: true },
            "function_definition" => Role::Leaf(ChunkKind::Function),
            _ => Role::None,
        },
        Grammar::JavaScript | Grammar::TypeScript | Grammar::Tsx => match node_kind {
            "class_declaration" | "abstract_class_declaration" => {
                Role::Container { kind: ChunkKind::Class, emit: true }
            }
            "interface_declaration" => Role::Leaf(ChunkKind::Interface),
            "enum_declaration" => Role::Leaf(ChunkKind::Struct),
            "function_declaration" | "generator_function_declaration" => {
                Role::Leaf(ChunkKind::Function)
            }
            "method_definition" => Role::Leaf(ChunkKind::Method),
            _ => Role::None,
        },
        Grammar::Go => match node_kind {
            "function_declaration" => Role::Leaf(ChunkKind::Function),
            "method_declaration" => Role::Leaf(ChunkKind::Method),
            "type_declaration" => Role::Leaf(ChunkKind::Struct),
            _ => Role::None,
        },
    }
}

/// Parse and extract definition chunks. `None` means the grammar could not
/// be loaded or the parse produced no tree; an empty vec means the parse
/// succeeded but nothing matched. Both fall through to the next tier.
pub(crate) fn chunk_structural(
    text: &str,
    tag: &str,
    rel_path: &Path,
    grammar: Grammar,
    min_bytes: usize,
) -> Option<Vec<Chunk>> {
    let mut parser = Parser::new();
    parser.set_language(&grammar.language()).ok()?;
    let tree = parser.parse(text, None)?;

    let spans = line_spans(text);
    let mut walker = Walker {
        text,
        spans: &spans,
        tag,
        rel_path,
        grammar,
        min_bytes,
        out: Vec::new(),
    };
    let mut scope = Vec::new();
    walker.visit(tree.root_node(), &mut scope);
    Some(walker.out)
}

struct Walker<'a> {
    text: &'a str,
    spans: &'a [(usize, usize)],
    tag: &'a str,
    rel_path: &'a Path,
    grammar: Grammar,
    min_bytes: usize,
    out: Vec<Chunk>,
}

impl Walker<'_> {
    fn visit(&mut self, node: Node<'_>, scope: &mut Vec<(ChunkKind, String)>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match role(self.grammar, child.kind()) {
                Role::Leaf(kind) => {
                    let kind = self.resolve_kind(kind, scope);
                    if let Some(name) = self.node_name(child) {
                        self.emit(child, kind, &name, scope);
                    }
                    self.visit(child, scope);
                }
                Role::Container { kind, emit } => {
                    let name = self.node_name(child);
                    if emit {
                        if let Some(name) = &name {
                            self.emit(child, kind, name, scope);
                        }
                    }
                    match name {
                        Some(name) => {
                            scope.push((kind, name));
                            self.visit(child, scope);
                            scope.pop();
                        }
                        None => self.visit(child, scope),
                    }
                }
                Role::None => self.visit(child, scope),
            }
        }
    }

    /// Functions nested in a class-like scope are methods.
    fn resolve_kind(&self, kind: ChunkKind, scope: &[(ChunkKind, String)]) -> ChunkKind {
        if kind == ChunkKind::Function
            && matches!(
                scope.last(),
                Some((ChunkKind::Class | ChunkKind::Interface, _))
            )
        {
            ChunkKind::Method
        } else {
            kind
        }
    }

    fn node_name(&self, node: Node<'_>) -> Option<String> {
        let name_node = match (self.grammar, node.kind()) {
            // An impl block is named after the type it implements.
            (Grammar::Rust, "impl_item") => node.child_by_field_name("type"),
            // Go wraps the named type_spec in a type_declaration.
            (Grammar::Go, "type_declaration") => {
                let mut cursor = node.walk();
                let spec = node
                    .named_children(&mut cursor)
                    .find(|c| c.kind() == "type_spec");
                spec.and_then(|s| s.child_by_field_name("name"))
            }
            _ => node.child_by_field_name("name"),
        }?;
        let name = name_node.utf8_text(self.text.as_bytes()).ok()?.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    fn emit(&mut self, node: Node<'_>, kind: ChunkKind, name: &str, scope: &[(ChunkKind, String)]) {
        let line_start = node.start_position().row as u32 + 1;
        let mut line_end = node.end_position().row as u32 + 1;
        if node.end_position().column == 0 && line_end > line_start {
            line_end -= 1;
        }

        // Whole-line slice so content matches the line range exactly.
        let start_byte = self.spans[(line_start - 1) as usize].0;
        let end_byte = self.spans[(line_end - 1) as usize].1;
        let content = &self.text[start_byte..end_byte];
        if content.trim().len() < self.min_bytes {
            return;
        }

        let signature = kind
            .is_callable()
            .then(|| content.lines().next().unwrap_or_default().trim().to_string());
        let (parent_kind, parent_name) = match scope.last() {
            Some((k, n)) => (Some(*k), Some(n.clone())),
            None => (None, None),
        };

        self.out.push(Chunk {
            id: ChunkId::derive(self.rel_path, kind, name, line_start),
            kind,
            name: name.to_string(),
            content: content.to_string(),
            file_path: self.rel_path.to_path_buf(),
            language_tag: self.tag.to_string(),
            line_start,
            line_end,
            signature,
            namespace_path: scope.iter().map(|(_, n)| n.clone()).collect(),
            parent_kind,
            parent_name,
            synthetic: false,
        });
    }
}
