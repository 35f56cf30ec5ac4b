//! Rust node/edge extraction, mapped onto the same canonical vocabulary as
//! the TypeScript parser: struct/enum -> Class, trait -> Interface, impl
//! methods -> Method, const/static -> Variable, type alias -> TypeAlias.
//!
//! Rust is the secondary language here; grounded on the teacher's
//! `walk_rust_symbols`/`walk_rust_calls`/`walk_rust_imports` scope-stack
//! traversal, collapsed into the single `parse()` pass the new
//! `LanguageParser` trait expects. REFERENCES/USES_TYPE extraction is left
//! to the TypeScript parser for now; Rust contributes nodes, CONTAINS-ready
//! members, IMPLEMENTS edges (`impl Trait for Type`), CALLS, and IMPORTS.

use super::{LanguageParser, ParsedFile, RawCall, RawInherit};
use crate::types::{
    ImportedName, Location, Node as GraphNode, NodeFields, Param, RawImport, Visibility, make_id,
    make_member_id, path_extension,
};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use tree_sitter::{Language, Node, Tree};

pub struct RustParser {}

impl RustParser {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for RustParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageParser for RustParser {
    fn language(&self) -> Language {
        tree_sitter_rust::LANGUAGE.into()
    }

    fn extensions(&self) -> &[&str] {
        &["rs"]
    }

    fn parse(
        &self,
        source: &str,
        file_path: &str,
        package: &str,
        module: &str,
    ) -> anyhow::Result<ParsedFile> {
        let tree: Tree = super::parse_tree(self.language(), source)?;
        let bytes = source.as_bytes();
        let mut ctx = Ctx {
            bytes,
            file_path,
            package,
            module,
        };
        let mut out = ParsedFile::default();

        out.nodes.push(GraphNode {
            id: make_id(file_path, crate::types::NodeKind::File, ""),
            name: file_path.rsplit('/').next().unwrap_or(file_path).to_string(),
            file_path: file_path.to_string(),
            package: package.to_string(),
            module: module.to_string(),
            start_line: 0,
            end_line: line_of(bytes, bytes.len()),
            exported: false,
            fields: NodeFields::File {
                extension: path_extension(&PathBuf::from(file_path)),
            },
            content_hash: hash_bytes(bytes),
            snippet: String::new(),
        });

        let root = tree.root_node();
        walk(root, &mut ctx, &mut out, None, None);

        Ok(out)
    }
}

struct Ctx<'a> {
    bytes: &'a [u8],
    file_path: &'a str,
    package: &'a str,
    module: &'a str,
}

fn line_of(bytes: &[u8], byte_offset: usize) -> u32 {
    bytecount::count(&bytes[..byte_offset.min(bytes.len())], b'\n') as u32
}

fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

fn text_of<'a>(bytes: &'a [u8], node: Node) -> Option<&'a str> {
    std::str::from_utf8(&bytes[node.start_byte()..node.end_byte()]).ok()
}

fn last_ident_of(bytes: &[u8], node: Node) -> Option<String> {
    let text = text_of(bytes, node)?;
    let mut best = None;
    for part in text.split(|c: char| !c.is_ascii_alphanumeric() && c != '_') {
        if !part.is_empty() {
            best = Some(part);
        }
    }
    best.map(|s| s.to_string())
}

fn extract_visibility(bytes: &[u8], node: Node) -> Visibility {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "visibility_modifier" {
            return Visibility::Public;
        }
    }
    Visibility::Private
}

fn impl_type_ident(bytes: &[u8], impl_node: Node) -> Option<String> {
    let ty = impl_node.child_by_field_name("type")?;
    last_ident_of(bytes, ty)
}

fn impl_trait_ident(bytes: &[u8], impl_node: Node) -> Option<String> {
    let trait_node = impl_node.child_by_field_name("trait")?;
    last_ident_of(bytes, trait_node)
}

fn params_of(bytes: &[u8], params_node: Option<Node>) -> Vec<Param> {
    let Some(params_node) = params_node else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut cursor = params_node.walk();
    for child in params_node.children(&mut cursor) {
        match child.kind() {
            "parameter" => {
                let name = child
                    .child_by_field_name("pattern")
                    .and_then(|n| text_of(bytes, n))
                    .unwrap_or("")
                    .to_string();
                let type_text = child
                    .child_by_field_name("type")
                    .and_then(|n| last_ident_of(bytes, n));
                if !name.is_empty() {
                    out.push(Param { name, type_text });
                }
            }
            "self_parameter" => {
                out.push(Param {
                    name: "self".to_string(),
                    type_text: None,
                });
            }
            _ => {}
        }
    }
    out
}

fn return_type_of(bytes: &[u8], fn_node: Node) -> Option<String> {
    fn_node
        .child_by_field_name("return_type")
        .and_then(|n| last_ident_of(bytes, n))
}

fn is_async(bytes: &[u8], fn_node: Node) -> bool {
    let mut cursor = fn_node.walk();
    fn_node
        .children(&mut cursor)
        .any(|c| c.kind() == "async" || text_of(bytes, c) == Some("async"))
}

/// Owner context threaded through the recursive walk: the enclosing
/// `impl`/`trait` type name (for Method/Property member ids) and the
/// nearest enclosing callable's symbol path (for CALLS attribution).
fn walk(
    node: Node,
    ctx: &mut Ctx,
    out: &mut ParsedFile,
    owner: Option<&str>,
    caller: Option<&str>,
) {
    let bytes = ctx.bytes;
    match node.kind() {
        "function_item" => {
            let Some(name) = node
                .child_by_field_name("name")
                .and_then(|n| last_ident_of(bytes, n))
            else {
                return;
            };
            let (id, is_method) = match owner {
                Some(owner_name) => (
                    make_member_id(ctx.file_path, crate::types::NodeKind::Method, owner_name, &name),
                    true,
                ),
                None => (make_id(ctx.file_path, crate::types::NodeKind::Function, &name), false),
            };
            let fields = if is_method {
                NodeFields::Method {
                    owner: owner.unwrap().to_string(),
                    visibility: extract_visibility(bytes, node),
                    is_static: !params_of(bytes, node.child_by_field_name("parameters"))
                        .iter()
                        .any(|p| p.name == "self"),
                    is_async: is_async(bytes, node),
                    params: params_of(bytes, node.child_by_field_name("parameters")),
                    return_type: return_type_of(bytes, node),
                }
            } else {
                NodeFields::Function {
                    is_async: is_async(bytes, node),
                    params: params_of(bytes, node.child_by_field_name("parameters")),
                    return_type: return_type_of(bytes, node),
                }
            };
            out.nodes.push(GraphNode {
                id: id.clone(),
                name: name.clone(),
                file_path: ctx.file_path.to_string(),
                package: ctx.package.to_string(),
                module: ctx.module.to_string(),
                start_line: line_of(bytes, node.start_byte()),
                end_line: line_of(bytes, node.end_byte()),
                exported: matches!(extract_visibility(bytes, node), Visibility::Public),
                fields,
                content_hash: hash_bytes(&bytes[node.start_byte()..node.end_byte()]),
                snippet: text_of(bytes, node).unwrap_or("").to_string(),
            });
            let symbol_path = match owner {
                Some(o) => format!("{o}.{name}"),
                None => name.clone(),
            };
            if let Some(body) = node.child_by_field_name("body") {
                walk(body, ctx, out, owner, Some(&symbol_path));
            }
            return;
        }
        "struct_item" => {
            if let Some(name) = node
                .child_by_field_name("name")
                .and_then(|n| last_ident_of(bytes, n))
            {
                let id = make_id(ctx.file_path, crate::types::NodeKind::Class, &name);
                out.nodes.push(GraphNode {
                    id,
                    name: name.clone(),
                    file_path: ctx.file_path.to_string(),
                    package: ctx.package.to_string(),
                    module: ctx.module.to_string(),
                    start_line: line_of(bytes, node.start_byte()),
                    end_line: line_of(bytes, node.end_byte()),
                    exported: matches!(extract_visibility(bytes, node), Visibility::Public),
                    fields: NodeFields::Class {
                        extends: None,
                        implements: Vec::new(),
                    },
                    content_hash: hash_bytes(&bytes[node.start_byte()..node.end_byte()]),
                    snippet: text_of(bytes, node).unwrap_or("").to_string(),
                });
                walk_struct_fields(node, ctx, &name, out);
            }
            return;
        }
        "enum_item" => {
            if let Some(name) = node
                .child_by_field_name("name")
                .and_then(|n| last_ident_of(bytes, n))
            {
                let id = make_id(ctx.file_path, crate::types::NodeKind::Class, &name);
                out.nodes.push(GraphNode {
                    id,
                    name,
                    file_path: ctx.file_path.to_string(),
                    package: ctx.package.to_string(),
                    module: ctx.module.to_string(),
                    start_line: line_of(bytes, node.start_byte()),
                    end_line: line_of(bytes, node.end_byte()),
                    exported: matches!(extract_visibility(bytes, node), Visibility::Public),
                    fields: NodeFields::Class {
                        extends: None,
                        implements: Vec::new(),
                    },
                    content_hash: hash_bytes(&bytes[node.start_byte()..node.end_byte()]),
                    snippet: text_of(bytes, node).unwrap_or("").to_string(),
                });
            }
            return;
        }
        "trait_item" => {
            if let Some(name) = node
                .child_by_field_name("name")
                .and_then(|n| last_ident_of(bytes, n))
            {
                let id = make_id(ctx.file_path, crate::types::NodeKind::Interface, &name);
                out.nodes.push(GraphNode {
                    id,
                    name: name.clone(),
                    file_path: ctx.file_path.to_string(),
                    package: ctx.package.to_string(),
                    module: ctx.module.to_string(),
                    start_line: line_of(bytes, node.start_byte()),
                    end_line: line_of(bytes, node.end_byte()),
                    exported: matches!(extract_visibility(bytes, node), Visibility::Public),
                    fields: NodeFields::Interface { extends: Vec::new() },
                    content_hash: hash_bytes(&bytes[node.start_byte()..node.end_byte()]),
                    snippet: text_of(bytes, node).unwrap_or("").to_string(),
                });
                if let Some(body) = node.child_by_field_name("body") {
                    walk(body, ctx, out, Some(&name), None);
                }
            }
            return;
        }
        "impl_item" => {
            let owner_name = impl_type_ident(bytes, node);
            if let (Some(owner_name), Some(trait_name)) =
                (owner_name.clone(), impl_trait_ident(bytes, node))
            {
                out.inherits.push(RawInherit {
                    owner_symbol_path: owner_name,
                    target_text: trait_name,
                    is_implements: true,
                });
            }
            if let Some(body) = node.child_by_field_name("body") {
                walk(body, ctx, out, owner_name.as_deref(), None);
            }
            return;
        }
        "type_item" => {
            if let Some(name) = node
                .child_by_field_name("name")
                .and_then(|n| last_ident_of(bytes, n))
            {
                let aliased_type = node
                    .child_by_field_name("type")
                    .and_then(|n| text_of(bytes, n))
                    .unwrap_or("")
                    .to_string();
                let id = make_id(ctx.file_path, crate::types::NodeKind::TypeAlias, &name);
                out.nodes.push(GraphNode {
                    id,
                    name,
                    file_path: ctx.file_path.to_string(),
                    package: ctx.package.to_string(),
                    module: ctx.module.to_string(),
                    start_line: line_of(bytes, node.start_byte()),
                    end_line: line_of(bytes, node.end_byte()),
                    exported: matches!(extract_visibility(bytes, node), Visibility::Public),
                    fields: NodeFields::TypeAlias { aliased_type },
                    content_hash: hash_bytes(&bytes[node.start_byte()..node.end_byte()]),
                    snippet: text_of(bytes, node).unwrap_or("").to_string(),
                });
            }
            return;
        }
        "const_item" | "static_item" => {
            if let Some(name) = node
                .child_by_field_name("name")
                .and_then(|n| last_ident_of(bytes, n))
            {
                let type_text = node
                    .child_by_field_name("type")
                    .and_then(|n| last_ident_of(bytes, n));
                let id = make_id(ctx.file_path, crate::types::NodeKind::Variable, &name);
                out.nodes.push(GraphNode {
                    id,
                    name,
                    file_path: ctx.file_path.to_string(),
                    package: ctx.package.to_string(),
                    module: ctx.module.to_string(),
                    start_line: line_of(bytes, node.start_byte()),
                    end_line: line_of(bytes, node.end_byte()),
                    exported: matches!(extract_visibility(bytes, node), Visibility::Public),
                    fields: NodeFields::Variable {
                        is_const: true,
                        type_text,
                    },
                    content_hash: hash_bytes(&bytes[node.start_byte()..node.end_byte()]),
                    snippet: text_of(bytes, node).unwrap_or("").to_string(),
                });
            }
            return;
        }
        "call_expression" => {
            if let (Some(fun), Some(caller)) = (node.child_by_field_name("function"), caller) {
                if let Some(callee) = last_ident_of(bytes, fun) {
                    out.calls.push(RawCall {
                        caller_symbol_path: caller.to_string(),
                        callee_text: callee,
                        start_line: line_of(bytes, node.start_byte()),
                        end_line: line_of(bytes, node.end_byte()),
                    });
                }
            }
        }
        "use_declaration" => {
            if let Some(arg) = node.child_by_field_name("argument") {
                extract_use_tree(arg, bytes, "", out);
            }
            return;
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, ctx, out, owner, caller);
    }
}

fn walk_struct_fields(struct_node: Node, ctx: &mut Ctx, owner: &str, out: &mut ParsedFile) {
    let bytes = ctx.bytes;
    let Some(body) = struct_node.child_by_field_name("body") else {
        return;
    };
    if body.kind() != "field_declaration_list" {
        return;
    }
    let mut cursor = body.walk();
    for field in body.children(&mut cursor) {
        if field.kind() != "field_declaration" {
            continue;
        }
        let Some(name) = field
            .child_by_field_name("name")
            .and_then(|n| text_of(bytes, n))
        else {
            continue;
        };
        let type_text = field
            .child_by_field_name("type")
            .and_then(|n| last_ident_of(bytes, n));
        let id = make_member_id(ctx.file_path, crate::types::NodeKind::Property, owner, name);
        out.nodes.push(GraphNode {
            id,
            name: name.to_string(),
            file_path: ctx.file_path.to_string(),
            package: ctx.package.to_string(),
            module: ctx.module.to_string(),
            start_line: line_of(bytes, field.start_byte()),
            end_line: line_of(bytes, field.end_byte()),
            exported: matches!(extract_visibility(bytes, field), Visibility::Public),
            fields: NodeFields::Property {
                owner: owner.to_string(),
                type_text,
                optional: false,
                readonly: false,
            },
            content_hash: hash_bytes(&bytes[field.start_byte()..field.end_byte()]),
            snippet: text_of(bytes, field).unwrap_or("").to_string(),
        });
    }
}

fn extract_use_tree(node: Node, bytes: &[u8], prefix: &str, out: &mut ParsedFile) {
    match node.kind() {
        "scoped_identifier" | "identifier" => {
            let Some(text) = text_of(bytes, node) else { return };
            let full_path = if prefix.is_empty() {
                text.to_string()
            } else {
                format!("{prefix}::{text}")
            };
            let name = text.rsplit("::").next().unwrap_or(text).to_string();
            out.imports.push(RawImport {
                specifier: full_path,
                type_only: false,
                named: vec![ImportedName {
                    imported: name.clone(),
                    local: name,
                    type_only: false,
                }],
                default_name: None,
                namespace_name: None,
                location: Location::new(
                    node.start_byte(),
                    node.end_byte(),
                    node.start_position().row as u32,
                    node.end_position().row as u32,
                ),
            });
        }
        "use_as_clause" => {
            let (Some(path_node), Some(alias_node)) = (
                node.child_by_field_name("path"),
                node.child_by_field_name("alias"),
            ) else {
                return;
            };
            let (Some(path_text), Some(alias_text)) =
                (text_of(bytes, path_node), text_of(bytes, alias_node))
            else {
                return;
            };
            let full_path = if prefix.is_empty() {
                path_text.to_string()
            } else {
                format!("{prefix}::{path_text}")
            };
            let imported = path_text.rsplit("::").next().unwrap_or(path_text).to_string();
            out.imports.push(RawImport {
                specifier: full_path,
                type_only: false,
                named: vec![ImportedName {
                    imported,
                    local: alias_text.to_string(),
                    type_only: false,
                }],
                default_name: None,
                namespace_name: None,
                location: Location::new(
                    node.start_byte(),
                    node.end_byte(),
                    node.start_position().row as u32,
                    node.end_position().row as u32,
                ),
            });
        }
        "use_wildcard" => {
            let full_text = text_of(bytes, node).unwrap_or("");
            let path_part = full_text.strip_suffix("::*").unwrap_or(full_text);
            let full_path = if prefix.is_empty() {
                path_part.to_string()
            } else {
                format!("{prefix}::{path_part}")
            };
            out.imports.push(RawImport {
                specifier: full_path,
                type_only: false,
                named: Vec::new(),
                default_name: None,
                namespace_name: Some("*".to_string()),
                location: Location::new(
                    node.start_byte(),
                    node.end_byte(),
                    node.start_position().row as u32,
                    node.end_position().row as u32,
                ),
            });
        }
        "scoped_use_list" => {
            let Some(path_node) = node.child_by_field_name("path") else { return };
            let Some(path_text) = text_of(bytes, path_node) else { return };
            let new_prefix = if prefix.is_empty() {
                path_text.to_string()
            } else {
                format!("{prefix}::{path_text}")
            };
            if let Some(list_node) = node.child_by_field_name("list") {
                let mut cursor = list_node.walk();
                for child in list_node.children(&mut cursor) {
                    extract_use_tree(child, bytes, &new_prefix, out);
                }
            }
        }
        "use_list" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                extract_use_tree(child, bytes, prefix, out);
            }
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                extract_use_tree(child, bytes, prefix, out);
            }
        }
    }
}
