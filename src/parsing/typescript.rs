//! TypeScript/TSX node, import, and edge-candidate extraction (§4.1–4.4).
//!
//! Generalizes the teacher's flat `walk_ts_symbols`/`walk_ts_calls`/
//! `walk_ts_imports` (which only emitted a same-file scoped-name symbol
//! table) into the full node/edge vocabulary: class/interface members,
//! extends/implements heritage, parameter and return-type text, and the
//! REFERENCES/USES_TYPE edge candidates the teacher never extracted.
//! `extract_callee_name` and the camelCase-agnostic callee resolution are
//! carried over unchanged in spirit.

use super::{
    LanguageParser, ParsedFile, RawCall, RawInherit, RawReference, RawTypeUse, parse_tree,
};
use crate::types::{
    Location, Node as GraphNode, NodeFields, Param, ReferenceContext, TypeUseContext, Visibility,
    make_id, make_member_id, path_extension,
};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use tree_sitter::{Language, Node, Tree};

const BUILTIN_TYPES: &[&str] = &[
    "String", "Number", "Boolean", "Array", "Object", "Date", "RegExp", "Promise", "Map", "Set",
    "WeakMap", "WeakSet", "Error", "Function", "Symbol", "BigInt",
];

pub struct TypeScriptParser {
    language: Language,
    extensions: &'static [&'static str],
}

impl TypeScriptParser {
    pub fn new_typescript() -> Self {
        Self {
            language: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            extensions: &["ts", "mts", "cts"],
        }
    }

    pub fn new_tsx() -> Self {
        Self {
            language: tree_sitter_typescript::LANGUAGE_TSX.into(),
            extensions: &["tsx"],
        }
    }
}

impl LanguageParser for TypeScriptParser {
    fn language(&self) -> Language {
        self.language.clone()
    }

    fn extensions(&self) -> &[&str] {
        self.extensions
    }

    fn parse(
        &self,
        source: &str,
        file_path: &str,
        package: &str,
        module: &str,
    ) -> anyhow::Result<ParsedFile> {
        let tree: Tree = parse_tree(self.language.clone(), source)?;
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
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            walk_toplevel(child, &mut ctx, &mut out, false);
        }
        walk_imports(root, &mut ctx, &mut out);

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

fn strip_quotes(s: &str) -> String {
    s.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}

fn last_identifier(bytes: &[u8], node: Node) -> Option<String> {
    let text = text_of(bytes, node)?;
    let mut best = None;
    for part in text.split(|c: char| !c.is_ascii_alphanumeric() && c != '_') {
        if !part.is_empty() {
            best = Some(part);
        }
    }
    best.map(|s| s.to_string())
}

fn string_literal_value(bytes: &[u8], node: Node) -> Option<String> {
    let text = text_of(bytes, node)?;
    let first = text.chars().next()?;
    if (first == '"' || first == '\'' || first == '`') && text.ends_with(first) {
        return Some(strip_quotes(text));
    }
    None
}

/// Leftmost-segment callee resolution (§4.4 CALLS): `foo.bar()` -> `foo`,
/// `foo["bar"]()` -> resolved by index text when it's a string literal,
/// `foo?.bar()` unwrapped through the optional chain.
fn extract_callee_name(bytes: &[u8], node: Node) -> Option<String> {
    match node.kind() {
        "identifier" | "property_identifier" => text_of(bytes, node).map(|s| s.to_string()),
        "member_expression" => node
            .child_by_field_name("object")
            .and_then(|obj| extract_callee_name(bytes, obj))
            .or_else(|| last_identifier(bytes, node)),
        "subscript_expression" => {
            if let Some(lit) = node
                .child_by_field_name("index")
                .and_then(|index| string_literal_value(bytes, index))
            {
                return Some(lit);
            }
            node.child_by_field_name("object")
                .and_then(|obj| extract_callee_name(bytes, obj))
                .or_else(|| last_identifier(bytes, node))
        }
        "optional_chain" | "parenthesized_expression" | "non_null_expression" | "as_expression" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if let Some(name) = extract_callee_name(bytes, child) {
                    return Some(name);
                }
            }
            last_identifier(bytes, node)
        }
        _ => last_identifier(bytes, node),
    }
}

fn strip_type_generics(text: &str) -> &str {
    let end = text
        .find(|c: char| c == '<' || c == '[' || c == '|' || c == '&')
        .unwrap_or(text.len());
    text[..end].trim()
}

fn base_type_name(bytes: &[u8], type_node: Node) -> Option<String> {
    // Unwrap a `type_annotation` wrapper (`: Foo`).
    let inner = if type_node.kind() == "type_annotation" {
        type_node.child(1).unwrap_or(type_node)
    } else {
        type_node
    };
    let text = text_of(bytes, inner)?;
    let base = strip_type_generics(text);
    if base.is_empty() {
        return None;
    }
    Some(base.to_string())
}

fn is_exported(node: Node) -> bool {
    node.parent()
        .map(|p| p.kind() == "export_statement")
        .unwrap_or(false)
}

fn params_of(bytes: &[u8], params_node: Option<Node>) -> Vec<Param> {
    let Some(params_node) = params_node else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut cursor = params_node.walk();
    for child in params_node.children(&mut cursor) {
        if !matches!(
            child.kind(),
            "required_parameter" | "optional_parameter" | "identifier" | "rest_pattern"
        ) {
            continue;
        }
        let name = child
            .child_by_field_name("pattern")
            .or(Some(child))
            .and_then(|n| text_of(bytes, n))
            .unwrap_or("")
            .to_string();
        let type_text = child
            .child_by_field_name("type")
            .and_then(|t| base_type_name(bytes, t));
        if !name.is_empty() {
            out.push(Param { name, type_text });
        }
    }
    out
}

fn return_type_of(bytes: &[u8], node: Node) -> Option<String> {
    node.child_by_field_name("return_type")
        .and_then(|t| base_type_name(bytes, t))
}

/// Walk a class/interface body's heritage clause for EXTENDS/IMPLEMENTS
/// candidates. Tree-sitter-typescript names these nodes slightly
/// differently between classes (`class_heritage`) and interfaces
/// (`extends_type_clause`), so this matches on substring rather than an
/// exact kind to stay robust to both shapes.
fn collect_heritage(bytes: &[u8], decl_node: Node, owner: &str, out: &mut Vec<RawInherit>) {
    let mut cursor = decl_node.walk();
    for child in decl_node.children(&mut cursor) {
        let kind = child.kind();
        if kind.contains("heritage") {
            collect_heritage(bytes, child, owner, out);
            continue;
        }
        let is_implements = kind.contains("implements");
        let is_extends = kind.contains("extends");
        if !is_implements && !is_extends {
            continue;
        }
        let mut inner = child.walk();
        for ty in child.children(&mut inner) {
            if matches!(
                ty.kind(),
                "type_identifier" | "identifier" | "generic_type" | "nested_type_identifier"
            ) {
                if let Some(name) = base_type_name(bytes, ty) {
                    out.push(RawInherit {
                        owner_symbol_path: owner.to_string(),
                        target_text: name,
                        is_implements,
                    });
                }
            }
        }
    }
}

fn walk_toplevel(node: Node, ctx: &mut Ctx, out: &mut ParsedFile, force_exported: bool) {
    let bytes = ctx.bytes;
    match node.kind() {
        "export_statement" => {
            // `export { a, b as c } from './x'` / `export * from './x'` /
            // `export * as ns from './x'`: a re-export, not a local
            // declaration. Tree-sitter-typescript gives these a `source`
            // field; fed to the import map builder's re-export chain
            // following (§4.3 step 4) rather than `walk_toplevel`.
            if let Some(source) = node.child_by_field_name("source") {
                let specifier = text_of(bytes, source).map(strip_quotes).unwrap_or_default();
                let mut named = Vec::new();
                let mut namespace_name = None;
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    match child.kind() {
                        "export_clause" => {
                            let mut ic = child.walk();
                            for spec in child.children(&mut ic) {
                                if spec.kind() != "export_specifier" {
                                    continue;
                                }
                                let name = spec
                                    .child_by_field_name("name")
                                    .and_then(|n| text_of(bytes, n))
                                    .unwrap_or("")
                                    .to_string();
                                let alias = spec
                                    .child_by_field_name("alias")
                                    .and_then(|n| text_of(bytes, n))
                                    .unwrap_or(&name)
                                    .to_string();
                                if !name.is_empty() {
                                    named.push(crate::types::ImportedName {
                                        imported: name,
                                        local: alias,
                                        type_only: false,
                                    });
                                }
                            }
                        }
                        "namespace_export" => {
                            namespace_name = last_identifier(bytes, child).or(Some("*".to_string()));
                        }
                        _ => {}
                    }
                }
                out.re_exports.push(crate::types::RawImport {
                    specifier,
                    type_only: false,
                    named,
                    default_name: None,
                    namespace_name,
                    location: Location::new(
                        node.start_byte(),
                        node.end_byte(),
                        line_of(bytes, node.start_byte()),
                        line_of(bytes, node.end_byte()),
                    ),
                });
                return;
            }

            let full_text = text_of(bytes, node).unwrap_or("");
            let is_default = full_text.trim_start().starts_with("export default");

            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "export_clause"
                    || text_of(bytes, child).unwrap_or("").starts_with('{')
                {
                    continue;
                }
                if is_default && child.kind() == "identifier" {
                    // `export default someAlreadyDeclaredName;`
                    if let Some(name) = text_of(bytes, child) {
                        out.default_export = Some(name.to_string());
                    }
                    continue;
                }
                if is_default {
                    if let Some(name) = child
                        .child_by_field_name("name")
                        .and_then(|n| text_of(bytes, n))
                    {
                        out.default_export = Some(name.to_string());
                    }
                }
                walk_toplevel(child, ctx, out, true);
            }
        }
        "function_declaration" => {
            if let Some(name) = node.child_by_field_name("name").and_then(|n| text_of(bytes, n)) {
                let name = name.to_string();
                let id = make_id(ctx.file_path, crate::types::NodeKind::Function, &name);
                out.nodes.push(build_function_node(
                    ctx,
                    node,
                    &id,
                    &name,
                    is_exported(node) || force_exported,
                ));
                if let Some(body) = node.child_by_field_name("body") {
                    walk_body(body, ctx, &name, out);
                }
                extract_param_type_uses(ctx, node, &name, out);
            }
        }
        "class_declaration" => {
            if let Some(name) = node.child_by_field_name("name").and_then(|n| text_of(bytes, n)) {
                let name = name.to_string();
                let id = make_id(ctx.file_path, crate::types::NodeKind::Class, &name);
                collect_heritage(bytes, node, &name, &mut out.inherits);
                out.nodes.push(build_class_node(
                    ctx,
                    node,
                    &id,
                    &name,
                    is_exported(node) || force_exported,
                ));
                if let Some(body) = node.child_by_field_name("body") {
                    walk_class_members(body, ctx, &name, out);
                }
            }
        }
        "interface_declaration" => {
            if let Some(name) = node.child_by_field_name("name").and_then(|n| text_of(bytes, n)) {
                let name = name.to_string();
                let mut extends = Vec::new();
                let mut inherits = Vec::new();
                collect_heritage(bytes, node, &name, &mut inherits);
                for h in &inherits {
                    if !h.is_implements {
                        extends.push(h.target_text.clone());
                    }
                }
                out.inherits.extend(inherits);
                let id = make_id(ctx.file_path, crate::types::NodeKind::Interface, &name);
                out.nodes.push(GraphNode {
                    id,
                    name: name.clone(),
                    file_path: ctx.file_path.to_string(),
                    package: ctx.package.to_string(),
                    module: ctx.module.to_string(),
                    start_line: line_of(bytes, node.start_byte()),
                    end_line: line_of(bytes, node.end_byte()),
                    exported: is_exported(node) || force_exported,
                    fields: NodeFields::Interface { extends },
                    content_hash: hash_bytes(&bytes[node.start_byte()..node.end_byte()]),
                    snippet: text_of(bytes, node).unwrap_or("").to_string(),
                });
                if let Some(body) = node.child_by_field_name("body") {
                    walk_interface_members(body, ctx, &name, out);
                }
            }
        }
        "type_alias_declaration" => {
            if let Some(name) = node.child_by_field_name("name").and_then(|n| text_of(bytes, n)) {
                let name = name.to_string();
                let aliased_type = node
                    .child_by_field_name("value")
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
                    exported: is_exported(node) || force_exported,
                    fields: NodeFields::TypeAlias { aliased_type },
                    content_hash: hash_bytes(&bytes[node.start_byte()..node.end_byte()]),
                    snippet: text_of(bytes, node).unwrap_or("").to_string(),
                });
            }
        }
        "lexical_declaration" | "variable_declaration" => {
            let is_const = text_of(bytes, node).unwrap_or("").trim_start().starts_with("const");
            let mut cursor = node.walk();
            for decl in node.children(&mut cursor) {
                if decl.kind() != "variable_declarator" {
                    continue;
                }
                walk_variable_declarator(decl, ctx, out, is_const, is_exported(node) || force_exported);
            }
        }
        _ => {}
    }
}

fn walk_variable_declarator(
    decl: Node,
    ctx: &mut Ctx,
    out: &mut ParsedFile,
    is_const: bool,
    exported: bool,
) {
    let bytes = ctx.bytes;
    let Some(name) = decl.child_by_field_name("name").and_then(|n| text_of(bytes, n)) else {
        return;
    };
    let name = name.to_string();
    let init = decl.child_by_field_name("value");
    let is_fn_valued = init
        .map(|i| matches!(i.kind(), "arrow_function" | "function" | "function_expression"))
        .unwrap_or(false);

    if is_fn_valued {
        let init = init.unwrap();
        let id = make_id(ctx.file_path, crate::types::NodeKind::Function, &name);
        out.nodes.push(GraphNode {
            id,
            name: name.clone(),
            file_path: ctx.file_path.to_string(),
            package: ctx.package.to_string(),
            module: ctx.module.to_string(),
            start_line: line_of(bytes, decl.start_byte()),
            end_line: line_of(bytes, decl.end_byte()),
            exported,
            fields: NodeFields::Function {
                is_async: text_of(bytes, init).unwrap_or("").trim_start().starts_with("async"),
                params: params_of(bytes, init.child_by_field_name("parameters").or(init.child_by_field_name("parameter"))),
                return_type: return_type_of(bytes, init),
            },
            content_hash: hash_bytes(&bytes[decl.start_byte()..decl.end_byte()]),
            snippet: text_of(bytes, decl).unwrap_or("").to_string(),
        });
        if let Some(body) = init.child_by_field_name("body") {
            walk_body(body, ctx, &name, out);
        }
        return;
    }

    let type_text = decl
        .child_by_field_name("type")
        .and_then(|t| base_type_name(bytes, t));
    let id = make_id(ctx.file_path, crate::types::NodeKind::Variable, &name);
    out.nodes.push(GraphNode {
        id,
        name: name.clone(),
        file_path: ctx.file_path.to_string(),
        package: ctx.package.to_string(),
        module: ctx.module.to_string(),
        start_line: line_of(bytes, decl.start_byte()),
        end_line: line_of(bytes, decl.end_byte()),
        exported,
        fields: NodeFields::Variable { is_const, type_text },
        content_hash: hash_bytes(&bytes[decl.start_byte()..decl.end_byte()]),
        snippet: text_of(bytes, decl).unwrap_or("").to_string(),
    });

    // A plain identifier initializer is an alias reference (§4.4 REFERENCES,
    // "assignment" context), excluding the arrow-function case handled above.
    if let Some(init) = init {
        if init.kind() == "identifier" {
            if let Some(target) = text_of(bytes, init) {
                out.references.push(RawReference {
                    owner_symbol_path: name.clone(),
                    referenced_text: target.to_string(),
                    context: ReferenceContext::Assignment,
                });
            }
        }
    }
}

fn build_function_node(ctx: &Ctx, node: Node, id: &str, name: &str, exported: bool) -> GraphNode {
    let bytes = ctx.bytes;
    GraphNode {
        id: id.to_string(),
        name: name.to_string(),
        file_path: ctx.file_path.to_string(),
        package: ctx.package.to_string(),
        module: ctx.module.to_string(),
        start_line: line_of(bytes, node.start_byte()),
        end_line: line_of(bytes, node.end_byte()),
        exported,
        fields: NodeFields::Function {
            is_async: text_of(bytes, node).unwrap_or("").trim_start().starts_with("export async")
                || text_of(bytes, node).unwrap_or("").trim_start().starts_with("async"),
            params: params_of(bytes, node.child_by_field_name("parameters")),
            return_type: return_type_of(bytes, node),
        },
        content_hash: hash_bytes(&bytes[node.start_byte()..node.end_byte()]),
        snippet: text_of(bytes, node).unwrap_or("").to_string(),
    }
}

fn build_class_node(ctx: &Ctx, node: Node, id: &str, name: &str, exported: bool) -> GraphNode {
    let bytes = ctx.bytes;
    let mut extends = None;
    let mut implements = Vec::new();
    let mut heritage = Vec::new();
    collect_heritage(bytes, node, name, &mut heritage);
    for h in heritage {
        if h.is_implements {
            implements.push(h.target_text);
        } else {
            extends = Some(h.target_text);
        }
    }
    GraphNode {
        id: id.to_string(),
        name: name.to_string(),
        file_path: ctx.file_path.to_string(),
        package: ctx.package.to_string(),
        module: ctx.module.to_string(),
        start_line: line_of(bytes, node.start_byte()),
        end_line: line_of(bytes, node.end_byte()),
        exported,
        fields: NodeFields::Class { extends, implements },
        content_hash: hash_bytes(&bytes[node.start_byte()..node.end_byte()]),
        snippet: text_of(bytes, node).unwrap_or("").to_string(),
    }
}

fn walk_class_members(body: Node, ctx: &mut Ctx, owner: &str, out: &mut ParsedFile) {
    let bytes = ctx.bytes;
    let mut cursor = body.walk();
    for member in body.children(&mut cursor) {
        match member.kind() {
            "method_definition" => {
                let Some(name) = member.child_by_field_name("name").and_then(|n| text_of(bytes, n))
                else {
                    continue;
                };
                let name = name.to_string();
                let id = make_member_id(ctx.file_path, crate::types::NodeKind::Method, owner, &name);
                let text = text_of(bytes, member).unwrap_or("");
                out.nodes.push(GraphNode {
                    id,
                    name: name.clone(),
                    file_path: ctx.file_path.to_string(),
                    package: ctx.package.to_string(),
                    module: ctx.module.to_string(),
                    start_line: line_of(bytes, member.start_byte()),
                    end_line: line_of(bytes, member.end_byte()),
                    exported: false,
                    fields: NodeFields::Method {
                        owner: owner.to_string(),
                        visibility: member_visibility(text),
                        is_static: text.trim_start().starts_with("static"),
                        is_async: text.contains("async "),
                        params: params_of(bytes, member.child_by_field_name("parameters")),
                        return_type: return_type_of(bytes, member),
                    },
                    content_hash: hash_bytes(&bytes[member.start_byte()..member.end_byte()]),
                    snippet: text.to_string(),
                });
                let caller_path = format!("{owner}.{name}");
                if let Some(fn_body) = member.child_by_field_name("body") {
                    walk_body(fn_body, ctx, &caller_path, out);
                }
                extract_param_type_uses(ctx, member, &caller_path, out);
            }
            "public_field_definition" | "field_definition" | "property_signature" => {
                let Some(name) = member.child_by_field_name("name").and_then(|n| text_of(bytes, n))
                else {
                    continue;
                };
                let name = name.to_string();
                let type_text = member
                    .child_by_field_name("type")
                    .and_then(|t| base_type_name(bytes, t));
                if let Some(ref ty) = type_text {
                    if !BUILTIN_TYPES.contains(&ty.as_str()) {
                        out.type_uses.push(RawTypeUse {
                            owner_symbol_path: format!("{owner}.{name}"),
                            type_name: ty.clone(),
                            context: TypeUseContext::Property,
                        });
                    }
                }
                let id = make_member_id(ctx.file_path, crate::types::NodeKind::Property, owner, &name);
                let text = text_of(bytes, member).unwrap_or("");
                out.nodes.push(GraphNode {
                    id,
                    name,
                    file_path: ctx.file_path.to_string(),
                    package: ctx.package.to_string(),
                    module: ctx.module.to_string(),
                    start_line: line_of(bytes, member.start_byte()),
                    end_line: line_of(bytes, member.end_byte()),
                    exported: false,
                    fields: NodeFields::Property {
                        owner: owner.to_string(),
                        type_text,
                        optional: text.contains('?'),
                        readonly: text.contains("readonly"),
                    },
                    content_hash: hash_bytes(&bytes[member.start_byte()..member.end_byte()]),
                    snippet: text.to_string(),
                });
            }
            _ => {}
        }
    }
}

fn walk_interface_members(body: Node, ctx: &mut Ctx, owner: &str, out: &mut ParsedFile) {
    let bytes = ctx.bytes;
    let mut cursor = body.walk();
    for member in body.children(&mut cursor) {
        match member.kind() {
            "method_signature" => {
                let Some(name) = member.child_by_field_name("name").and_then(|n| text_of(bytes, n))
                else {
                    continue;
                };
                let name = name.to_string();
                let id = make_member_id(ctx.file_path, crate::types::NodeKind::Method, owner, &name);
                out.nodes.push(GraphNode {
                    id,
                    name: name.clone(),
                    file_path: ctx.file_path.to_string(),
                    package: ctx.package.to_string(),
                    module: ctx.module.to_string(),
                    start_line: line_of(bytes, member.start_byte()),
                    end_line: line_of(bytes, member.end_byte()),
                    exported: false,
                    fields: NodeFields::Method {
                        owner: owner.to_string(),
                        visibility: Visibility::Public,
                        is_static: false,
                        is_async: false,
                        params: params_of(bytes, member.child_by_field_name("parameters")),
                        return_type: return_type_of(bytes, member),
                    },
                    content_hash: hash_bytes(&bytes[member.start_byte()..member.end_byte()]),
                    snippet: text_of(bytes, member).unwrap_or("").to_string(),
                });
                extract_param_type_uses(ctx, member, &format!("{owner}.{name}"), out);
            }
            "property_signature" => {
                let Some(name) = member.child_by_field_name("name").and_then(|n| text_of(bytes, n))
                else {
                    continue;
                };
                let name = name.to_string();
                let type_text = member
                    .child_by_field_name("type")
                    .and_then(|t| base_type_name(bytes, t));
                if let Some(ref ty) = type_text {
                    if !BUILTIN_TYPES.contains(&ty.as_str()) {
                        out.type_uses.push(RawTypeUse {
                            owner_symbol_path: format!("{owner}.{name}"),
                            type_name: ty.clone(),
                            context: TypeUseContext::Property,
                        });
                    }
                }
                let id = make_member_id(ctx.file_path, crate::types::NodeKind::Property, owner, &name);
                let text = text_of(bytes, member).unwrap_or("");
                out.nodes.push(GraphNode {
                    id,
                    name,
                    file_path: ctx.file_path.to_string(),
                    package: ctx.package.to_string(),
                    module: ctx.module.to_string(),
                    start_line: line_of(bytes, member.start_byte()),
                    end_line: line_of(bytes, member.end_byte()),
                    exported: false,
                    fields: NodeFields::Property {
                        owner: owner.to_string(),
                        type_text,
                        optional: text.contains('?'),
                        readonly: text.contains("readonly"),
                    },
                    content_hash: hash_bytes(&bytes[member.start_byte()..member.end_byte()]),
                    snippet: text.to_string(),
                });
            }
            _ => {}
        }
    }
}

fn member_visibility(text: &str) -> Visibility {
    if text.contains("private") {
        Visibility::Private
    } else if text.contains("protected") {
        Visibility::Protected
    } else {
        Visibility::Public
    }
}

/// USES_TYPE for a callable's parameters and return type (§4.4).
fn extract_param_type_uses(ctx: &Ctx, callable: Node, owner_symbol_path: &str, out: &mut ParsedFile) {
    let bytes = ctx.bytes;
    if let Some(params) = callable.child_by_field_name("parameters") {
        let mut cursor = params.walk();
        for p in params.children(&mut cursor) {
            if let Some(t) = p.child_by_field_name("type") {
                if let Some(name) = base_type_name(bytes, t) {
                    if !BUILTIN_TYPES.contains(&name.as_str()) {
                        out.type_uses.push(RawTypeUse {
                            owner_symbol_path: owner_symbol_path.to_string(),
                            type_name: name,
                            context: TypeUseContext::Parameter,
                        });
                    }
                }
            }
        }
    }
    if let Some(t) = callable.child_by_field_name("return_type") {
        if let Some(name) = base_type_name(bytes, t) {
            if !BUILTIN_TYPES.contains(&name.as_str()) {
                out.type_uses.push(RawTypeUse {
                    owner_symbol_path: owner_symbol_path.to_string(),
                    type_name: name,
                    context: TypeUseContext::Return,
                });
            }
        }
    }
}

/// Walk a callable body for CALLS and REFERENCES (§4.4).
fn walk_body(node: Node, ctx: &mut Ctx, caller_symbol_path: &str, out: &mut ParsedFile) {
    let bytes = ctx.bytes;
    match node.kind() {
        "call_expression" => {
            if let Some(callee_node) = node.child_by_field_name("function") {
                if let Some(callee_name) = extract_callee_name(bytes, callee_node) {
                    out.calls.push(RawCall {
                        caller_symbol_path: caller_symbol_path.to_string(),
                        callee_text: callee_name,
                        start_line: line_of(bytes, node.start_byte()),
                        end_line: line_of(bytes, node.end_byte()),
                    });
                }
                // Callback arguments: bare identifiers passed as args.
                if let Some(args) = node.child_by_field_name("arguments") {
                    let mut cursor = args.walk();
                    for arg in args.children(&mut cursor) {
                        if arg.kind() == "identifier" {
                            if let Some(text) = text_of(bytes, arg) {
                                out.references.push(RawReference {
                                    owner_symbol_path: caller_symbol_path.to_string(),
                                    referenced_text: text.to_string(),
                                    context: ReferenceContext::Callback,
                                });
                            }
                        } else {
                            walk_body(arg, ctx, caller_symbol_path, out);
                        }
                    }
                }
            }
        }
        "return_statement" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "identifier" {
                    if let Some(text) = text_of(bytes, child) {
                        out.references.push(RawReference {
                            owner_symbol_path: caller_symbol_path.to_string(),
                            referenced_text: text.to_string(),
                            context: ReferenceContext::Return,
                        });
                    }
                } else {
                    walk_body(child, ctx, caller_symbol_path, out);
                }
            }
        }
        "pair" => {
            if let Some(value) = node.child_by_field_name("value") {
                if value.kind() == "identifier" {
                    if let Some(text) = text_of(bytes, value) {
                        out.references.push(RawReference {
                            owner_symbol_path: caller_symbol_path.to_string(),
                            referenced_text: text.to_string(),
                            context: ReferenceContext::Property,
                        });
                    }
                } else {
                    walk_body(value, ctx, caller_symbol_path, out);
                }
            }
        }
        "shorthand_property_identifier" => {
            if let Some(text) = text_of(bytes, node) {
                out.references.push(RawReference {
                    owner_symbol_path: caller_symbol_path.to_string(),
                    referenced_text: text.to_string(),
                    context: ReferenceContext::Property,
                });
            }
        }
        "array" => {
            let mut cursor = node.walk();
            for el in node.children(&mut cursor) {
                if el.kind() == "identifier" {
                    if let Some(text) = text_of(bytes, el) {
                        out.references.push(RawReference {
                            owner_symbol_path: caller_symbol_path.to_string(),
                            referenced_text: text.to_string(),
                            context: ReferenceContext::Array,
                        });
                    }
                } else {
                    walk_body(el, ctx, caller_symbol_path, out);
                }
            }
        }
        "subscript_expression" => {
            // `map[key]` as an access reference, excluded when this node is
            // itself the callee of a call expression (`obj["f"]()`).
            let is_call_target = node
                .parent()
                .map(|p| p.kind() == "call_expression" && p.child_by_field_name("function") == Some(node))
                .unwrap_or(false);
            if !is_call_target {
                if let Some(obj) = node.child_by_field_name("object") {
                    if obj.kind() == "identifier" {
                        if let Some(text) = text_of(bytes, obj) {
                            out.references.push(RawReference {
                                owner_symbol_path: caller_symbol_path.to_string(),
                                referenced_text: text.to_string(),
                                context: ReferenceContext::Access,
                            });
                        }
                    }
                }
            }
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                walk_body(child, ctx, caller_symbol_path, out);
            }
        }
        "member_expression" => {
            // `obj.f()` must not reference `obj`: this arm only recurses
            // for nested calls, never matches its own object as a value.
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                walk_body(child, ctx, caller_symbol_path, out);
            }
        }
        "arrow_function" | "function_expression" | "function" => {
            // Inline callbacks keep attributing calls to the enclosing
            // named callable; tracking a fresh anonymous scope per closure
            // is not needed for the call-graph queries this system serves.
            if let Some(body) = node.child_by_field_name("body") {
                walk_body(body, ctx, caller_symbol_path, out);
            }
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                walk_body(child, ctx, caller_symbol_path, out);
            }
        }
    }
}

fn walk_imports(node: Node, ctx: &mut Ctx, out: &mut ParsedFile) {
    let bytes = ctx.bytes;
    if node.kind() == "import_statement" {
        let specifier = node
            .child_by_field_name("source")
            .and_then(|n| text_of(bytes, n))
            .map(strip_quotes)
            .unwrap_or_default();
        let full_text = text_of(bytes, node).unwrap_or("");
        let type_only = full_text.trim_start().starts_with("import type");

        let mut named = Vec::new();
        let mut default_name = None;
        let mut namespace_name = None;

        if let Some(clause) = node.child_by_field_name("import_clause") {
            let mut cursor = clause.walk();
            for part in clause.children(&mut cursor) {
                match part.kind() {
                    "identifier" => {
                        default_name = text_of(bytes, part).map(|s| s.to_string());
                    }
                    "namespace_import" => {
                        namespace_name = last_identifier(bytes, part);
                    }
                    "named_imports" => {
                        let mut ic = part.walk();
                        for spec in part.children(&mut ic) {
                            if spec.kind() != "import_specifier" {
                                continue;
                            }
                            let imported = spec
                                .child_by_field_name("name")
                                .and_then(|n| text_of(bytes, n))
                                .unwrap_or("")
                                .to_string();
                            let local = spec
                                .child_by_field_name("alias")
                                .and_then(|n| text_of(bytes, n))
                                .unwrap_or(&imported)
                                .to_string();
                            let spec_text = text_of(bytes, spec).unwrap_or("");
                            named.push(crate::types::ImportedName {
                                imported,
                                local,
                                type_only: spec_text.trim_start().starts_with("type "),
                            });
                        }
                    }
                    _ => {}
                }
            }
        }

        out.imports.push(crate::types::RawImport {
            specifier,
            type_only,
            named,
            default_name,
            namespace_name,
            location: Location::new(node.start_byte(), node.end_byte(), line_of(bytes, node.start_byte()), line_of(bytes, node.end_byte())),
        });
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_imports(child, ctx, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ParsedFile {
        TypeScriptParser::new_typescript()
            .parse(source, "barrel.ts", "root", "root")
            .unwrap()
    }

    #[test]
    fn parses_named_reexport_with_alias() {
        let parsed = parse("export { Impl as Thing } from './impl';\n");
        assert_eq!(parsed.re_exports.len(), 1);
        let re = &parsed.re_exports[0];
        assert_eq!(re.specifier, "./impl");
        assert_eq!(re.named.len(), 1);
        assert_eq!(re.named[0].imported, "Impl");
        assert_eq!(re.named[0].local, "Thing");
    }

    #[test]
    fn parses_wildcard_reexport() {
        let parsed = parse("export * from './impl';\n");
        assert_eq!(parsed.re_exports.len(), 1);
        assert_eq!(parsed.re_exports[0].specifier, "./impl");
        assert_eq!(parsed.re_exports[0].namespace_name.as_deref(), Some("*"));
    }

    #[test]
    fn plain_export_is_not_a_reexport() {
        let parsed = parse("export function doThing() {}\n");
        assert!(parsed.re_exports.is_empty());
        assert!(parsed.nodes.iter().any(|n| n.name == "doThing"));
    }

    #[test]
    fn export_default_of_declared_function_sets_default_export() {
        let parsed = parse("export default function main() {}\n");
        assert_eq!(parsed.default_export.as_deref(), Some("main"));
    }

    #[test]
    fn export_default_of_identifier_sets_default_export() {
        let parsed = parse("const helper = () => {};\nexport default helper;\n");
        assert_eq!(parsed.default_export.as_deref(), Some("helper"));
    }

    #[test]
    fn class_extends_and_implements_are_captured() {
        let parsed = parse(
            "interface Greeter { greet(): void; }\nclass Base {}\nclass Impl extends Base implements Greeter { greet(): void {} }\n",
        );
        assert!(parsed
            .inherits
            .iter()
            .any(|i| i.owner_symbol_path == "Impl" && i.target_text == "Base" && !i.is_implements));
        assert!(parsed
            .inherits
            .iter()
            .any(|i| i.owner_symbol_path == "Impl" && i.target_text == "Greeter" && i.is_implements));
    }

    #[test]
    fn uses_type_skips_builtins_and_captures_custom_types() {
        let parsed = parse(
            "interface Config {}\nfunction load(cfg: Config): string { return ''; }\n",
        );
        assert!(parsed
            .type_uses
            .iter()
            .any(|u| u.type_name == "Config" && u.owner_symbol_path == "load"));
        assert!(!parsed.type_uses.iter().any(|u| u.type_name == "String"));
    }

    #[test]
    fn callback_argument_produces_reference_not_call() {
        let parsed = parse(
            "function onReady(cb: Function) {}\nfunction handler() {}\nfunction main() { onReady(handler); }\n",
        );
        assert!(parsed
            .calls
            .iter()
            .any(|c| c.caller_symbol_path == "main" && c.callee_text == "onReady"));
        assert!(parsed
            .references
            .iter()
            .any(|r| r.owner_symbol_path == "main" && r.referenced_text == "handler"));
        assert!(!parsed
            .calls
            .iter()
            .any(|c| c.callee_text == "handler"));
    }

    #[test]
    fn method_call_does_not_reference_its_object() {
        let parsed = parse("function main(obj: any) { obj.run(); }\n");
        assert!(!parsed
            .references
            .iter()
            .any(|r| r.referenced_text == "obj"));
    }
}
