//! The `AstProject` boundary (§4.1): a behavioral abstraction over a parsed
//! source file that the node/edge extractors consume. Concretely realized
//! with tree-sitter, dispatched per file extension the way the teacher's
//! `LanguageParser` trait does, generalized to emit spec nodes/edges instead
//! of the teacher's flat symbol table.

pub mod rust;
pub mod typescript;

use crate::types::{Node, RawImport};
use std::path::Path;
use tree_sitter::{Language, Tree};

/// One parsed call expression, prior to cross-file resolution.
#[derive(Debug, Clone)]
pub struct RawCall {
    pub caller_symbol_path: String,
    pub callee_text: String,
    pub start_line: u32,
    pub end_line: u32,
}

/// One parsed value-position reference (§4.4 REFERENCES), prior to
/// cross-file resolution.
#[derive(Debug, Clone)]
pub struct RawReference {
    pub owner_symbol_path: String,
    pub referenced_text: String,
    pub context: crate::types::ReferenceContext,
}

/// One parsed `extends`/`implements` relation, prior to resolution.
#[derive(Debug, Clone)]
pub struct RawInherit {
    pub owner_symbol_path: String,
    pub target_text: String,
    pub is_implements: bool,
}

/// One parsed type use (§4.4 USES_TYPE), prior to resolution.
#[derive(Debug, Clone)]
pub struct RawTypeUse {
    pub owner_symbol_path: String,
    pub type_name: String,
    pub context: crate::types::TypeUseContext,
}

/// Everything a single file's parse yields, local to that file. No
/// cross-file resolution has happened yet; `ImportMap` building and edge
/// resolution are separate passes over this struct (§4.2–4.4).
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub nodes: Vec<Node>,
    pub imports: Vec<RawImport>,
    pub calls: Vec<RawCall>,
    pub references: Vec<RawReference>,
    pub inherits: Vec<RawInherit>,
    pub type_uses: Vec<RawTypeUse>,
    /// `export { a, b as c } from './x'` / `export * from './x'` statements
    /// (§4.3 step 4: re-export chain following). Shaped like `RawImport` so
    /// the import map builder can walk it the same way: `named[].imported`
    /// is the name in the source module, `named[].local` is the name this
    /// file re-exports it under. `namespace_name = Some("*")` marks a
    /// wildcard re-export.
    pub re_exports: Vec<RawImport>,
    /// The name of this file's default export, when statically known
    /// (`export default foo;` or `export default function foo() {}`).
    pub default_export: Option<String>,
}

/// Behavioral abstraction over one language's AST facility (§4.1).
pub trait LanguageParser: Send + Sync {
    fn language(&self) -> Language;
    fn extensions(&self) -> &[&str];

    fn parse(
        &self,
        source: &str,
        file_path: &str,
        package: &str,
        module: &str,
    ) -> anyhow::Result<ParsedFile>;
}

/// Tree-sitter parse helper shared by both language backends.
pub(crate) fn parse_tree(language: Language, source: &str) -> anyhow::Result<Tree> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&language)
        .map_err(|e| anyhow::anyhow!("parser.set_language: {e:?}"))?;
    parser
        .parse(source, None)
        .ok_or_else(|| anyhow::anyhow!("tree-sitter failed to produce a parse tree"))
}

/// Dispatch to the right parser for a file's extension. `.d.ts` is treated
/// as declaration-only and skipped at discovery time (§4.1), not here.
pub fn parser_for_file(path: &Path) -> Option<Box<dyn LanguageParser>> {
    let ext = path.extension()?.to_str()?;
    match ext.to_lowercase().as_str() {
        "rs" => Some(Box::new(rust::RustParser::new())),
        "ts" | "mts" | "cts" => Some(Box::new(typescript::TypeScriptParser::new_typescript())),
        "tsx" => Some(Box::new(typescript::TypeScriptParser::new_tsx())),
        _ => None,
    }
}

pub fn is_declaration_only(path: &Path) -> bool {
    path.to_string_lossy().ends_with(".d.ts")
}
