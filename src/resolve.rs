//! Import map builder (§4.3) and edge extractors (§4.4).
//!
//! `ImportMap` is the sole mechanism used to resolve cross-file edges; it
//! replaces any global node table (§4.3 intro). Building one requires
//! parsing sibling files on demand to follow alias/re-export chains — done
//! here through a small `FileCache` that parses and memoizes by relative
//! path, rather than ever accumulating a project-wide symbol table.

use crate::config::ProjectConfig;
use crate::parsing::{parser_for_file, ParsedFile};
use crate::registry::ProjectRegistry;
use crate::types::{
    make_id, parse_id, CallSiteRange, Edge, EdgeAttrs, Node, NodeKind, ReferenceContext,
    ResolvedImport,
};
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Parses and memoizes sibling files by project-root-relative path, for
/// alias/re-export chain following during import map construction. Never
/// accumulates into a project-wide symbol table — each entry is discarded
/// the moment the run ends.
pub struct FileCache {
    root: PathBuf,
    cache: DashMap<String, Option<Arc<ParsedFile>>>,
}

impl FileCache {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            cache: DashMap::new(),
        }
    }

    /// Parses and caches `rel_path` (project-root-relative, forward-slash
    /// normalized), returning `None` if the file is missing or has no
    /// registered parser for its extension.
    pub fn get_or_parse(&self, rel_path: &str, package: &str, module: &str) -> Option<Arc<ParsedFile>> {
        if let Some(hit) = self.cache.get(rel_path) {
            return hit.clone();
        }
        let abs = self.root.join(rel_path);
        let result = std::fs::read_to_string(&abs)
            .ok()
            .and_then(|source| {
                let parser = parser_for_file(Path::new(rel_path))?;
                parser.parse(&source, rel_path, package, module).ok()
            })
            .map(Arc::new);
        self.cache.insert(rel_path.to_string(), result.clone());
        result
    }

    /// Tries `base`, then the canonical extension set in order (§4.3 step
    /// 2), returning the first that exists on disk.
    pub fn find_existing(&self, base: &str) -> Option<String> {
        let candidates = [
            base.to_string(),
            format!("{base}.ts"),
            format!("{base}.tsx"),
            format!("{base}/index.ts"),
            format!("{base}/index.tsx"),
        ];
        for candidate in candidates {
            if self.root.join(&candidate).is_file() {
                return Some(crate::types::normalize_path(&candidate));
            }
        }
        None
    }
}

/// Everything the import map builder needs beyond the file being resolved:
/// where to find sibling files, and (optionally) which package owns which
/// directory for cross-package barrel resolution (§4.8).
pub struct ResolveContext<'a> {
    pub file_cache: &'a FileCache,
    pub registry: Option<&'a ProjectRegistry>,
    pub package: &'a str,
    pub module: &'a str,
}

/// Lexically joins `specifier` against the directory `importer_file_path`
/// lives in, collapsing `.`/`..` segments without touching the filesystem.
fn join_specifier(importer_file_path: &str, specifier: &str) -> String {
    let dir = match importer_file_path.rfind('/') {
        Some(idx) => &importer_file_path[..idx],
        None => "",
    };
    let combined = if dir.is_empty() {
        specifier.to_string()
    } else {
        format!("{dir}/{specifier}")
    };
    let mut parts: Vec<&str> = Vec::new();
    for comp in combined.split('/') {
        match comp {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Resolves a bare specifier (`shared/utils`) against configured package
/// roots: the first path segment matching a package name resolves against
/// that package's root, the remainder as a relative path. Anything else is
/// an external (node_modules) module and is not resolved (§4.3 step 1).
fn resolve_bare_via_registry(specifier: &str, registry: &ProjectRegistry) -> Option<(String, String)> {
    let mut segments = specifier.splitn(2, '/');
    let head = segments.next()?;
    let rest = segments.next().unwrap_or("");
    let handle = registry.roots().iter().find(|h| h.package_name == head)?;
    let package_root_rel = crate::types::path_to_rel_str(&handle.root_abs);
    let joined = if rest.is_empty() {
        package_root_rel
    } else {
        format!("{package_root_rel}/{rest}")
    };
    Some((handle.package_name.clone(), joined))
}

/// Resolves an import specifier to a project-root-relative target file
/// path, or `None` for external modules that can't be resolved (§4.3 steps
/// 1-2, 5).
pub fn resolve_specifier(importer_file_path: &str, specifier: &str, ctx: &ResolveContext) -> Option<String> {
    if specifier.starts_with('.') {
        let base = join_specifier(importer_file_path, specifier);
        ctx.file_cache.find_existing(&base)
    } else if let Some(rest) = specifier.strip_prefix('/') {
        ctx.file_cache.find_existing(rest)
    } else if let Some(registry) = ctx.registry {
        let (_, base) = resolve_bare_via_registry(specifier, registry)?;
        ctx.file_cache.find_existing(&base)
    } else {
        None
    }
}

fn find_top_level_node<'a>(parsed: &'a ParsedFile, name: &str) -> Option<&'a Node> {
    parsed.nodes.iter().find(|n| {
        n.kind() != NodeKind::File
            && n.name == name
            && !matches!(n.kind(), NodeKind::Method | NodeKind::Property)
    })
}

const MAX_REEXPORT_DEPTH: u32 = 8;

/// Resolves `name` (or the literal string `"default"`, for default
/// imports) to a node id within `file_path`, following re-export chains up
/// to `MAX_REEXPORT_DEPTH` hops (§4.3 steps 3-4).
fn resolve_symbol_in_file(
    file_path: &str,
    name: &str,
    ctx: &ResolveContext,
    depth: u32,
) -> Option<String> {
    if depth > MAX_REEXPORT_DEPTH {
        return None;
    }
    let parsed = ctx.file_cache.get_or_parse(file_path, ctx.package, ctx.module)?;

    if name == "default" {
        if let Some(default_name) = &parsed.default_export {
            if let Some(node) = find_top_level_node(&parsed, default_name) {
                return Some(node.id.clone());
            }
        }
    } else if let Some(node) = find_top_level_node(&parsed, name) {
        return Some(node.id.clone());
    }

    for re in &parsed.re_exports {
        if let Some(entry) = re.named.iter().find(|n| n.local == name) {
            if let Some(target_path) = resolve_specifier(file_path, &re.specifier, ctx) {
                if let Some(found) =
                    resolve_symbol_in_file(&target_path, &entry.imported, ctx, depth + 1)
                {
                    return Some(found);
                }
            }
        }
        if re.namespace_name.as_deref() == Some("*") && re.named.is_empty() {
            if let Some(target_path) = resolve_specifier(file_path, &re.specifier, ctx) {
                if let Some(found) = resolve_symbol_in_file(&target_path, name, ctx, depth + 1) {
                    return Some(found);
                }
            }
        }
    }
    None
}

/// `local_name -> target_id` for one file's import declarations (§4.3).
pub type ImportMap = HashMap<String, ResolvedImport>;

/// Builds the import map for one already-parsed file.
pub fn build_import_map(file_path: &str, parsed: &ParsedFile, ctx: &ResolveContext) -> ImportMap {
    let mut map = ImportMap::new();
    for import in &parsed.imports {
        if import.type_only {
            // step 6: type-only imports skipped by default.
            continue;
        }
        let Some(target_path) = resolve_specifier(file_path, &import.specifier, ctx) else {
            continue;
        };
        for name in &import.named {
            if name.type_only {
                continue;
            }
            if let Some(target_id) = resolve_symbol_in_file(&target_path, &name.imported, ctx, 0) {
                map.insert(
                    name.local.clone(),
                    ResolvedImport {
                        target_id,
                        local_name: name.local.clone(),
                    },
                );
            }
        }
        if let Some(default_name) = &import.default_name {
            let target_id = resolve_symbol_in_file(&target_path, "default", ctx, 0)
                .unwrap_or_else(|| make_id(&target_path, NodeKind::Function, "default"));
            map.insert(
                default_name.clone(),
                ResolvedImport {
                    target_id,
                    local_name: default_name.clone(),
                },
            );
        }
        // step 8: namespace imports are not added directly; `ns.member()`
        // calls resolve via the leftmost-segment callee text `ns`, which
        // this map deliberately does not bind.
    }
    map
}

/// Local, same-file symbol tables: one keyed by bare name (for top-level
/// symbols, used as CALLS/REFERENCES/EXTENDS/IMPLEMENTS/USES_TYPE resolution
/// targets) and one keyed by full symbol path (used to find the id of a
/// *caller/owner*, which may itself be a member).
pub struct LocalSymbols {
    by_name: HashMap<String, String>,
    by_symbol_path: HashMap<String, String>,
}

pub fn local_symbols(parsed: &ParsedFile) -> LocalSymbols {
    let mut by_name = HashMap::new();
    let mut by_symbol_path = HashMap::new();
    for node in &parsed.nodes {
        if node.kind() == NodeKind::File {
            continue;
        }
        if let Some((_, _, symbol_path)) = parse_id(&node.id) {
            by_symbol_path.insert(symbol_path.clone(), node.id.clone());
            if !symbol_path.contains('.') {
                by_name.insert(node.name.clone(), node.id.clone());
            }
        }
    }
    LocalSymbols {
        by_name,
        by_symbol_path,
    }
}

/// The "combined symbol map" of §4.4: local same-file symbols union the
/// import map, consulted by every edge extractor except CONTAINS/IMPORTS.
pub struct CombinedSymbolMap {
    pub local: LocalSymbols,
    pub imports: ImportMap,
}

impl CombinedSymbolMap {
    pub fn new(local: LocalSymbols, imports: ImportMap) -> Self {
        Self { local, imports }
    }

    /// Resolves a bare name to a target node id, local symbols taking
    /// precedence over imports.
    pub fn resolve_name(&self, name: &str) -> Option<&str> {
        self.local
            .by_name
            .get(name)
            .or_else(|| self.imports.get(name).map(|r| &r.target_id))
            .map(|s| s.as_str())
    }

    /// Resolves a symbol path (e.g. `fnA` or `Class.method`) to its own
    /// node id, for attributing an edge's source.
    pub fn owner_id(&self, symbol_path: &str) -> Option<&str> {
        self.local.by_symbol_path.get(symbol_path).map(|s| s.as_str())
    }
}

/// CONTAINS: `File -> node` for every top-level (non-member) node (§4.4).
pub fn extract_contains_edges(file_id: &str, parsed: &ParsedFile) -> Vec<Edge> {
    parsed
        .nodes
        .iter()
        .filter(|n| n.kind() != NodeKind::File)
        .filter_map(|n| {
            let (_, _, symbol_path) = parse_id(&n.id)?;
            if symbol_path.contains('.') {
                return None;
            }
            Some(Edge {
                source: file_id.to_string(),
                target: n.id.clone(),
                attrs: EdgeAttrs::Contains,
            })
        })
        .collect()
}

/// IMPORTS: `File -> File` for each import declaration with an internal
/// specifier (§4.4).
pub fn extract_import_edges(file_path: &str, parsed: &ParsedFile, ctx: &ResolveContext) -> Vec<Edge> {
    let mut out = Vec::new();
    for import in &parsed.imports {
        let Some(target_path) = resolve_specifier(file_path, &import.specifier, ctx) else {
            continue;
        };
        let mut imported_symbols: Vec<String> =
            import.named.iter().map(|n| n.imported.clone()).collect();
        if let Some(default_name) = &import.default_name {
            imported_symbols.push(default_name.clone());
        }
        if let Some(namespace_name) = &import.namespace_name {
            imported_symbols.push(namespace_name.clone());
        }
        out.push(Edge {
            source: file_path.to_string(),
            target: target_path,
            attrs: EdgeAttrs::Imports {
                type_only: import.type_only,
                imported_symbols,
            },
        });
    }
    out
}

/// CALLS: walks every call site, resolving the callee through a local
/// alias map (`const fn = target;`) and then the combined symbol map,
/// aggregating per-target call sites into one edge (§4.4).
pub fn extract_call_edges(parsed: &ParsedFile, combined: &CombinedSymbolMap) -> Vec<Edge> {
    let mut alias_map: HashMap<&str, &str> = HashMap::new();
    for r in &parsed.references {
        if matches!(r.context, ReferenceContext::Assignment) {
            alias_map.insert(&r.owner_symbol_path, &r.referenced_text);
        }
    }

    let mut aggregated: HashMap<(String, String), Vec<CallSiteRange>> = HashMap::new();
    for call in &parsed.calls {
        let Some(caller_id) = combined.owner_id(&call.caller_symbol_path) else {
            continue;
        };
        let resolved_name = alias_map
            .get(call.callee_text.as_str())
            .copied()
            .unwrap_or(call.callee_text.as_str());
        let Some(target_id) = combined.resolve_name(resolved_name) else {
            continue;
        };
        aggregated
            .entry((caller_id.to_string(), target_id.to_string()))
            .or_default()
            .push(CallSiteRange {
                start_line: call.start_line,
                end_line: call.end_line,
            });
    }

    aggregated
        .into_iter()
        .map(|((source, target), call_sites)| Edge {
            source,
            target,
            attrs: EdgeAttrs::Calls {
                call_count: call_sites.len() as u32,
                call_sites,
            },
        })
        .collect()
}

/// REFERENCES: value-position uses of a named symbol other than a direct
/// call (§4.4). Self-references are excluded.
pub fn extract_reference_edges(parsed: &ParsedFile, combined: &CombinedSymbolMap) -> Vec<Edge> {
    let mut out = Vec::new();
    for r in &parsed.references {
        let Some(owner_id) = combined.owner_id(&r.owner_symbol_path) else {
            continue;
        };
        let Some(target_id) = combined.resolve_name(&r.referenced_text) else {
            continue;
        };
        if target_id == owner_id {
            continue;
        }
        out.push(Edge {
            source: owner_id.to_string(),
            target: target_id.to_string(),
            attrs: EdgeAttrs::References { context: r.context },
        });
    }
    out
}

/// EXTENDS / IMPLEMENTS (§4.4).
pub fn extract_inherit_edges(parsed: &ParsedFile, combined: &CombinedSymbolMap) -> Vec<Edge> {
    let mut out = Vec::new();
    for inh in &parsed.inherits {
        let Some(owner_id) = combined.owner_id(&inh.owner_symbol_path) else {
            continue;
        };
        let Some(target_id) = combined.resolve_name(&inh.target_text) else {
            continue;
        };
        let attrs = if inh.is_implements {
            EdgeAttrs::Implements
        } else {
            EdgeAttrs::Extends
        };
        out.push(Edge {
            source: owner_id.to_string(),
            target: target_id.to_string(),
            attrs,
        });
    }
    out
}

/// USES_TYPE (§4.4). The parser has already dropped the built-in type set.
pub fn extract_type_use_edges(parsed: &ParsedFile, combined: &CombinedSymbolMap) -> Vec<Edge> {
    let mut out = Vec::new();
    for tu in &parsed.type_uses {
        let Some(owner_id) = combined.owner_id(&tu.owner_symbol_path) else {
            continue;
        };
        let Some(target_id) = combined.resolve_name(&tu.type_name) else {
            continue;
        };
        out.push(Edge {
            source: owner_id.to_string(),
            target: target_id.to_string(),
            attrs: EdgeAttrs::UsesType { context: tu.context },
        });
    }
    out
}

/// Runs every edge extractor for one file, given its already-built
/// combined symbol map. This is the full output of §4.4 for a single file.
pub fn extract_all_edges(
    file_id: &str,
    file_path: &str,
    parsed: &ParsedFile,
    combined: &CombinedSymbolMap,
    ctx: &ResolveContext,
) -> Vec<Edge> {
    let mut edges = extract_contains_edges(file_id, parsed);
    edges.extend(extract_import_edges(file_path, parsed, ctx));
    edges.extend(extract_call_edges(parsed, combined));
    edges.extend(extract_reference_edges(parsed, combined));
    edges.extend(extract_inherit_edges(parsed, combined));
    edges.extend(extract_type_use_edges(parsed, combined));
    edges
}

/// Resolves a `package_name` to its configured root, for callers that want
/// to build a `ResolveContext` without going through `ProjectRegistry`.
pub fn package_module_for(config: &ProjectConfig, package_name: &str) -> (String, String) {
    let module = config
        .module_of(package_name)
        .unwrap_or(package_name)
        .to_string();
    (package_name.to_string(), module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn resolves_relative_import_to_function() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.ts", "import { fnB } from './b';\nfunction fnA() { fnB(); }\n");
        write(dir.path(), "b.ts", "export function fnB() {}\n");

        let cache = FileCache::new(dir.path().to_path_buf());
        let ctx = ResolveContext {
            file_cache: &cache,
            registry: None,
            package: "root",
            module: "root",
        };
        let parsed = cache.get_or_parse("a.ts", "root", "root").unwrap();
        let map = build_import_map("a.ts", &parsed, &ctx);
        let resolved = map.get("fnB").expect("fnB should resolve");
        assert_eq!(resolved.target_id, "b.ts:Function:fnB");
    }

    #[test]
    fn follows_reexport_chain() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "barrel.ts",
            "export { Impl as Thing } from './impl';\n",
        );
        write(dir.path(), "impl.ts", "export class Impl {}\n");
        write(
            dir.path(),
            "user.ts",
            "import { Thing } from './barrel';\nfunction useIt(t: Thing) {}\n",
        );

        let cache = FileCache::new(dir.path().to_path_buf());
        let ctx = ResolveContext {
            file_cache: &cache,
            registry: None,
            package: "root",
            module: "root",
        };
        let parsed = cache.get_or_parse("user.ts", "root", "root").unwrap();
        let map = build_import_map("user.ts", &parsed, &ctx);
        let resolved = map.get("Thing").expect("Thing should resolve through re-export");
        assert_eq!(resolved.target_id, "impl.ts:Class:Impl");
    }

    #[test]
    fn call_edges_aggregate_call_sites() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a.ts",
            "function helper() {}\nfunction main() { helper(); helper(); }\n",
        );
        let cache = FileCache::new(dir.path().to_path_buf());
        let parsed = cache.get_or_parse("a.ts", "root", "root").unwrap();
        let local = local_symbols(&parsed);
        let combined = CombinedSymbolMap::new(local, ImportMap::new());
        let edges = extract_call_edges(&parsed, &combined);
        assert_eq!(edges.len(), 1);
        match &edges[0].attrs {
            EdgeAttrs::Calls { call_count, call_sites } => {
                assert_eq!(*call_count, 2);
                assert_eq!(call_sites.len(), 2);
            }
            _ => panic!("expected Calls"),
        }
    }

    #[test]
    fn contains_edges_exclude_members() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a.ts",
            "class Foo { bar(): void {} }\n",
        );
        let cache = FileCache::new(dir.path().to_path_buf());
        let parsed = cache.get_or_parse("a.ts", "root", "root").unwrap();
        let edges = extract_contains_edges("a.ts", &parsed);
        // Only the File -> Class edge, not File -> Method.
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target, "a.ts:Class:Foo");
    }

    #[test]
    fn default_import_falls_back_when_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.ts", "import Thing from './missing-default';\n");
        write(dir.path(), "missing-default.ts", "export const x = 1;\n");
        let cache = FileCache::new(dir.path().to_path_buf());
        let ctx = ResolveContext {
            file_cache: &cache,
            registry: None,
            package: "root",
            module: "root",
        };
        let parsed = cache.get_or_parse("a.ts", "root", "root").unwrap();
        let map = build_import_map("a.ts", &parsed, &ctx);
        let resolved = map.get("Thing").unwrap();
        assert_eq!(resolved.target_id, "missing-default.ts:Function:default");
    }
}
