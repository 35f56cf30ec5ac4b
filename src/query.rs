//! Query engine (§4.9): the composable `search_graph(constraints)` dispatch
//! plus the nine concrete tools (§6) that the CLI and MCP surfaces expose.
//! Every tool is a thin, differently-defaulted wrapper over the same
//! `DbReader` traversal primitives and `SearchIndex` lookup so the textual
//! contract can't drift between the two transports.

use crate::error::{OmniError, Result};
use crate::format::QueryResult;
use crate::search::{Bm25Index, Bm25Params, FieldWeights, HybridSearch, HybridSearchConfig};
use crate::semantic::SemanticIndex;
use crate::store::DbReader;
use crate::types::{Edge, EdgeKind, Node};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// `maxDepth` default for bounded traversals (§6).
pub const DEFAULT_MAX_DEPTH: u32 = 100;
/// `maxNodes` default for a rendered result (§6: "implementation-chosen").
pub const DEFAULT_MAX_NODES: usize = 200;

/// Either endpoint of a `search_graph` constraint (§4.9).
#[derive(Debug, Clone)]
pub enum Endpoint {
    Symbol(String),
    Query(String),
}

#[derive(Debug, Clone, Default)]
pub struct QueryConstraints {
    pub from: Option<Endpoint>,
    pub to: Option<Endpoint>,
    pub topic: Option<String>,
    pub edge_kinds: Option<Vec<EdgeKind>>,
    pub max_depth: u32,
    pub max_nodes: usize,
}

impl QueryConstraints {
    pub fn new() -> Self {
        Self {
            from: None,
            to: None,
            topic: None,
            edge_kinds: None,
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

/// A lexical + (optionally) semantic search index over a snapshot of the
/// graph's nodes, keyed by node id (§4.7).
pub struct SearchIndex {
    bm25: Bm25Index,
    semantic: Option<Arc<SemanticIndex>>,
    node_ids: Vec<String>,
    names: Vec<String>,
    index_of: HashMap<String, u32>,
}

impl SearchIndex {
    /// Builds a search index over `nodes`. Each node's snippet is indexed
    /// as its BM25 code field; its name and path contribute ident/path
    /// fields (§4.7, realized from `search/bm25.rs`).
    pub fn build(nodes: &[Node]) -> Self {
        let mut bm25 = Bm25Index::new();
        let mut node_ids = Vec::with_capacity(nodes.len());
        let mut names = Vec::with_capacity(nodes.len());
        let mut index_of = HashMap::with_capacity(nodes.len());

        for node in nodes {
            let idx = node_ids.len() as u32;
            node_ids.push(node.id.clone());
            names.push(node.name.clone());
            index_of.insert(node.id.clone(), idx);

            let path_tokens = crate::search::path_tokens(Path::new(&node.file_path));
            let ident_tokens: Vec<String> =
                crate::search::tokenize(&node.name).map(|s| s.to_string()).collect();
            bm25.add_document(
                node.id.clone(),
                path_tokens,
                ident_tokens,
                Vec::<&str>::new(),
                Vec::<&str>::new(),
                &node.snippet,
            );
        }
        bm25.finalize();

        Self {
            bm25,
            semantic: None,
            node_ids,
            names,
            index_of,
        }
    }

    pub fn with_semantic(mut self, semantic: Arc<SemanticIndex>) -> Self {
        self.semantic = Some(semantic);
        self
    }

    pub fn is_semantic_available(&self) -> bool {
        self.semantic.as_ref().is_some_and(|s| !s.is_empty())
    }

    /// Resolution modes 1 + the preference rule (§4.7): an exact token
    /// match on a node's name always wins over a scored partial match.
    /// Falls back to hybrid hybrid/BM25 fusion otherwise.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(String, f32)> {
        let tokens: HashSet<String> =
            crate::search::tokenize(query).map(|s| s.to_lowercase()).collect();
        let exact: Vec<(String, f32)> = self
            .names
            .iter()
            .zip(self.node_ids.iter())
            .filter(|(name, _)| tokens.contains(&name.to_lowercase()))
            .map(|(_, id)| (id.clone(), 1.0))
            .collect();
        if !exact.is_empty() {
            return exact;
        }

        let search_k = top_k.saturating_mul(5).max(top_k).min(1000);
        let bm25_hits = self
            .bm25
            .search(query, &FieldWeights::default(), Bm25Params::default(), search_k);
        let bm25_pairs: Vec<(u32, f32)> = bm25_hits
            .iter()
            .filter_map(|r| self.index_of.get(&r.node_id).map(|&i| (i, r.score)))
            .collect();

        let semantic_pairs: Vec<(u32, f32)> = match &self.semantic {
            Some(sem) if !sem.is_empty() => sem
                .search(query, search_k)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|(id, score)| self.index_of.get(&id).map(|&i| (i, score)))
                .collect(),
            _ => Vec::new(),
        };

        let hybrid = HybridSearch::new(HybridSearchConfig {
            final_top_k: top_k,
            ..HybridSearchConfig::default()
        });
        hybrid
            .search(query, semantic_pairs, bm25_pairs)
            .into_iter()
            .map(|r| (self.node_ids[r.doc_id as usize].clone(), r.score))
            .collect()
    }

    /// Mode descriptor surfaced to callers when a search fallback occurred
    /// (§7 kind 5).
    pub fn mode_label(&self) -> &'static str {
        if self.is_semantic_available() {
            "semantic search"
        } else {
            "keyword search"
        }
    }
}

enum Resolved {
    Nodes(Vec<Node>),
    Message(String),
}

/// Endpoint resolution (§4.9 steps 1-2).
fn resolve_endpoint(reader: &DbReader, index: &SearchIndex, endpoint: &Endpoint) -> Result<Resolved> {
    match endpoint {
        Endpoint::Symbol(sym) => {
            if let Some(node) = reader.get_node(sym)? {
                return Ok(Resolved::Nodes(vec![node]));
            }
            if let Some((file, name)) = sym.rsplit_once(':') {
                let matches = reader.find_by_name_in_file(file, name)?;
                match matches.len() {
                    0 => {}
                    1 => return Ok(Resolved::Nodes(matches)),
                    _ => {
                        return Ok(Resolved::Message(disambiguation_message(sym, &matches)));
                    }
                }
            }
            let matches = reader.find_by_name(sym)?;
            match matches.len() {
                0 => Err(OmniError::NotFound(sym.clone())),
                1 => Ok(Resolved::Nodes(matches)),
                _ => Ok(Resolved::Message(disambiguation_message(sym, &matches))),
            }
        }
        Endpoint::Query(q) => {
            let hits = index.search(q, 10);
            let mut nodes = Vec::new();
            for (id, _score) in hits {
                if let Some(node) = reader.get_node(&id)? {
                    nodes.push(node);
                }
            }
            if nodes.is_empty() {
                return Err(OmniError::NotFound(q.clone()));
            }
            Ok(Resolved::Nodes(nodes))
        }
    }
}

fn disambiguation_message(query: &str, candidates: &[Node]) -> String {
    let ids: Vec<String> = candidates.iter().map(|n| n.id.clone()).collect();
    format!("ambiguous symbol {query:?}: {ids:?}")
}

/// Direct forward/backward callers/callees traversal shared by the four
/// `*-callers`/`*-callees` tools (§6).
fn call_traversal(
    reader: &DbReader,
    index: &SearchIndex,
    endpoint: &Endpoint,
    max_depth: u32,
    forward: bool,
) -> Result<QueryResult> {
    match resolve_endpoint(reader, index, endpoint)? {
        Resolved::Message(message) => Ok(QueryResult {
            message: Some(message),
            ..Default::default()
        }),
        Resolved::Nodes(seeds) => {
            let mut nodes = seeds.clone();
            let mut seen: HashSet<String> = seeds.iter().map(|n| n.id.clone()).collect();

            for seed in &seeds {
                let reached = if forward {
                    reader.forward_callees(&seed.id, max_depth)?
                } else {
                    reader.backward_callers(&seed.id, max_depth)?
                };
                for r in reached {
                    if seen.insert(r.node.id.clone()) {
                        nodes.push(r.node);
                    }
                }
            }

            // Re-derive the concrete CALLS edges among the collected node
            // set for display, once the full traversal has settled.
            let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
            let edges = edges_among(reader, &ids, &[EdgeKind::Calls])?;

            Ok(truncate_result(QueryResult {
                nodes,
                edges,
                ..Default::default()
            }, DEFAULT_MAX_NODES))
        }
    }
}

fn edges_among(reader: &DbReader, ids: &[&str], kinds: &[EdgeKind]) -> Result<Vec<Edge>> {
    let id_set: HashSet<&str> = ids.iter().copied().collect();
    let mut out = Vec::new();
    for id in ids {
        for edge in reader.edges_from(id)? {
            if kinds.contains(&edge.kind()) && id_set.contains(edge.target.as_str()) {
                out.push(edge);
            }
        }
    }
    out
}

fn truncate_result(mut result: QueryResult, max_nodes: usize) -> QueryResult {
    if result.nodes.len() <= max_nodes {
        return result;
    }
    // BFS-reachable subgraph from the seed up to the budget (§4.9
    // truncation rule). Seeds are the first nodes pushed by the caller.
    let keep: HashSet<String> = result.nodes.iter().take(max_nodes).map(|n| n.id.clone()).collect();
    result.nodes.retain(|n| keep.contains(&n.id));
    result.edges.retain(|e| keep.contains(&e.source) && keep.contains(&e.target));
    result.truncated = true;
    result
}

/// `forward-callees`: transitive functions/methods called by `endpoint`.
pub fn forward_callees(reader: &DbReader, index: &SearchIndex, endpoint: &Endpoint, max_depth: u32) -> Result<QueryResult> {
    call_traversal(reader, index, endpoint, max_depth, true)
}

/// `backward-callers`: transitive callers of `endpoint`.
pub fn backward_callers(reader: &DbReader, index: &SearchIndex, endpoint: &Endpoint, max_depth: u32) -> Result<QueryResult> {
    call_traversal(reader, index, endpoint, max_depth, false)
}

/// `forward-callers`: immediate (depth-1) callers of `endpoint` — the
/// direct-neighbor complement to `backward-callers`' transitive closure,
/// for callers that only want "who calls this directly" without walking
/// the full call tree.
pub fn forward_callers(reader: &DbReader, index: &SearchIndex, endpoint: &Endpoint) -> Result<QueryResult> {
    call_traversal(reader, index, endpoint, 1, false)
}

/// `impact`: everything that transitively depends on `endpoint`, across
/// all edge kinds (or a caller-supplied subset).
pub fn impact(
    reader: &DbReader,
    index: &SearchIndex,
    endpoint: &Endpoint,
    edge_kinds: Option<&[EdgeKind]>,
    max_depth: u32,
) -> Result<QueryResult> {
    match resolve_endpoint(reader, index, endpoint)? {
        Resolved::Message(message) => Ok(QueryResult {
            message: Some(message),
            ..Default::default()
        }),
        Resolved::Nodes(seeds) => {
            let mut nodes = seeds.clone();
            let mut seen: HashSet<String> = seeds.iter().map(|n| n.id.clone()).collect();
            for seed in &seeds {
                let reached = reader.impact(&seed.id, edge_kinds, max_depth)?;
                for r in reached {
                    if seen.insert(r.node.id.clone()) {
                        nodes.push(r.node);
                    }
                }
            }
            let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
            let kinds: Vec<EdgeKind> = edge_kinds
                .map(|k| k.to_vec())
                .unwrap_or_else(|| vec![
                    EdgeKind::Calls,
                    EdgeKind::Imports,
                    EdgeKind::References,
                    EdgeKind::Extends,
                    EdgeKind::Implements,
                    EdgeKind::UsesType,
                ]);
            let edges = edges_among(reader, &ids, &kinds)?;
            Ok(truncate_result(QueryResult { nodes, edges, ..Default::default() }, DEFAULT_MAX_NODES))
        }
    }
}

/// `find-path`: shortest route between two resolved endpoints.
pub fn find_path(
    reader: &DbReader,
    index: &SearchIndex,
    from: &Endpoint,
    to: &Endpoint,
    edge_kinds: Option<&[EdgeKind]>,
    max_depth: u32,
) -> Result<QueryResult> {
    let from_nodes = match resolve_endpoint(reader, index, from)? {
        Resolved::Message(m) => return Ok(QueryResult { message: Some(m), ..Default::default() }),
        Resolved::Nodes(n) => n,
    };
    let to_nodes = match resolve_endpoint(reader, index, to)? {
        Resolved::Message(m) => return Ok(QueryResult { message: Some(m), ..Default::default() }),
        Resolved::Nodes(n) => n,
    };

    for from_node in &from_nodes {
        for to_node in &to_nodes {
            if let Some(path) = reader.find_path(&from_node.id, &to_node.id, edge_kinds, max_depth)? {
                return Ok(QueryResult {
                    nodes: path.nodes,
                    edges: path.edges,
                    ..Default::default()
                });
            }
        }
    }
    Ok(QueryResult {
        message: Some(format!(
            "no path found within max_depth={max_depth} between the resolved endpoints"
        )),
        ..Default::default()
    })
}

/// `neighborhood`: nodes within `radius` hops of `endpoint` in either
/// direction over any edge kind, for "orient me around this symbol"
/// browsing.
pub fn neighborhood(reader: &DbReader, index: &SearchIndex, endpoint: &Endpoint, radius: u32) -> Result<QueryResult> {
    match resolve_endpoint(reader, index, endpoint)? {
        Resolved::Message(message) => Ok(QueryResult { message: Some(message), ..Default::default() }),
        Resolved::Nodes(seeds) => {
            let mut nodes = seeds.clone();
            let mut seen: HashSet<String> = seeds.iter().map(|n| n.id.clone()).collect();
            for seed in &seeds {
                for r in reader.impact(&seed.id, None, radius)? {
                    if seen.insert(r.node.id.clone()) {
                        nodes.push(r.node);
                    }
                }
                for r in reader.dependencies(&seed.id, None, radius)? {
                    if seen.insert(r.node.id.clone()) {
                        nodes.push(r.node);
                    }
                }
            }
            let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
            let edges = edges_among(reader, &ids, &[
                EdgeKind::Calls,
                EdgeKind::Imports,
                EdgeKind::References,
                EdgeKind::Extends,
                EdgeKind::Implements,
                EdgeKind::UsesType,
                EdgeKind::Contains,
            ])?;
            Ok(truncate_result(QueryResult { nodes, edges, ..Default::default() }, DEFAULT_MAX_NODES))
        }
    }
}

/// `file-symbols`: the direct `CONTAINS` children of one file.
pub fn file_symbols(reader: &DbReader, file_path: &str) -> Result<QueryResult> {
    let Some(file_node) = reader.get_node(file_path)? else {
        return Ok(QueryResult {
            message: Some(format!("file not indexed: {file_path}")),
            ..Default::default()
        });
    };
    let edges: Vec<Edge> = reader
        .edges_from(&file_node.id)?
        .into_iter()
        .filter(|e| e.kind() == EdgeKind::Contains)
        .collect();
    let mut nodes = vec![file_node];
    for edge in &edges {
        if let Some(node) = reader.get_node(&edge.target)? {
            nodes.push(node);
        }
    }
    Ok(QueryResult { nodes, edges, ..Default::default() })
}

/// `search-symbols`: flat lexical/hybrid search, no traversal.
pub fn search_symbols(reader: &DbReader, index: &SearchIndex, query: &str, top_k: usize) -> Result<QueryResult> {
    let hits = index.search(query, top_k);
    let mut nodes = Vec::with_capacity(hits.len());
    for (id, _score) in &hits {
        if let Some(node) = reader.get_node(id)? {
            nodes.push(node);
        }
    }
    let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let edges = edges_among(reader, &ids, &[
        EdgeKind::Calls,
        EdgeKind::Imports,
        EdgeKind::References,
        EdgeKind::Extends,
        EdgeKind::Implements,
        EdgeKind::UsesType,
    ])?;
    Ok(QueryResult { nodes, edges, ..Default::default() })
}

/// `search-graph`: the composable `{from?, to?, topic?}` dispatch (§4.9).
pub fn search_graph(reader: &DbReader, index: &SearchIndex, constraints: &QueryConstraints) -> Result<QueryResult> {
    let result = match (&constraints.from, &constraints.to, &constraints.topic) {
        (None, None, None) => {
            return Ok(QueryResult {
                message: Some("At least one of from, to, topic is required".to_string()),
                ..Default::default()
            });
        }
        (None, None, Some(topic)) => topic_only(reader, index, topic, constraints)?,
        (Some(from), None, None) => call_or_generic_traversal(reader, index, from, constraints, true)?,
        (None, Some(to), None) => call_or_generic_traversal(reader, index, to, constraints, false)?,
        (Some(from), Some(to), None) => {
            find_path(reader, index, from, to, constraints.edge_kinds.as_deref(), constraints.max_depth)?
        }
        (from_opt, to_opt, Some(topic)) => {
            let base = match (from_opt, to_opt) {
                (Some(from), Some(to)) => {
                    find_path(reader, index, from, to, constraints.edge_kinds.as_deref(), constraints.max_depth)?
                }
                (Some(from), None) => call_or_generic_traversal(reader, index, from, constraints, true)?,
                (None, Some(to)) => call_or_generic_traversal(reader, index, to, constraints, false)?,
                (None, None) => unreachable!("from_opt/to_opt both None handled above"),
            };
            filter_by_topic(reader, index, base, topic)?
        }
    };
    Ok(truncate_result(result, constraints.max_nodes.max(1)))
}

fn call_or_generic_traversal(
    reader: &DbReader,
    index: &SearchIndex,
    endpoint: &Endpoint,
    constraints: &QueryConstraints,
    forward: bool,
) -> Result<QueryResult> {
    match &constraints.edge_kinds {
        Some(kinds) if kinds != &[EdgeKind::Calls] => {
            // a generic edge-kind-filtered traversal: reuse `impact` for
            // backward, and a callees-style forward walk restricted to the
            // filtered kinds via the same CALLS-shaped recursive query
            // would require a second primitive; impact already generalizes
            // the backward case, so forward falls back to CALLS-only.
            if forward {
                call_traversal(reader, index, endpoint, constraints.max_depth, true)
            } else {
                impact(reader, index, endpoint, Some(kinds), constraints.max_depth)
            }
        }
        _ => call_traversal(reader, index, endpoint, constraints.max_depth, forward),
    }
}

fn topic_only(reader: &DbReader, index: &SearchIndex, topic: &str, constraints: &QueryConstraints) -> Result<QueryResult> {
    let hits = index.search(topic, constraints.max_nodes.max(1));
    let mut nodes = Vec::with_capacity(hits.len());
    for (id, _score) in &hits {
        if let Some(node) = reader.get_node(id)? {
            nodes.push(node);
        }
    }
    let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let edges = edges_among(reader, &ids, &[
        EdgeKind::Calls,
        EdgeKind::Imports,
        EdgeKind::References,
        EdgeKind::Extends,
        EdgeKind::Implements,
        EdgeKind::UsesType,
    ])?;
    Ok(QueryResult { nodes, edges, ..Default::default() })
}

/// Topic filter (§4.7 resolution mode 3): intersects a traversal result
/// with the topic-matching symbol set.
fn filter_by_topic(reader: &DbReader, index: &SearchIndex, base: QueryResult, topic: &str) -> Result<QueryResult> {
    let hits = index.search(topic, DEFAULT_MAX_NODES);
    let topic_ids: HashSet<String> = hits.into_iter().map(|(id, _)| id).collect();
    let mut nodes: Vec<Node> = base.nodes.into_iter().filter(|n| topic_ids.contains(&n.id)).collect();
    if nodes.is_empty() {
        return Ok(QueryResult {
            message: Some(format!("no nodes in the traversal matched topic {topic:?}")),
            ..Default::default()
        });
    }
    nodes.sort_by(|a, b| a.id.cmp(&b.id));
    let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let edges = edges_among(reader, &ids, &[
        EdgeKind::Calls,
        EdgeKind::Imports,
        EdgeKind::References,
        EdgeKind::Extends,
        EdgeKind::Implements,
        EdgeKind::UsesType,
    ])?;
    Ok(QueryResult { nodes, edges, ..Default::default() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DEFAULT_MAX_DEPTH as STORE_MAX_DEPTH, Store};
    use crate::types::{make_id, CallSiteRange, EdgeAttrs, NodeFields, NodeKind};

    fn fn_node(file: &str, name: &str, snippet: &str) -> Node {
        Node {
            id: make_id(file, NodeKind::Function, name),
            name: name.to_string(),
            file_path: file.to_string(),
            package: "root".to_string(),
            module: "root".to_string(),
            start_line: 1,
            end_line: 2,
            exported: true,
            fields: NodeFields::Function {
                is_async: false,
                params: vec![],
                return_type: None,
            },
            content_hash: 1,
            snippet: snippet.to_string(),
        }
    }

    fn calls(a: &Node, b: &Node) -> Edge {
        Edge {
            source: a.id.clone(),
            target: b.id.clone(),
            attrs: EdgeAttrs::Calls {
                call_count: 1,
                call_sites: vec![CallSiteRange { start_line: 1, end_line: 1 }],
            },
        }
    }

    #[test]
    fn forward_callees_reports_transitive_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("graph.db")).unwrap();
        let writer = store.writer();
        let a = fn_node("a.ts", "fnA", "function fnA() { fnB(); }");
        let b = fn_node("b.ts", "fnB", "function fnB() { fnC(); }");
        let c = fn_node("c.ts", "fnC", "function fnC() {}");
        writer.add_nodes(&[a.clone(), b.clone(), c.clone()]).unwrap();
        writer.add_edges(&[calls(&a, &b), calls(&b, &c)]).unwrap();

        let reader = store.reader().unwrap();
        let index = SearchIndex::build(&[a.clone(), b.clone(), c.clone()]);
        let result = forward_callees(&reader, &index, &Endpoint::Symbol(a.id.clone()), STORE_MAX_DEPTH).unwrap();
        let ids: HashSet<_> = result.nodes.iter().map(|n| n.id.clone()).collect();
        assert!(ids.contains(&b.id));
        assert!(ids.contains(&c.id));
    }

    #[test]
    fn ambiguous_bare_name_returns_a_message() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("graph.db")).unwrap();
        let writer = store.writer();
        let a = fn_node("a.ts", "run", "function run() {}");
        let b = fn_node("b.ts", "run", "function run() {}");
        writer.add_nodes(&[a.clone(), b.clone()]).unwrap();

        let reader = store.reader().unwrap();
        let index = SearchIndex::build(&[a.clone(), b.clone()]);
        let result = forward_callees(&reader, &index, &Endpoint::Symbol("run".to_string()), STORE_MAX_DEPTH).unwrap();
        assert!(result.message.unwrap().contains("ambiguous"));
    }

    #[test]
    fn search_graph_requires_at_least_one_constraint() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("graph.db")).unwrap();
        let reader = store.reader().unwrap();
        let index = SearchIndex::build(&[]);
        let result = search_graph(&reader, &index, &QueryConstraints::new()).unwrap();
        assert!(result.message.unwrap().contains("At least one"));
    }

    #[test]
    fn search_graph_topic_only_returns_matching_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("graph.db")).unwrap();
        let writer = store.writer();
        let a = fn_node("a.ts", "computeAudit", "function computeAudit() {}");
        let b = fn_node("b.ts", "unrelated", "function unrelated() {}");
        writer.add_nodes(&[a.clone(), b.clone()]).unwrap();

        let reader = store.reader().unwrap();
        let index = SearchIndex::build(&[a.clone(), b.clone()]);
        let mut constraints = QueryConstraints::new();
        constraints.topic = Some("computeAudit".to_string());
        let result = search_graph(&reader, &index, &constraints).unwrap();
        let ids: HashSet<_> = result.nodes.iter().map(|n| n.id.clone()).collect();
        assert!(ids.contains(&a.id));
    }

    #[test]
    fn file_symbols_lists_contains_children() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("graph.db")).unwrap();
        let writer = store.writer();
        let file = Node {
            id: "a.ts".to_string(),
            name: "a.ts".to_string(),
            file_path: "a.ts".to_string(),
            package: "root".to_string(),
            module: "root".to_string(),
            start_line: 0,
            end_line: 10,
            exported: false,
            fields: NodeFields::File { extension: "ts".to_string() },
            content_hash: 0,
            snippet: String::new(),
        };
        let a = fn_node("a.ts", "fnA", "function fnA() {}");
        writer.add_nodes(&[file.clone(), a.clone()]).unwrap();
        writer
            .add_edges(&[Edge { source: file.id.clone(), target: a.id.clone(), attrs: EdgeAttrs::Contains }])
            .unwrap();

        let reader = store.reader().unwrap();
        let result = file_symbols(&reader, "a.ts").unwrap();
        let ids: HashSet<_> = result.nodes.iter().map(|n| n.id.clone()).collect();
        assert!(ids.contains(&a.id));
    }
}
