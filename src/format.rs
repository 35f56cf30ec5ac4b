//! Result formatters (§4.10): deterministic text and Mermaid rendering of a
//! `QueryResult`, plus adaptive snippet selection.
//!
//! Grounded on the teacher's `incremental.rs` span-preview helpers
//! (`make_preview`/`truncate_to_len`, salvaged here close to verbatim) and
//! generalized from "preview a symbol's source span" into "render a graph
//! result for an LLM to read".

use crate::types::{CallSiteRange, Edge, EdgeKind, Node, NodeKind};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// The shape every formatter renders from (§4.9's `search_graph` return
/// value). Built by the query engine; formatters never mutate it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResult {
    pub edges: Vec<Edge>,
    pub nodes: Vec<Node>,
    pub alias_map: HashMap<String, String>,
    pub metadata_by_node_id: HashMap<String, serde_json::Value>,
    pub max_nodes: Option<usize>,
    pub message: Option<String>,
    pub truncated: bool,
}

/// A call site to center a snippet on, when the result came from a
/// traversal over `CALLS` edges.
#[derive(Debug, Clone, Copy)]
pub struct SnippetSite {
    pub call_site: Option<CallSiteRange>,
}

fn make_preview(text: &str) -> String {
    let single = text.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_to_len(&single, 240)
}

fn truncate_to_len(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Adaptive snippet context-line count for a result of `n` nodes (§4.10).
/// `None` means omit snippets entirely.
pub fn context_lines_for(n: usize) -> Option<usize> {
    match n {
        0 => None,
        1..=5 => Some(10),
        6..=25 => Some((25usize.saturating_sub(n)) / 2),
        26..=35 => Some(0),
        _ => None,
    }
}

/// Renders a node's snippet windowed to `context_lines` around the given
/// line (a call site if known, else the node's own start line), falling
/// back to a `function body:` label when no call site is known.
pub fn render_snippet(node: &Node, site: Option<CallSiteRange>, context_lines: Option<usize>) -> Option<String> {
    let context_lines = context_lines?;
    let (label, center_line) = match site {
        Some(range) => (format!("call at line {}:", range.start_line), range.start_line),
        None => ("function body:".to_string(), node.start_line),
    };

    if node.snippet.is_empty() {
        return Some(label);
    }

    let lines: Vec<&str> = node.snippet.lines().collect();
    if lines.is_empty() {
        return Some(label);
    }

    // `center_line` is a file-absolute line number; map it onto the
    // snippet's own line range, clamping to the span we actually have.
    let offset = center_line.saturating_sub(node.start_line) as usize;
    let offset = offset.min(lines.len().saturating_sub(1));
    let lo = offset.saturating_sub(context_lines);
    let hi = (offset + context_lines + 1).min(lines.len());
    let window = lines[lo..hi].join("\n");
    let preview = make_preview(&window);
    let preview = truncate_to_len(&preview, 2000);
    Some(format!("{label}\n{preview}"))
}

/// `## Graph\n  src/a.ts:Function:fnA --CALLS--> src/b.ts:Function:fnB\n...`
/// followed by `## Nodes\n  …` (§4.10).
pub fn format_graph_text(result: &QueryResult) -> String {
    let mut out = String::new();

    if let Some(message) = &result.message {
        out.push_str(message);
        out.push('\n');
        return out;
    }

    out.push_str("## Graph\n");
    let mut edges: Vec<&Edge> = result.edges.iter().collect();
    edges.sort_by(|a, b| (a.source.as_str(), a.target.as_str(), a.kind().as_str()).cmp(&(
        b.source.as_str(),
        b.target.as_str(),
        b.kind().as_str(),
    )));
    for edge in edges {
        out.push_str(&format!(
            "  {} --{}--> {}\n",
            edge.source,
            edge.kind().as_str(),
            edge.target
        ));
    }

    out.push_str("## Nodes\n");
    let mut nodes: Vec<&Node> = result.nodes.iter().collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));
    for node in nodes {
        out.push_str(&format!("  {} ({})\n", node.id, node.kind()));
    }

    if result.truncated {
        out.push_str("## Truncated\n  result exceeded max_nodes; showing a BFS-reachable subgraph from the seed nodes\n");
    }

    out
}

fn sanitize_mermaid_id(raw: &str, seen: &mut HashMap<String, u32>) -> String {
    let mut sanitized: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if sanitized.is_empty() || sanitized.chars().next().unwrap().is_ascii_digit() {
        sanitized = format!("n_{sanitized}");
    }
    let counter = seen.entry(sanitized.clone()).or_insert(0);
    let id = if *counter == 0 {
        sanitized.clone()
    } else {
        format!("{sanitized}_{counter}")
    };
    *counter += 1;
    id
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn display_name(node: &Node) -> String {
    let escaped = html_escape(&node.name);
    match node.kind() {
        NodeKind::Function | NodeKind::Method => format!("{escaped}()"),
        _ => escaped,
    }
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }
    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

/// Groups a result's nodes/edges into weakly-connected components, each
/// rendered as its own Mermaid diagram (§4.10).
fn connected_components(result: &QueryResult) -> Vec<(Vec<&Node>, Vec<&Edge>)> {
    let mut index_of: HashMap<&str, usize> = HashMap::new();
    for (i, node) in result.nodes.iter().enumerate() {
        index_of.insert(node.id.as_str(), i);
    }
    let mut uf = UnionFind::new(result.nodes.len());
    for edge in &result.edges {
        if let (Some(&a), Some(&b)) = (index_of.get(edge.source.as_str()), index_of.get(edge.target.as_str())) {
            uf.union(a, b);
        }
    }

    let mut groups: BTreeMap<usize, (Vec<&Node>, Vec<&Edge>)> = BTreeMap::new();
    for (i, node) in result.nodes.iter().enumerate() {
        let root = uf.find(i);
        groups.entry(root).or_default().0.push(node);
    }
    for edge in &result.edges {
        if let (Some(&a), Some(_)) = (index_of.get(edge.source.as_str()), index_of.get(edge.target.as_str())) {
            let root = uf.find(a);
            if let Some(group) = groups.get_mut(&root) {
                group.1.push(edge);
            }
        }
    }
    groups.into_values().collect()
}

/// Renders one `QueryResult` as one or more Mermaid `graph LR` diagrams,
/// one per connected component (§4.10).
pub fn format_mermaid(result: &QueryResult) -> String {
    if let Some(message) = &result.message {
        return message.clone();
    }

    let multi_package = result
        .nodes
        .iter()
        .map(|n| n.package.as_str())
        .collect::<HashSet<_>>()
        .len()
        > 1;

    let mut diagrams = Vec::new();
    for (nodes, edges) in connected_components(result) {
        diagrams.push(render_component(&nodes, &edges, multi_package));
    }
    diagrams.join("\n\n")
}

fn render_component(nodes: &[&Node], edges: &[&Edge], multi_package: bool) -> String {
    let mut seen_ids = HashMap::new();
    let mut id_for: HashMap<&str, String> = HashMap::new();
    for node in nodes {
        id_for.insert(node.id.as_str(), sanitize_mermaid_id(&node.id, &mut seen_ids));
    }

    let mut grouped: BTreeMap<&str, Vec<&Node>> = BTreeMap::new();
    for node in nodes {
        let key = if multi_package {
            node.package.as_str()
        } else {
            node.file_path.as_str()
        };
        grouped.entry(key).or_default().push(node);
    }

    let mut out = String::from("graph LR\n");
    for (group_key, members) in &grouped {
        if members.len() >= 2 {
            out.push_str(&format!("  subgraph {}\n", sanitize_mermaid_id(group_key, &mut seen_ids)));
            for node in members {
                out.push_str(&format!(
                    "    {}[\"{}\"]\n",
                    id_for[node.id.as_str()],
                    display_name(node)
                ));
            }
            out.push_str("  end\n");
        } else {
            for node in members {
                out.push_str(&format!(
                    "  {}[\"{}\"]\n",
                    id_for[node.id.as_str()],
                    display_name(node)
                ));
            }
        }
    }

    for edge in edges {
        let (Some(source), Some(target)) = (id_for.get(edge.source.as_str()), id_for.get(edge.target.as_str())) else {
            continue;
        };
        out.push_str(&format!("  {} -->|{}| {}\n", source, edge.kind().as_str(), target));
    }

    out
}

/// `true` when `kind` participates in the graph-traversal edge set used by
/// callers/callees/path/impact queries (as opposed to `CONTAINS`, which is
/// structural and not a traversal edge for those operations).
pub fn is_traversal_edge(kind: EdgeKind) -> bool {
    !matches!(kind, EdgeKind::Contains)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{make_id, EdgeAttrs, NodeFields};

    fn fn_node(file: &str, name: &str) -> Node {
        Node {
            id: make_id(file, NodeKind::Function, name),
            name: name.to_string(),
            file_path: file.to_string(),
            package: "root".to_string(),
            module: "root".to_string(),
            start_line: 1,
            end_line: 3,
            exported: true,
            fields: NodeFields::Function {
                is_async: false,
                params: vec![],
                return_type: None,
            },
            content_hash: 0,
            snippet: "function foo() {\n  bar();\n}".to_string(),
        }
    }

    #[test]
    fn context_lines_follow_the_size_table() {
        assert_eq!(context_lines_for(0), None);
        assert_eq!(context_lines_for(3), Some(10));
        assert_eq!(context_lines_for(20), Some(2));
        assert_eq!(context_lines_for(30), Some(0));
        assert_eq!(context_lines_for(40), None);
    }

    #[test]
    fn graph_text_lists_edges_then_nodes() {
        let a = fn_node("a.ts", "fnA");
        let b = fn_node("b.ts", "fnB");
        let edge = Edge {
            source: a.id.clone(),
            target: b.id.clone(),
            attrs: EdgeAttrs::Calls {
                call_count: 1,
                call_sites: vec![],
            },
        };
        let result = QueryResult {
            nodes: vec![a, b],
            edges: vec![edge],
            ..Default::default()
        };
        let text = format_graph_text(&result);
        assert!(text.contains("## Graph"));
        assert!(text.contains("--CALLS-->"));
        assert!(text.contains("## Nodes"));
    }

    #[test]
    fn mermaid_escapes_angle_brackets_and_adds_call_parens() {
        let mut node = fn_node("a.ts", "fn<T>");
        node.name = "fn<T>".to_string();
        let result = QueryResult {
            nodes: vec![node],
            ..Default::default()
        };
        let diagram = format_mermaid(&result);
        assert!(diagram.contains("&lt;T&gt;"));
        assert!(diagram.contains("()"));
    }

    #[test]
    fn disjoint_components_render_as_separate_diagrams() {
        let a = fn_node("a.ts", "fnA");
        let b = fn_node("b.ts", "fnB");
        let result = QueryResult {
            nodes: vec![a, b],
            edges: vec![],
            ..Default::default()
        };
        let diagram = format_mermaid(&result);
        assert_eq!(diagram.matches("graph LR").count(), 2);
    }
}
