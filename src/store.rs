//! The persistent graph store (§4.6): two SQLite tables, `nodes` and
//! `edges`, with upsert writers and recursive-CTE reachability readers.
//!
//! Grounded on `other_examples/b3592890_dwalleck-rivets__crates-tethys-src-db-graph.rs.rs`'s
//! `get_transitive_callers`/`find_call_path`/`get_transitive_dependents`
//! pattern: a `WITH RECURSIVE` CTE accumulating `(id, depth)` pairs, joined
//! back against the node table so dangling edges never surface in results,
//! generalized here from that file's symbol-specific/file-specific tables
//! into the single generic `edges(kind)` table this data model uses. Uses
//! `rusqlite` with the `bundled` feature, matching the teacher's choice of
//! an embedded relational store over a second storage technology.

use crate::error::{OmniError, Result};
use crate::types::{CallSiteRange, Edge, EdgeAttrs, EdgeKind, Node, NodeFields, NodeKind};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

/// Default bound on recursive traversal depth (§4.6).
pub const DEFAULT_MAX_DEPTH: u32 = 100;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    name TEXT NOT NULL,
    file_path TEXT NOT NULL,
    package TEXT NOT NULL,
    module TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    exported INTEGER NOT NULL,
    extra_json TEXT NOT NULL,
    content_hash INTEGER NOT NULL,
    snippet TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_nodes_file_path ON nodes(file_path);
CREATE INDEX IF NOT EXISTS idx_nodes_name ON nodes(name);
CREATE INDEX IF NOT EXISTS idx_nodes_kind_name ON nodes(kind, name);

CREATE TABLE IF NOT EXISTS edges (
    source TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    target TEXT NOT NULL,
    kind TEXT NOT NULL,
    discriminator TEXT NOT NULL DEFAULT '',
    attrs_json TEXT NOT NULL,
    UNIQUE(source, target, kind, discriminator)
);
CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source);
CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target);
CREATE INDEX IF NOT EXISTS idx_edges_kind ON edges(kind);
"#;

/// One row of `nodes`, reconstructed from storage.
#[derive(Debug, Clone)]
pub struct StoredNode {
    pub node: Node,
}

fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

/// Opens (creating if absent) the graph store at `path`, returning the
/// serialized writer and a handle factory for read-only connections.
pub struct Store {
    path: std::path::PathBuf,
    writer: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = open_connection(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn writer(&self) -> DbWriter {
        DbWriter {
            conn: self.writer.clone(),
        }
    }

    /// Opens a fresh read-only-in-practice connection for concurrent
    /// traversal queries (§4.6: "the reader half may open additional
    /// read-only connections ... once a batch is committed").
    pub fn reader(&self) -> Result<DbReader> {
        let conn = open_connection(&self.path)?;
        Ok(DbReader { conn })
    }
}

/// Serializes all mutating calls behind a single connection lock, per the
/// single-writer discipline in §5.
#[derive(Clone)]
pub struct DbWriter {
    conn: Arc<Mutex<Connection>>,
}

fn node_extra_json(fields: &NodeFields) -> Result<String> {
    serde_json::to_string(fields).map_err(|e| OmniError::Storage(rusqlite::Error::ToSqlConversionFailure(Box::new(e))))
}

fn edge_attrs_json(attrs: &EdgeAttrs) -> Result<String> {
    serde_json::to_string(attrs).map_err(|e| OmniError::Storage(rusqlite::Error::ToSqlConversionFailure(Box::new(e))))
}

impl DbWriter {
    /// Upserts a batch of nodes, replacing extra fields on conflict (§4.6).
    pub fn add_nodes(&self, nodes: &[Node]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO nodes (id, kind, name, file_path, package, module, start_line, end_line, exported, extra_json, content_hash, snippet)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(id) DO UPDATE SET
                     kind = excluded.kind,
                     name = excluded.name,
                     file_path = excluded.file_path,
                     package = excluded.package,
                     module = excluded.module,
                     start_line = excluded.start_line,
                     end_line = excluded.end_line,
                     exported = excluded.exported,
                     extra_json = excluded.extra_json,
                     content_hash = excluded.content_hash,
                     snippet = excluded.snippet",
            )?;
            for node in nodes {
                let extra = node_extra_json(&node.fields)?;
                stmt.execute(params![
                    node.id,
                    node.kind().as_str(),
                    node.name,
                    node.file_path,
                    node.package,
                    node.module,
                    node.start_line,
                    node.end_line,
                    node.exported as i64,
                    extra,
                    node.content_hash as i64,
                    node.snippet,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Upserts a batch of edges on the unique `(source, target, kind,
    /// discriminator)` tuple; re-indexing a file re-supplies `attrs_json`.
    pub fn add_edges(&self, edges: &[Edge]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO edges (source, target, kind, discriminator, attrs_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(source, target, kind, discriminator) DO UPDATE SET
                     attrs_json = excluded.attrs_json",
            )?;
            for edge in edges {
                let disc = edge.attrs.discriminator();
                let attrs = edge_attrs_json(&edge.attrs)?;
                stmt.execute(params![
                    edge.source,
                    edge.target,
                    edge.kind().as_str(),
                    disc,
                    attrs,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Deletes all nodes whose `file_path = path`; cascades to their
    /// outgoing edges via `ON DELETE CASCADE`.
    pub fn remove_file_nodes(&self, path: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM nodes WHERE file_path = ?1", params![path])?;
        Ok(())
    }

    pub fn clear_all(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM edges", [])?;
        conn.execute("DELETE FROM nodes", [])?;
        Ok(())
    }
}

/// One hop of a reachability result: the node reached, its depth from the
/// seed, and (for impact queries) the edge kind taken at that depth.
#[derive(Debug, Clone)]
pub struct ReachedNode {
    pub node: Node,
    pub depth: u32,
    pub entry_edge_kind: Option<EdgeKind>,
}

/// A resolved directed path: the node sequence and the edge sequence that
/// connects them, in order.
#[derive(Debug, Clone)]
pub struct PathResult {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

pub struct DbReader {
    conn: Connection,
}

fn row_to_node(row: &rusqlite::Row) -> rusqlite::Result<Node> {
    let kind_str: String = row.get("kind")?;
    let extra_json: String = row.get("extra_json")?;
    let fields: NodeFields = serde_json::from_str(&extra_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    debug_assert_eq!(NodeKind::parse(&kind_str), Some(fields.kind()));
    let exported: i64 = row.get("exported")?;
    let content_hash: i64 = row.get("content_hash")?;
    Ok(Node {
        id: row.get("id")?,
        name: row.get("name")?,
        file_path: row.get("file_path")?,
        package: row.get("package")?,
        module: row.get("module")?,
        start_line: row.get("start_line")?,
        end_line: row.get("end_line")?,
        exported: exported != 0,
        fields,
        content_hash: content_hash as u64,
        snippet: row.get("snippet")?,
    })
}

fn row_to_edge(source: String, target: String, kind_str: &str, attrs_json: &str) -> Result<Edge> {
    let attrs: EdgeAttrs = serde_json::from_str(attrs_json)
        .map_err(|e| OmniError::Storage(rusqlite::Error::ToSqlConversionFailure(Box::new(e))))?;
    debug_assert_eq!(EdgeKind::parse(kind_str), Some(attrs.kind()));
    Ok(Edge {
        source,
        target,
        attrs,
    })
}

impl DbReader {
    pub fn get_node(&self, id: &str) -> Result<Option<Node>> {
        let mut stmt = self.conn.prepare("SELECT * FROM nodes WHERE id = ?1")?;
        let node = stmt
            .query_row(params![id], row_to_node)
            .optional()?;
        Ok(node)
    }

    /// Exact-name lookup within one file, used for `<name>` shorthand
    /// symbol resolution (§4.9 endpoint resolution step 1).
    pub fn find_by_name_in_file(&self, file_path: &str, name: &str) -> Result<Vec<Node>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM nodes WHERE file_path = ?1 AND name = ?2 ORDER BY id")?;
        let rows = stmt
            .query_map(params![file_path, name], row_to_node)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Exact-name lookup across the whole store, used when resolving a
    /// bare symbol name with no file qualifier.
    pub fn find_by_name(&self, name: &str) -> Result<Vec<Node>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM nodes WHERE name = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map(params![name], row_to_node)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn all_nodes(&self) -> Result<Vec<Node>> {
        let mut stmt = self.conn.prepare("SELECT * FROM nodes ORDER BY id")?;
        let rows = stmt
            .query_map([], row_to_node)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn edges_from(&self, source: &str) -> Result<Vec<Edge>> {
        let mut stmt = self
            .conn
            .prepare("SELECT source, target, kind, attrs_json FROM edges WHERE source = ?1")?;
        let rows = stmt.query_map(params![source], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (s, t, k, a) = row?;
            out.push(row_to_edge(s, t, &k, &a)?);
        }
        Ok(out)
    }

    /// Forward traversal (callees): follow `CALLS` edges from `source_id`,
    /// returning distinct reachable nodes joined against `nodes`.
    pub fn forward_callees(&self, source_id: &str, max_depth: u32) -> Result<Vec<ReachedNode>> {
        self.recursive_single_kind(source_id, EdgeKind::Calls, max_depth, Direction::Forward)
    }

    /// Backward traversal (callers): same, reversed.
    pub fn backward_callers(&self, target_id: &str, max_depth: u32) -> Result<Vec<ReachedNode>> {
        self.recursive_single_kind(target_id, EdgeKind::Calls, max_depth, Direction::Backward)
    }

    fn recursive_single_kind(
        &self,
        seed_id: &str,
        kind: EdgeKind,
        max_depth: u32,
        direction: Direction,
    ) -> Result<Vec<ReachedNode>> {
        let (from_col, to_col) = match direction {
            Direction::Forward => ("source", "target"),
            Direction::Backward => ("target", "source"),
        };
        let sql = format!(
            "WITH RECURSIVE walk(id, depth) AS (
                SELECT ?1, 0
                UNION
                SELECT e.{to_col}, w.depth + 1
                FROM walk w
                JOIN edges e ON e.{from_col} = w.id AND e.kind = ?2
                WHERE w.depth < ?3
             )
             SELECT n.*, MIN(w.depth) AS min_depth
             FROM walk w
             JOIN nodes n ON n.id = w.id
             WHERE w.depth > 0
             GROUP BY n.id
             ORDER BY min_depth, n.file_path, n.name"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![seed_id, kind.as_str(), max_depth], |row| {
            let node = row_to_node(row)?;
            let depth: i64 = row.get("min_depth")?;
            Ok((node, depth as u32))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (node, depth) = row?;
            out.push(ReachedNode {
                node,
                depth,
                entry_edge_kind: Some(kind),
            });
        }
        Ok(out)
    }

    /// Impact: starting from `target_id`, follow incoming edges of any kind
    /// (or the given filtered subset), tracking `MIN(depth)` and the edge
    /// kind taken at that minimum depth.
    pub fn impact(
        &self,
        target_id: &str,
        edge_kinds: Option<&[EdgeKind]>,
        max_depth: u32,
    ) -> Result<Vec<ReachedNode>> {
        let kind_filter = match edge_kinds {
            Some(kinds) if !kinds.is_empty() => {
                let list = kinds
                    .iter()
                    .map(|k| format!("'{}'", k.as_str()))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("AND e.kind IN ({list})")
            }
            _ => String::new(),
        };
        let sql = format!(
            "WITH RECURSIVE walk(id, depth, entry_kind) AS (
                SELECT ?1, 0, NULL
                UNION
                SELECT e.source, w.depth + 1, e.kind
                FROM walk w
                JOIN edges e ON e.target = w.id {kind_filter}
                WHERE w.depth < ?2
             )
             SELECT n.*, MIN(w.depth) AS min_depth,
                    (SELECT w2.entry_kind FROM walk w2 WHERE w2.id = n.id AND w2.depth = MIN(w.depth) LIMIT 1) AS entry_kind
             FROM walk w
             JOIN nodes n ON n.id = w.id
             WHERE w.depth > 0
             GROUP BY n.id
             ORDER BY min_depth, n.file_path, n.name"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![target_id, max_depth], |row| {
            let node = row_to_node(row)?;
            let depth: i64 = row.get("min_depth")?;
            let entry_kind: Option<String> = row.get("entry_kind")?;
            Ok((node, depth as u32, entry_kind))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (node, depth, entry_kind) = row?;
            out.push(ReachedNode {
                node,
                depth,
                entry_edge_kind: entry_kind.and_then(|s| EdgeKind::parse(&s)),
            });
        }
        Ok(out)
    }

    /// Forward analogue of `impact`: starting from `source_id`, follow
    /// outgoing edges of any kind (or the given filtered subset), tracking
    /// `MIN(depth)` and the edge kind taken at that minimum depth. Used by
    /// `neighborhood`'s outgoing leg so it walks IMPORTS/REFERENCES/
    /// EXTENDS/IMPLEMENTS/USES_TYPE alongside CALLS, not just calls.
    pub fn dependencies(
        &self,
        source_id: &str,
        edge_kinds: Option<&[EdgeKind]>,
        max_depth: u32,
    ) -> Result<Vec<ReachedNode>> {
        let kind_filter = match edge_kinds {
            Some(kinds) if !kinds.is_empty() => {
                let list = kinds
                    .iter()
                    .map(|k| format!("'{}'", k.as_str()))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("AND e.kind IN ({list})")
            }
            _ => String::new(),
        };
        let sql = format!(
            "WITH RECURSIVE walk(id, depth, entry_kind) AS (
                SELECT ?1, 0, NULL
                UNION
                SELECT e.target, w.depth + 1, e.kind
                FROM walk w
                JOIN edges e ON e.source = w.id {kind_filter}
                WHERE w.depth < ?2
             )
             SELECT n.*, MIN(w.depth) AS min_depth,
                    (SELECT w2.entry_kind FROM walk w2 WHERE w2.id = n.id AND w2.depth = MIN(w.depth) LIMIT 1) AS entry_kind
             FROM walk w
             JOIN nodes n ON n.id = w.id
             WHERE w.depth > 0
             GROUP BY n.id
             ORDER BY min_depth, n.file_path, n.name"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![source_id, max_depth], |row| {
            let node = row_to_node(row)?;
            let depth: i64 = row.get("min_depth")?;
            let entry_kind: Option<String> = row.get("entry_kind")?;
            Ok((node, depth as u32, entry_kind))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (node, depth, entry_kind) = row?;
            out.push(ReachedNode {
                node,
                depth,
                entry_edge_kind: entry_kind.and_then(|s| EdgeKind::parse(&s)),
            });
        }
        Ok(out)
    }

    /// Shortest directed path from `from_id` to `to_id` over a filtered edge
    /// set, bounded by `max_depth`. Path ids are reconstructed from a
    /// unit-separator-joined string column, avoiding ambiguity with any
    /// character that could legally appear inside a node id (file paths may
    /// contain commas on exotic filesystems; `\u{1f}` never appears in a
    /// UTF-8 source path).
    pub fn find_path(
        &self,
        from_id: &str,
        to_id: &str,
        edge_kinds: Option<&[EdgeKind]>,
        max_depth: u32,
    ) -> Result<Option<PathResult>> {
        const SEP: char = '\u{1f}';
        let kind_filter = match edge_kinds {
            Some(kinds) if !kinds.is_empty() => {
                let list = kinds
                    .iter()
                    .map(|k| format!("'{}'", k.as_str()))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("AND e.kind IN ({list})")
            }
            _ => String::new(),
        };
        let sql = format!(
            "WITH RECURSIVE path_search(id, path, depth) AS (
                SELECT ?1, CAST(?1 AS TEXT), 0
                UNION ALL
                SELECT e.target, path_search.path || ?4 || e.target, path_search.depth + 1
                FROM path_search
                JOIN edges e ON e.source = path_search.id {kind_filter}
                WHERE path_search.depth < ?3
                  AND instr(path_search.path, e.target) = 0
             )
             SELECT path FROM path_search WHERE id = ?2 ORDER BY depth LIMIT 1"
        );
        let sep_str = SEP.to_string();
        let path_str: Option<String> = self
            .conn
            .prepare(&sql)?
            .query_row(params![from_id, to_id, max_depth, sep_str], |row| row.get(0))
            .optional()?;
        let Some(path_str) = path_str else {
            return Ok(None);
        };
        let ids: Vec<&str> = path_str.split(SEP).collect();
        let mut nodes = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.get_node(id)? {
                Some(n) => nodes.push(n),
                None => return Ok(None),
            }
        }
        let mut edges = Vec::with_capacity(ids.len().saturating_sub(1));
        for pair in ids.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let edge = self.find_connecting_edge(a, b, edge_kinds)?;
            if let Some(edge) = edge {
                edges.push(edge);
            }
        }
        Ok(Some(PathResult { nodes, edges }))
    }

    fn find_connecting_edge(
        &self,
        source: &str,
        target: &str,
        edge_kinds: Option<&[EdgeKind]>,
    ) -> Result<Option<Edge>> {
        let kind_filter = match edge_kinds {
            Some(kinds) if !kinds.is_empty() => {
                let list = kinds
                    .iter()
                    .map(|k| format!("'{}'", k.as_str()))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("AND kind IN ({list})")
            }
            _ => String::new(),
        };
        let sql = format!(
            "SELECT source, target, kind, attrs_json FROM edges
             WHERE source = ?1 AND target = ?2 {kind_filter}
             LIMIT 1"
        );
        let row = self
            .conn
            .prepare(&sql)?
            .query_row(params![source, target], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .optional()?;
        match row {
            Some((s, t, k, a)) => Ok(Some(row_to_edge(s, t, &k, &a)?)),
            None => Ok(None),
        }
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}
