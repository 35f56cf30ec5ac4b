//! MCP server implementation.
//!
//! Exposes the nine graph/search tools (§6) over the Model Context
//! Protocol's stdio transport, backed by one long-lived `Engine` and a
//! search index kept in memory and rebuilt after each `index` call.

use crate::engine::Engine;
use crate::error::OmniError;
use crate::format::{format_graph_text, format_mermaid, QueryResult};
use crate::query::{self, Endpoint, QueryConstraints, SearchIndex};
use crate::types::EdgeKind;
use anyhow::Result;
use rmcp::handler::server::{router::tool::ToolRouter, tool::Parameters};
use rmcp::model::{ErrorData as McpError, *};
use rmcp::transport::stdio;
use rmcp::{schemars, tool, tool_handler, tool_router, ServerHandler, ServiceExt};
use serde::Deserialize;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const SERVER_NAME: &str = crate::SERVER_NAME;
pub const SERVER_VERSION: &str = crate::SERVER_VERSION;

/// The MCP server handler that implements all tool methods.
#[derive(Clone)]
pub struct OmniServer {
    engine: Arc<Engine>,
    index: Arc<RwLock<SearchIndex>>,
    tool_router: ToolRouter<Self>,
}

impl OmniServer {
    /// Opens `root`, runs an initial index pass, and builds the search
    /// index the tools will serve from until the next `index` call.
    pub async fn new(root: PathBuf) -> Result<Self> {
        let engine = Engine::open(&root, None)?;
        let report = engine.reindex(false).await?;
        tracing::info!(
            parsed = report.parsed_files,
            skipped = report.skipped_files,
            errors = report.errors.len(),
            "initial index complete"
        );
        let index = engine.build_search_index(true)?;
        Ok(Self {
            engine: Arc::new(engine),
            index: Arc::new(RwLock::new(index)),
            tool_router: Self::tool_router(),
        })
    }
}

// ============================================================================
// Tool Argument Types
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct IndexRequest {
    #[schemars(description = "Discard the existing graph and manifest before re-parsing everything")]
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct EndpointRequest {
    #[schemars(description = "Exact node id, `file:Name` shorthand, or bare symbol name")]
    pub symbol: Option<String>,
    #[schemars(description = "Free-text query, resolved via hybrid search, when `symbol` isn't known")]
    pub query: Option<String>,
    #[schemars(description = "Maximum traversal depth (default 100)")]
    pub max_depth: Option<u32>,
    #[schemars(description = "Render as \"text\" (default) or \"mermaid\"")]
    pub format: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ImpactRequest {
    pub symbol: Option<String>,
    pub query: Option<String>,
    #[schemars(description = "Restrict to these edge kinds (CALLS, IMPORTS, REFERENCES, EXTENDS, IMPLEMENTS, USES_TYPE); default is all")]
    pub edge_kinds: Option<Vec<String>>,
    pub max_depth: Option<u32>,
    pub format: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct FindPathRequest {
    pub from_symbol: Option<String>,
    pub from_query: Option<String>,
    pub to_symbol: Option<String>,
    pub to_query: Option<String>,
    pub edge_kinds: Option<Vec<String>>,
    pub max_depth: Option<u32>,
    pub format: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct NeighborhoodRequest {
    pub symbol: Option<String>,
    pub query: Option<String>,
    #[schemars(description = "Hop radius around the symbol (default 2)")]
    pub radius: Option<u32>,
    pub format: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct FileSymbolsRequest {
    #[schemars(description = "Indexed file path, as it appears in node ids")]
    pub file: String,
    pub format: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchGraphRequest {
    pub from_symbol: Option<String>,
    pub from_query: Option<String>,
    pub to_symbol: Option<String>,
    pub to_query: Option<String>,
    #[schemars(description = "Free-text topic to filter or seed the traversal")]
    pub topic: Option<String>,
    pub edge_kinds: Option<Vec<String>>,
    pub max_depth: Option<u32>,
    pub max_nodes: Option<usize>,
    pub format: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchSymbolsRequest {
    pub query: String,
    #[schemars(description = "Number of results to return (default 10)")]
    pub top_k: Option<usize>,
    pub format: Option<String>,
}

// ============================================================================
// Shared helpers
// ============================================================================

fn endpoint_from(symbol: Option<String>, query: Option<String>) -> std::result::Result<Option<Endpoint>, String> {
    match (symbol, query) {
        (Some(s), None) => Ok(Some(Endpoint::Symbol(s))),
        (None, Some(q)) => Ok(Some(Endpoint::Query(q))),
        (None, None) => Ok(None),
        (Some(_), Some(_)) => Err("provide only one of `symbol` or `query`, not both".to_string()),
    }
}

fn required_endpoint(symbol: Option<String>, query: Option<String>, field: &str) -> std::result::Result<Endpoint, String> {
    endpoint_from(symbol, query)?.ok_or_else(|| format!("one of `{field}symbol` or `{field}query` is required"))
}

fn parse_edge_kinds(raw: &Option<Vec<String>>) -> std::result::Result<Option<Vec<EdgeKind>>, String> {
    let Some(raw) = raw else { return Ok(None) };
    if raw.is_empty() {
        return Ok(None);
    }
    let mut kinds = Vec::with_capacity(raw.len());
    for s in raw {
        let kind = EdgeKind::parse(&s.to_uppercase())
            .ok_or_else(|| format!("unknown edge kind: {s}"))?;
        kinds.push(kind);
    }
    Ok(Some(kinds))
}

fn render(result: &QueryResult, format: Option<&str>) -> String {
    match format {
        Some("mermaid") => format_mermaid(result),
        _ => format_graph_text(result),
    }
}

fn ok_result(result: std::result::Result<QueryResult, OmniError>, format: Option<&str>) -> CallToolResult {
    match result {
        Ok(r) => CallToolResult::success(vec![Content::text(render(&r, format))]),
        Err(e) => CallToolResult::error(vec![Content::text(e.to_string())]),
    }
}

fn err_result(message: impl Into<String>) -> CallToolResult {
    CallToolResult::error(vec![Content::text(message.into())])
}

// ============================================================================
// Tool Implementations
// ============================================================================

#[tool_router]
impl OmniServer {
    #[tool(description = "Re-parse the project and refresh the persistent graph store. Call again after the workspace changes on disk.")]
    async fn index(&self, Parameters(req): Parameters<IndexRequest>) -> Result<CallToolResult, McpError> {
        match self.engine.reindex(req.force).await {
            Ok(report) => {
                match self.engine.build_search_index(true) {
                    Ok(fresh) => *self.index.write().await = fresh,
                    Err(e) => tracing::warn!(error = %e, "failed to rebuild search index after reindex"),
                }
                Ok(CallToolResult::success(vec![Content::text(format!(
                    "indexed {} files: {} parsed, {} skipped, {} removed, {} errors",
                    report.total_files,
                    report.parsed_files,
                    report.skipped_files,
                    report.removed_files,
                    report.errors.len(),
                ))]))
            }
            Err(e) => Ok(err_result(e.to_string())),
        }
    }

    #[tool(description = "Immediate (depth-1) callers of a symbol: who directly invokes it.")]
    async fn forward_callers(&self, Parameters(req): Parameters<EndpointRequest>) -> Result<CallToolResult, McpError> {
        let endpoint = match required_endpoint(req.symbol, req.query, "") {
            Ok(e) => e,
            Err(msg) => return Ok(err_result(msg)),
        };
        let reader = match self.engine.store.reader() {
            Ok(r) => r,
            Err(e) => return Ok(err_result(e.to_string())),
        };
        let index = self.index.read().await;
        let result = query::forward_callers(&reader, &index, &endpoint);
        Ok(ok_result(result, req.format.as_deref()))
    }

    #[tool(description = "Transitive callers of a symbol, up to max_depth hops (default 100).")]
    async fn backward_callers(&self, Parameters(req): Parameters<EndpointRequest>) -> Result<CallToolResult, McpError> {
        let endpoint = match required_endpoint(req.symbol, req.query, "") {
            Ok(e) => e,
            Err(msg) => return Ok(err_result(msg)),
        };
        let reader = match self.engine.store.reader() {
            Ok(r) => r,
            Err(e) => return Ok(err_result(e.to_string())),
        };
        let index = self.index.read().await;
        let max_depth = req.max_depth.unwrap_or(query::DEFAULT_MAX_DEPTH);
        let result = query::backward_callers(&reader, &index, &endpoint, max_depth);
        Ok(ok_result(result, req.format.as_deref()))
    }

    #[tool(description = "Transitive callees of a symbol, up to max_depth hops (default 100).")]
    async fn forward_callees(&self, Parameters(req): Parameters<EndpointRequest>) -> Result<CallToolResult, McpError> {
        let endpoint = match required_endpoint(req.symbol, req.query, "") {
            Ok(e) => e,
            Err(msg) => return Ok(err_result(msg)),
        };
        let reader = match self.engine.store.reader() {
            Ok(r) => r,
            Err(e) => return Ok(err_result(e.to_string())),
        };
        let index = self.index.read().await;
        let max_depth = req.max_depth.unwrap_or(query::DEFAULT_MAX_DEPTH);
        let result = query::forward_callees(&reader, &index, &endpoint, max_depth);
        Ok(ok_result(result, req.format.as_deref()))
    }

    #[tool(description = "Everything that transitively depends on a symbol, across all edge kinds (or a filtered subset) — 'what breaks if I change this'.")]
    async fn impact(&self, Parameters(req): Parameters<ImpactRequest>) -> Result<CallToolResult, McpError> {
        let endpoint = match required_endpoint(req.symbol, req.query, "") {
            Ok(e) => e,
            Err(msg) => return Ok(err_result(msg)),
        };
        let edge_kinds = match parse_edge_kinds(&req.edge_kinds) {
            Ok(k) => k,
            Err(msg) => return Ok(err_result(msg)),
        };
        let reader = match self.engine.store.reader() {
            Ok(r) => r,
            Err(e) => return Ok(err_result(e.to_string())),
        };
        let index = self.index.read().await;
        let max_depth = req.max_depth.unwrap_or(query::DEFAULT_MAX_DEPTH);
        let result = query::impact(&reader, &index, &endpoint, edge_kinds.as_deref(), max_depth);
        Ok(ok_result(result, req.format.as_deref()))
    }

    #[tool(description = "Shortest route between two symbols, following edges of the given kinds (or all kinds).")]
    async fn find_path(&self, Parameters(req): Parameters<FindPathRequest>) -> Result<CallToolResult, McpError> {
        let from = match required_endpoint(req.from_symbol, req.from_query, "from_") {
            Ok(e) => e,
            Err(msg) => return Ok(err_result(msg)),
        };
        let to = match required_endpoint(req.to_symbol, req.to_query, "to_") {
            Ok(e) => e,
            Err(msg) => return Ok(err_result(msg)),
        };
        let edge_kinds = match parse_edge_kinds(&req.edge_kinds) {
            Ok(k) => k,
            Err(msg) => return Ok(err_result(msg)),
        };
        let reader = match self.engine.store.reader() {
            Ok(r) => r,
            Err(e) => return Ok(err_result(e.to_string())),
        };
        let index = self.index.read().await;
        let max_depth = req.max_depth.unwrap_or(query::DEFAULT_MAX_DEPTH);
        let result = query::find_path(&reader, &index, &from, &to, edge_kinds.as_deref(), max_depth);
        Ok(ok_result(result, req.format.as_deref()))
    }

    #[tool(description = "Everything within radius hops of a symbol, in either direction over any edge kind — an orientation view.")]
    async fn neighborhood(&self, Parameters(req): Parameters<NeighborhoodRequest>) -> Result<CallToolResult, McpError> {
        let endpoint = match required_endpoint(req.symbol, req.query, "") {
            Ok(e) => e,
            Err(msg) => return Ok(err_result(msg)),
        };
        let reader = match self.engine.store.reader() {
            Ok(r) => r,
            Err(e) => return Ok(err_result(e.to_string())),
        };
        let index = self.index.read().await;
        let radius = req.radius.unwrap_or(2);
        let result = query::neighborhood(&reader, &index, &endpoint, radius);
        Ok(ok_result(result, req.format.as_deref()))
    }

    #[tool(description = "Direct symbols (functions, classes, ...) declared in one file.")]
    async fn file_symbols(&self, Parameters(req): Parameters<FileSymbolsRequest>) -> Result<CallToolResult, McpError> {
        let reader = match self.engine.store.reader() {
            Ok(r) => r,
            Err(e) => return Ok(err_result(e.to_string())),
        };
        let result = query::file_symbols(&reader, &req.file);
        Ok(ok_result(result, req.format.as_deref()))
    }

    #[tool(description = "Composable graph query: supply from/to symbols and/or a topic. At least one is required.")]
    async fn search_graph(&self, Parameters(req): Parameters<SearchGraphRequest>) -> Result<CallToolResult, McpError> {
        let from = match endpoint_from(req.from_symbol, req.from_query) {
            Ok(e) => e,
            Err(msg) => return Ok(err_result(msg)),
        };
        let to = match endpoint_from(req.to_symbol, req.to_query) {
            Ok(e) => e,
            Err(msg) => return Ok(err_result(msg)),
        };
        let edge_kinds = match parse_edge_kinds(&req.edge_kinds) {
            Ok(k) => k,
            Err(msg) => return Ok(err_result(msg)),
        };
        let mut constraints = QueryConstraints::new();
        constraints.from = from;
        constraints.to = to;
        constraints.topic = req.topic;
        constraints.edge_kinds = edge_kinds;
        if let Some(depth) = req.max_depth {
            constraints.max_depth = depth;
        }
        if let Some(max_nodes) = req.max_nodes {
            constraints.max_nodes = max_nodes;
        }

        let reader = match self.engine.store.reader() {
            Ok(r) => r,
            Err(e) => return Ok(err_result(e.to_string())),
        };
        let index = self.index.read().await;
        let result = query::search_graph(&reader, &index, &constraints);
        Ok(ok_result(result, req.format.as_deref()))
    }

    #[tool(description = "Flat hybrid (BM25 + optional semantic) search over symbol names, paths, and bodies. No traversal.")]
    async fn search_symbols(&self, Parameters(req): Parameters<SearchSymbolsRequest>) -> Result<CallToolResult, McpError> {
        let reader = match self.engine.store.reader() {
            Ok(r) => r,
            Err(e) => return Ok(err_result(e.to_string())),
        };
        let index = self.index.read().await;
        let top_k = req.top_k.unwrap_or(10);
        let result = query::search_symbols(&reader, &index, &req.query, top_k);
        Ok(ok_result(result, req.format.as_deref()))
    }
}

// ============================================================================
// MCP Server Handler Implementation
// ============================================================================

#[tool_handler]
impl ServerHandler for OmniServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(format!(
                "{SERVER_NAME} v{SERVER_VERSION} - persistent call-graph index with recursive \
                 reachability queries (callers, callees, impact, path, neighborhood) and hybrid \
                 BM25/semantic symbol search. Call `index` once before the others."
            )),
        }
    }
}

// ============================================================================
// Server Entry Point
// ============================================================================

pub async fn run_server(workspace_root: PathBuf) -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("OMNI_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting {} v{}", SERVER_NAME, SERVER_VERSION);
    tracing::info!("Workspace root: {}", workspace_root.display());

    let server = OmniServer::new(workspace_root).await?;
    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    tracing::info!("Server shutdown");
    Ok(())
}
