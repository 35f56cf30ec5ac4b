//! MCP server entry point: exposes the graph index's nine tools to AI
//! agents over stdio.

use anyhow::Result;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    let workspace_root = std::env::var("OMNI_WORKSPACE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    omni_graph::mcp::run_server(workspace_root).await
}
