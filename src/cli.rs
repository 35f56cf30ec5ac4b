//! `omni` command-line entry point: one-shot invocations of the same nine
//! tools the MCP server exposes, plus `index`/`index-all` maintenance
//! commands, rendered as text, Mermaid, or JSON.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use omni_graph::{query, Endpoint, Engine, OmniError, QueryConstraints};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "omni", version, about = "Persistent call-graph index and hybrid search over a codebase")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root to index and query.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Path to omni.toml; defaults to `<root>/omni.toml` if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit machine-readable JSON instead of the human-readable renderer.
    #[arg(long, global = true)]
    json: bool,

    /// Build the semantic embedding index too (slower first run; requires
    /// the `semantic` feature).
    #[arg(long, global = true)]
    semantic: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Mermaid,
}

#[derive(clap::Args, Debug)]
struct EndpointArg {
    /// Exact node id, `file:Name` shorthand, or bare symbol name.
    #[arg(long)]
    symbol: Option<String>,
    /// Free-text query, resolved via hybrid search, when `--symbol` isn't known.
    #[arg(long)]
    query: Option<String>,
}

impl EndpointArg {
    fn required(self, field: &str) -> Result<Endpoint> {
        match (self.symbol, self.query) {
            (Some(s), None) => Ok(Endpoint::Symbol(s)),
            (None, Some(q)) => Ok(Endpoint::Query(q)),
            (None, None) => Err(anyhow!("one of --{field}symbol or --{field}query is required")),
            (Some(_), Some(_)) => Err(anyhow!("provide only one of --{field}symbol or --{field}query")),
        }
    }

    fn optional(self) -> Result<Option<Endpoint>> {
        match (self.symbol, self.query) {
            (Some(s), None) => Ok(Some(Endpoint::Symbol(s))),
            (None, Some(q)) => Ok(Some(Endpoint::Query(q))),
            (None, None) => Ok(None),
            (Some(_), Some(_)) => Err(anyhow!("provide only one of --symbol or --query")),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Re-parse the current package and refresh the persistent graph store.
    Index {
        #[arg(long)]
        force: bool,
    },
    /// Re-parse every package declared in the project config.
    IndexAll {
        #[arg(long)]
        force: bool,
    },
    /// Immediate (depth-1) callers of a symbol.
    ForwardCallers {
        #[command(flatten)]
        endpoint: EndpointArg,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Transitive callers of a symbol.
    BackwardCallers {
        #[command(flatten)]
        endpoint: EndpointArg,
        #[arg(long)]
        max_depth: Option<u32>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Transitive callees of a symbol.
    ForwardCallees {
        #[command(flatten)]
        endpoint: EndpointArg,
        #[arg(long)]
        max_depth: Option<u32>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Everything that transitively depends on a symbol, across edge kinds.
    Impact {
        #[command(flatten)]
        endpoint: EndpointArg,
        /// Restrict to these edge kinds (comma-separated or repeated).
        #[arg(long, value_delimiter = ',')]
        edge_kind: Vec<String>,
        #[arg(long)]
        max_depth: Option<u32>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Shortest route between two symbols.
    FindPath {
        #[arg(long)]
        from_symbol: Option<String>,
        #[arg(long)]
        from_query: Option<String>,
        #[arg(long)]
        to_symbol: Option<String>,
        #[arg(long)]
        to_query: Option<String>,
        #[arg(long, value_delimiter = ',')]
        edge_kind: Vec<String>,
        #[arg(long)]
        max_depth: Option<u32>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Everything within a hop radius of a symbol, in either direction.
    Neighborhood {
        #[command(flatten)]
        endpoint: EndpointArg,
        #[arg(long, default_value_t = 2)]
        radius: u32,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Direct symbols declared in one file.
    FileSymbols {
        file: String,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Composable graph query: from/to symbols and/or a topic.
    SearchGraph {
        #[arg(long)]
        from_symbol: Option<String>,
        #[arg(long)]
        from_query: Option<String>,
        #[arg(long)]
        to_symbol: Option<String>,
        #[arg(long)]
        to_query: Option<String>,
        #[arg(long)]
        topic: Option<String>,
        #[arg(long, value_delimiter = ',')]
        edge_kind: Vec<String>,
        #[arg(long)]
        max_depth: Option<u32>,
        #[arg(long)]
        max_nodes: Option<usize>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Flat hybrid search over symbol names, paths, and bodies.
    SearchSymbols {
        query: String,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

fn parse_edge_kinds(raw: &[String]) -> Result<Option<Vec<omni_graph::EdgeKind>>> {
    if raw.is_empty() {
        return Ok(None);
    }
    let mut kinds = Vec::with_capacity(raw.len());
    for s in raw {
        let kind = omni_graph::EdgeKind::parse(&s.to_uppercase())
            .ok_or_else(|| anyhow!("unknown edge kind: {s}"))?;
        kinds.push(kind);
    }
    Ok(Some(kinds))
}

#[derive(Serialize)]
struct SuccessResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Serialize)]
struct ErrorResponse {
    ok: bool,
    error: String,
}

fn render_ingest_report(report: &omni_graph::IngestReport, json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(&SuccessResponse { ok: true, data: report })?);
    }
    Ok(format!(
        "indexed {} files: {} parsed, {} skipped, {} removed, {} errors",
        report.total_files,
        report.parsed_files,
        report.skipped_files,
        report.removed_files,
        report.errors.len(),
    ))
}

fn render_result(result: &omni_graph::format::QueryResult, format: OutputFormat, json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(&SuccessResponse { ok: true, data: result })?);
    }
    Ok(match format {
        OutputFormat::Text => omni_graph::format::format_graph_text(result),
        OutputFormat::Mermaid => omni_graph::format::format_mermaid(result),
    })
}

fn print_error(e: impl std::fmt::Display, json: bool) {
    if json {
        let body = ErrorResponse {
            ok: false,
            error: e.to_string(),
        };
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_else(|_| e.to_string()));
    } else {
        eprintln!("error: {e}");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let json = cli.json;
    match run(cli).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            print_error(e, json);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<String> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("OMNI_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init()
        .ok();

    let engine = Engine::open(&cli.root, cli.config.as_deref())?;
    let json = cli.json;

    match cli.command {
        Commands::Index { force } => {
            let report = engine.reindex_current_package(force).await?;
            render_ingest_report(&report, json)
        }
        Commands::IndexAll { force } => {
            let report = engine.reindex(force).await?;
            render_ingest_report(&report, json)
        }
        Commands::ForwardCallers { endpoint, format } => {
            let endpoint = endpoint.required("")?;
            let reader = engine.store.reader()?;
            let index = engine.build_search_index(cli.semantic)?;
            let result = query::forward_callers(&reader, &index, &endpoint).map_err(to_anyhow)?;
            render_result(&result, format, json)
        }
        Commands::BackwardCallers {
            endpoint,
            max_depth,
            format,
        } => {
            let endpoint = endpoint.required("")?;
            let reader = engine.store.reader()?;
            let index = engine.build_search_index(cli.semantic)?;
            let max_depth = max_depth.unwrap_or(query::DEFAULT_MAX_DEPTH);
            let result = query::backward_callers(&reader, &index, &endpoint, max_depth).map_err(to_anyhow)?;
            render_result(&result, format, json)
        }
        Commands::ForwardCallees {
            endpoint,
            max_depth,
            format,
        } => {
            let endpoint = endpoint.required("")?;
            let reader = engine.store.reader()?;
            let index = engine.build_search_index(cli.semantic)?;
            let max_depth = max_depth.unwrap_or(query::DEFAULT_MAX_DEPTH);
            let result = query::forward_callees(&reader, &index, &endpoint, max_depth).map_err(to_anyhow)?;
            render_result(&result, format, json)
        }
        Commands::Impact {
            endpoint,
            edge_kind,
            max_depth,
            format,
        } => {
            let endpoint = endpoint.required("")?;
            let edge_kinds = parse_edge_kinds(&edge_kind)?;
            let reader = engine.store.reader()?;
            let index = engine.build_search_index(cli.semantic)?;
            let max_depth = max_depth.unwrap_or(query::DEFAULT_MAX_DEPTH);
            let result =
                query::impact(&reader, &index, &endpoint, edge_kinds.as_deref(), max_depth).map_err(to_anyhow)?;
            render_result(&result, format, json)
        }
        Commands::FindPath {
            from_symbol,
            from_query,
            to_symbol,
            to_query,
            edge_kind,
            max_depth,
            format,
        } => {
            let from = EndpointArg {
                symbol: from_symbol,
                query: from_query,
            }
            .required("from_")?;
            let to = EndpointArg {
                symbol: to_symbol,
                query: to_query,
            }
            .required("to_")?;
            let edge_kinds = parse_edge_kinds(&edge_kind)?;
            let reader = engine.store.reader()?;
            let index = engine.build_search_index(cli.semantic)?;
            let max_depth = max_depth.unwrap_or(query::DEFAULT_MAX_DEPTH);
            let result =
                query::find_path(&reader, &index, &from, &to, edge_kinds.as_deref(), max_depth).map_err(to_anyhow)?;
            render_result(&result, format, json)
        }
        Commands::Neighborhood {
            endpoint,
            radius,
            format,
        } => {
            let endpoint = endpoint.required("")?;
            let reader = engine.store.reader()?;
            let index = engine.build_search_index(cli.semantic)?;
            let result = query::neighborhood(&reader, &index, &endpoint, radius).map_err(to_anyhow)?;
            render_result(&result, format, json)
        }
        Commands::FileSymbols { file, format } => {
            let reader = engine.store.reader()?;
            let result = query::file_symbols(&reader, &file).map_err(to_anyhow)?;
            render_result(&result, format, json)
        }
        Commands::SearchGraph {
            from_symbol,
            from_query,
            to_symbol,
            to_query,
            topic,
            edge_kind,
            max_depth,
            max_nodes,
            format,
        } => {
            let from = EndpointArg {
                symbol: from_symbol,
                query: from_query,
            }
            .optional()?;
            let to = EndpointArg {
                symbol: to_symbol,
                query: to_query,
            }
            .optional()?;
            let edge_kinds = parse_edge_kinds(&edge_kind)?;
            let mut constraints = QueryConstraints::new();
            constraints.from = from;
            constraints.to = to;
            constraints.topic = topic;
            constraints.edge_kinds = edge_kinds;
            if let Some(depth) = max_depth {
                constraints.max_depth = depth;
            }
            if let Some(n) = max_nodes {
                constraints.max_nodes = n;
            }
            let reader = engine.store.reader()?;
            let index = engine.build_search_index(cli.semantic)?;
            let result = query::search_graph(&reader, &index, &constraints).map_err(to_anyhow)?;
            render_result(&result, format, json)
        }
        Commands::SearchSymbols { query: q, top_k, format } => {
            let reader = engine.store.reader()?;
            let index = engine.build_search_index(cli.semantic)?;
            let result = query::search_symbols(&reader, &index, &q, top_k).map_err(to_anyhow)?;
            render_result(&result, format, json)
        }
    }
}

fn to_anyhow(e: OmniError) -> anyhow::Error {
    anyhow::Error::from(e)
}
