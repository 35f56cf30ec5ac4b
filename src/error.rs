//! Typed errors for the core engine.
//!
//! Mirrors the five error kinds laid out for the engine: configuration,
//! resolution, parse/extract, storage, search. Resolution failures are
//! usually turned into a message result rather than propagated (see
//! `crate::query`); the rest propagate as `OmniError` and get wrapped with
//! `anyhow::Context` at the CLI/MCP edge, the same layering `cli.rs` uses
//! for its own `CliError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OmniError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("symbol not found: {0}")]
    NotFound(String),

    #[error("ambiguous symbol {query:?}: {candidates:?}")]
    Ambiguous {
        query: String,
        candidates: Vec<String>,
    },

    #[error("parse error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("search error: {0}")]
    Search(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for collaborator boundaries (manifest I/O, file discovery)
    /// that report through `anyhow` rather than a typed variant of their own.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, OmniError>;
