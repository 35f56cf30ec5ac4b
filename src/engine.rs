//! Shared setup behind both transports (§6.1): load the project config,
//! open the graph store, run the ingestion pipeline, and build the search
//! index the nine tools read from. The CLI opens one of these per
//! invocation; the MCP server opens one at startup and keeps it alive for
//! the life of the stdio session, rebuilding the index after each reindex.

use crate::cache;
use crate::config::ProjectConfig;
use crate::error::Result;
use crate::ingest::{self, IngestOptions, IngestReport};
use crate::query::SearchIndex;
use crate::store::Store;
use std::path::{Path, PathBuf};

#[cfg(feature = "semantic")]
use crate::semantic::{build_embedding_text, EmbeddingCache, FastEmbedProvider, SemanticIndex};
#[cfg(feature = "semantic")]
use std::sync::Arc;

pub struct Engine {
    pub root: PathBuf,
    pub config: ProjectConfig,
    pub store: Store,
}

impl Engine {
    /// Opens the store at `<root>/.omni/graph.db`, loading `config_path`
    /// (default `<root>/omni.toml`) or falling back to a single-package
    /// config rooted at `root` (§2.1).
    pub fn open(root: &Path, config_path: Option<&Path>) -> Result<Self> {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let config_path = config_path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| root.join("omni.toml"));
        let config = ProjectConfig::load_or_default(&config_path)?;
        let store = Store::open(&cache::graph_db_path(&root))?;
        Ok(Self { root, config, store })
    }

    /// Runs the ingestion pipeline (§4.5) over every package in
    /// `self.config`, updating the manifest and the store in place.
    pub async fn reindex(&self, force: bool) -> Result<IngestReport> {
        let options = IngestOptions {
            force,
            ..IngestOptions::default()
        };
        ingest::run_ingest(&self.config, &self.store, &options).await
    }

    /// Runs the ingestion pipeline over only the package whose root is
    /// `self.root` (the package `omni index` scopes to, as opposed to
    /// `omni index-all`'s every-package sweep).
    pub async fn reindex_current_package(&self, force: bool) -> Result<IngestReport> {
        let options = IngestOptions {
            force,
            ..IngestOptions::default()
        };
        let scoped = self.config.scoped_to_root(&self.root);
        ingest::run_ingest(&scoped, &self.store, &options).await
    }

    /// Builds a fresh search index from the store's current nodes (§4.7).
    /// `with_semantic` requests the embedding stage; it's a no-op (logged,
    /// not an error) when the `semantic` feature wasn't compiled in or the
    /// embedding model fails to load, since lexical search alone still
    /// answers every tool.
    pub fn build_search_index(&self, with_semantic: bool) -> Result<SearchIndex> {
        let reader = self.store.reader()?;
        let nodes = reader.all_nodes()?;
        let mut index = SearchIndex::build(&nodes);

        if with_semantic {
            #[cfg(feature = "semantic")]
            {
                if let Some(semantic) = self.try_build_semantic_index(&nodes) {
                    index = index.with_semantic(semantic);
                }
            }
            #[cfg(not(feature = "semantic"))]
            {
                tracing::warn!("semantic search requested but the `semantic` feature is not compiled in; falling back to keyword search");
            }
        }

        Ok(index)
    }

    #[cfg(feature = "semantic")]
    fn try_build_semantic_index(&self, nodes: &[crate::types::Node]) -> Option<Arc<SemanticIndex>> {
        let provider: Arc<dyn crate::semantic::EmbeddingProvider> = match FastEmbedProvider::new() {
            Ok(p) => Arc::new(p),
            Err(e) => {
                tracing::warn!(error = %e, "semantic embedding model unavailable, falling back to keyword search");
                return None;
            }
        };
        let cache_path = cache::embeddings_db_path(&self.root, provider.model_name());
        let cache = match EmbeddingCache::open(&cache_path) {
            Ok(c) => Arc::new(c),
            Err(e) => {
                tracing::warn!(error = %e, "embedding cache unavailable");
                return None;
            }
        };
        let index = SemanticIndex::new(provider).with_cache(cache);
        for node in nodes {
            let text = build_embedding_text(node);
            if let Err(e) = index.add_node(node.id.clone(), node.content_hash, &text) {
                tracing::warn!(node_id = %node.id, error = %e, "failed to embed node");
            }
        }
        Some(Arc::new(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_reindex_and_search_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "function fnA() {}\n").unwrap();

        let engine = Engine::open(dir.path(), None).unwrap();
        let report = engine.reindex(false).await.unwrap();
        assert_eq!(report.parsed_files, 1);

        let index = engine.build_search_index(false).unwrap();
        let hits = index.search("fnA", 5);
        assert!(hits.iter().any(|(id, _)| id == "a.ts:Function:fnA"));
    }
}
