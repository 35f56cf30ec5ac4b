//! Semantic embedding layer (§4.9's semantic-search stage, §6's
//! `<cacheDir>/embeddings/<model>.db` cache).
//!
//! Two pieces: a content-hash-keyed embedding cache (multi-reader/
//! single-writer, upsert semantics per §5) and a node-id-keyed HNSW index
//! for approximate nearest neighbor search. Grounded on the teacher's own
//! `semantic/mod.rs` (the `instant_distance::{Builder, HnswMap, Point,
//! Search}` wrapper and lazy-rebuild-on-search strategy), generalized from
//! a symbol-interner key to the crate's node id and split embedding
//! generation out behind a trait so the query engine doesn't depend on
//! `fastembed` directly.

use crate::error::{OmniError, Result};
use crate::types::Node;
use dashmap::DashMap;
use instant_distance::{Builder, HnswMap, Point, Search};
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Embedding(Vec<f32>);

impl Point for Embedding {
    fn distance(&self, other: &Self) -> f32 {
        let dot: f32 = self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum();
        let norm_a: f32 = self.0.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = other.0.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 1.0;
        }
        1.0 - (dot / (norm_a * norm_b))
    }
}

/// Behavioral boundary over embedding generation, so callers can swap in a
/// deterministic stub under test without downloading a model.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
    /// A short name identifying the model, used as the embeddings db's file
    /// stem (`<cacheDir>/embeddings/<model>.db`).
    fn model_name(&self) -> &str;
}

#[cfg(feature = "semantic")]
pub struct FastEmbedProvider {
    model: fastembed::TextEmbedding,
}

#[cfg(feature = "semantic")]
impl FastEmbedProvider {
    pub fn new() -> anyhow::Result<Self> {
        use fastembed::{EmbeddingModel, InitOptions};
        let model = fastembed::TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false),
        )?;
        Ok(Self { model })
    }
}

#[cfg(feature = "semantic")]
impl EmbeddingProvider for FastEmbedProvider {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let embeddings = self.model.embed(vec![text.to_string()], None)?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("no embeddings generated"))
    }

    fn model_name(&self) -> &str {
        "all-minilm-l6-v2"
    }
}

const CACHE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS embedding_cache (
    content_hash TEXT PRIMARY KEY,
    vector BLOB NOT NULL
);
";

/// Content-hash-keyed vector cache backed by SQLite (§6). Upserts are
/// idempotent; multiple readers may run concurrently with the single
/// writer (§5).
pub struct EmbeddingCache {
    conn: Mutex<Connection>,
}

impl EmbeddingCache {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(CACHE_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn get(&self, content_hash: u64) -> Result<Option<Vec<f32>>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT vector FROM embedding_cache WHERE content_hash = ?1")?;
        let key = content_hash.to_string();
        let row: Option<Vec<u8>> = stmt
            .query_row(params![key], |row| row.get(0))
            .ok();
        Ok(row.map(|bytes| decode_vector(&bytes)))
    }

    pub fn put(&self, content_hash: u64, vector: &[f32]) -> Result<()> {
        let conn = self.conn.lock();
        let key = content_hash.to_string();
        let bytes = encode_vector(vector);
        conn.execute(
            "INSERT INTO embedding_cache (content_hash, vector) VALUES (?1, ?2)
             ON CONFLICT(content_hash) DO UPDATE SET vector = excluded.vector",
            params![key, bytes],
        )?;
        Ok(())
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Node-id-keyed HNSW semantic index. Embeddings are generated through an
/// `EmbeddingProvider` and, when a cache is attached, served from the
/// content-hash cache before falling back to the provider.
pub struct SemanticIndex {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Option<Arc<EmbeddingCache>>,
    hnsw: RwLock<Option<HnswMap<Embedding, String>>>,
    embeddings: DashMap<String, Embedding>,
}

impl SemanticIndex {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            cache: None,
            hnsw: RwLock::new(None),
            embeddings: DashMap::new(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn embed_text(&self, content_hash: Option<u64>, text: &str) -> Result<Vec<f32>> {
        if let (Some(cache), Some(hash)) = (&self.cache, content_hash) {
            if let Some(cached) = cache.get(hash)? {
                return Ok(cached);
            }
        }
        let vector = self
            .provider
            .embed(text)
            .map_err(|e| OmniError::Search(e.to_string()))?;
        if let (Some(cache), Some(hash)) = (&self.cache, content_hash) {
            cache.put(hash, &vector)?;
        }
        Ok(vector)
    }

    fn rebuild_index(&self) {
        let entries: Vec<(Embedding, String)> = self
            .embeddings
            .iter()
            .map(|entry| (entry.value().clone(), entry.key().clone()))
            .collect();

        if entries.is_empty() {
            *self.hnsw.write() = None;
            return;
        }

        let values: Vec<_> = entries.iter().map(|(emb, _)| emb.clone()).collect();
        let ids: Vec<_> = entries.iter().map(|(_, id)| id.clone()).collect();
        let hnsw = Builder::default().build(values, ids);
        *self.hnsw.write() = Some(hnsw);
    }

    /// Embeds `text` (content-hash cached, when a cache is attached) and
    /// indexes it under `node_id`.
    pub fn add_node(&self, node_id: impl Into<String>, content_hash: u64, text: &str) -> Result<()> {
        let vector = self.embed_text(Some(content_hash), text)?;
        self.embeddings.insert(node_id.into(), Embedding(vector));
        *self.hnsw.write() = None;
        Ok(())
    }

    pub fn remove_node(&self, node_id: &str) {
        self.embeddings.remove(node_id);
        *self.hnsw.write() = None;
    }

    /// Searches for the `k` nearest node ids to `query`, by cosine
    /// similarity (not cached, since free-text queries rarely repeat
    /// verbatim).
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<(String, f32)>> {
        {
            let guard = self.hnsw.read();
            if guard.is_none() && !self.embeddings.is_empty() {
                drop(guard);
                self.rebuild_index();
            }
        }

        let guard = self.hnsw.read();
        let Some(hnsw) = guard.as_ref() else {
            return Ok(Vec::new());
        };

        let query_vector = self.embed_text(None, query)?;
        let query_emb = Embedding(query_vector);

        let mut search = Search::default();
        let neighbors = hnsw.search(&query_emb, &mut search);
        Ok(neighbors
            .take(k)
            .map(|item| (item.value.clone(), 1.0 - item.distance))
            .collect())
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Builds the text a node is embedded from: name, kind, file context, and
/// a preview of its snippet (§4.9). Grounded on the teacher's own
/// `build_embedding_text`, generalized from Rust-specific signature
/// rendering to the crate's kind-tagged `NodeFields`.
pub fn build_embedding_text(node: &Node) -> String {
    let mut parts = Vec::new();
    parts.push(format!("Symbol: {}", node.name));
    parts.push(format!("Kind: {}", node.kind()));
    parts.push(format!("File: {}", node.file_path));

    match &node.fields {
        crate::types::NodeFields::Function {
            is_async,
            params,
            return_type,
        } => {
            let mut sig = Vec::new();
            if *is_async {
                sig.push("async".to_string());
            }
            sig.push(format!(
                "fn {}({})",
                node.name,
                params
                    .iter()
                    .map(|p| p.name.clone())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
            if let Some(ret) = return_type {
                sig.push(format!("-> {ret}"));
            }
            parts.push(format!("Signature: {}", sig.join(" ")));
        }
        crate::types::NodeFields::Method { owner, params, return_type, .. } => {
            parts.push(format!("Owner: {owner}"));
            let mut sig = vec![format!(
                "{}({})",
                node.name,
                params.iter().map(|p| p.name.clone()).collect::<Vec<_>>().join(", ")
            )];
            if let Some(ret) = return_type {
                sig.push(format!("-> {ret}"));
            }
            parts.push(format!("Signature: {}", sig.join(" ")));
        }
        crate::types::NodeFields::Class { extends, implements } => {
            if let Some(base) = extends {
                parts.push(format!("Extends: {base}"));
            }
            if !implements.is_empty() {
                parts.push(format!("Implements: {}", implements.join(", ")));
            }
        }
        _ => {}
    }

    if !node.snippet.is_empty() {
        let preview: String = node.snippet.chars().take(400).collect();
        parts.push(format!("Body: {preview}"));
    }

    parts.join("\n")
}
