//! The on-disk cache directory: manifest, graph store, and embedding cache
//! paths, plus the incremental-sync manifest format.
//!
//! Grounded on the teacher's `cache.rs` (`CACHE_DIR`, `ensure_cache_dir`,
//! manifest load/save), extended with a content hash per file fingerprint so
//! the embedding cache and content-addressed snippet hashing have a stable
//! key independent of mtime.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const CACHE_DIR: &str = ".omni";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const GRAPH_DB_FILE: &str = "graph.db";
pub const EMBEDDINGS_DIR: &str = "embeddings";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileFingerprint {
    pub mtime_ms: u64,
    pub size_bytes: u64,
    pub hash: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IndexManifest {
    pub version: u32,
    pub files: HashMap<String, FileFingerprint>,
}

pub fn cache_dir(root: &Path) -> PathBuf {
    root.join(CACHE_DIR)
}

pub fn ensure_cache_dir(root: &Path) -> Result<PathBuf> {
    let dir = cache_dir(root);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create cache dir: {}", dir.display()))?;
    Ok(dir)
}

pub fn manifest_path(root: &Path) -> PathBuf {
    cache_dir(root).join(MANIFEST_FILE)
}

pub fn graph_db_path(root: &Path) -> PathBuf {
    cache_dir(root).join(GRAPH_DB_FILE)
}

pub fn embeddings_db_path(root: &Path, model_name: &str) -> PathBuf {
    cache_dir(root)
        .join(EMBEDDINGS_DIR)
        .join(format!("{model_name}.db"))
}

pub fn load_manifest(root: &Path) -> Result<Option<IndexManifest>> {
    let path = manifest_path(root);
    if !path.exists() {
        return Ok(None);
    }
    let data =
        fs::read(&path).with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    let manifest: IndexManifest = serde_json::from_slice(&data)
        .with_context(|| format!("Failed to parse manifest: {}", path.display()))?;
    Ok(Some(manifest))
}

pub fn save_manifest(root: &Path, manifest: &IndexManifest) -> Result<()> {
    ensure_cache_dir(root)?;
    let path = manifest_path(root);
    let data = serde_json::to_vec_pretty(manifest)?;
    fs::write(&path, data)
        .with_context(|| format!("Failed to write manifest: {}", path.display()))?;
    Ok(())
}

pub fn clear_cache(root: &Path) -> Result<()> {
    let dir = cache_dir(root);
    if dir.exists() {
        fs::remove_dir_all(&dir)
            .with_context(|| format!("Failed to remove cache dir: {}", dir.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = IndexManifest {
            version: 1,
            files: HashMap::new(),
        };
        manifest.files.insert(
            "src/lib.rs".to_string(),
            FileFingerprint {
                mtime_ms: 123,
                size_bytes: 456,
                hash: 789,
            },
        );
        save_manifest(dir.path(), &manifest).unwrap();
        let loaded = load_manifest(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.files.get("src/lib.rs").unwrap().hash, 789);
    }
}
