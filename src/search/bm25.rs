//! BM25 (Okapi) text search index (§4.9's lexical stage).
//!
//! Field-weighted scoring over a node's identifier, file path, and
//! snippet text:
//! - Path tokens (file/module names)
//! - Identifiers (function/class/variable names)
//! - Doc comments (currently unused by the TypeScript/Rust extractors, kept
//!   as a field for forward compatibility with richer doc extraction)
//! - String literals
//! - General code tokens
//!
//! Keyed by node id (the canonical `<filePath>:<Kind>:<symbolPath>` string)
//! rather than an interned symbol, since the graph store's node ids are
//! already the crate's native foreign key.

use std::collections::HashMap;
use std::path::Path;

/// Field types for weighted BM25 scoring.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Field {
    Path,
    Ident,
    Doc,
    StringLit,
    Code,
}

impl Field {
    fn index(self) -> usize {
        match self {
            Field::Path => 0,
            Field::Ident => 1,
            Field::Doc => 2,
            Field::StringLit => 3,
            Field::Code => 4,
        }
    }
}

/// Weights for each field in BM25 scoring.
#[derive(Clone, Debug)]
pub struct FieldWeights {
    pub path: f32,
    pub ident: f32,
    pub doc: f32,
    pub string_lit: f32,
    pub code: f32,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            path: 2.0,       // File paths very important for code search
            ident: 1.8,      // Identifiers highly relevant
            doc: 1.4,        // Doc comments helpful
            string_lit: 1.1, // String literals sometimes useful
            code: 1.0,       // General code baseline
        }
    }
}

/// BM25 parameters.
#[derive(Copy, Clone, Debug)]
pub struct Bm25Params {
    /// Term frequency saturation parameter (typically 1.2-2.0).
    pub k1: f32,
    /// Length normalization parameter (typically 0.75).
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// A posting entry for a term.
#[derive(Clone, Debug)]
struct Posting {
    doc_id: u32,
    tf_by_field: [u32; 5],
}

/// Document statistics.
#[derive(Clone, Debug)]
struct DocStats {
    node_id: String,
    len_by_field: [u32; 5],
    /// Original text for snippet extraction.
    text: String,
}

/// BM25 search index, one document per graph node.
#[derive(Default, Clone, Debug)]
pub struct Bm25Index {
    /// Inverted index: term -> postings list.
    inv: HashMap<String, Vec<Posting>>,
    /// Document statistics.
    docs: Vec<DocStats>,
    /// Average document length per field.
    avg_len_by_field: [f32; 5],
    /// Document frequency per term.
    df: HashMap<String, u32>,
    /// Node id to doc_id mapping.
    node_to_doc: HashMap<String, u32>,
}

/// Search result from BM25.
#[derive(Debug, Clone)]
pub struct Bm25SearchResult {
    pub node_id: String,
    pub score: f32,
    pub doc_id: u32,
}

impl Bm25Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document (one graph node) to the index.
    pub fn add_document(
        &mut self,
        node_id: impl Into<String>,
        path_tokens: impl IntoIterator<Item = impl AsRef<str>>,
        ident_tokens: impl IntoIterator<Item = impl AsRef<str>>,
        doc_tokens: impl IntoIterator<Item = impl AsRef<str>>,
        string_tokens: impl IntoIterator<Item = impl AsRef<str>>,
        code_text: &str,
    ) {
        let node_id = node_id.into();
        let doc_id = self.docs.len() as u32;
        let mut lens = [0u32; 5];

        let mut add = |field: Field, token: &str| {
            if token.is_empty() {
                return;
            }
            let term = token.to_ascii_lowercase();
            let postings = self.inv.entry(term).or_default();

            match postings.last_mut() {
                Some(last) if last.doc_id == doc_id => {
                    last.tf_by_field[field.index()] += 1;
                }
                _ => {
                    let mut tf = [0u32; 5];
                    tf[field.index()] = 1;
                    postings.push(Posting {
                        doc_id,
                        tf_by_field: tf,
                    });
                }
            }
            lens[field.index()] += 1;
        };

        for t in path_tokens {
            add(Field::Path, t.as_ref());
        }
        for t in ident_tokens {
            add(Field::Ident, t.as_ref());
        }
        for t in doc_tokens {
            add(Field::Doc, t.as_ref());
        }
        for t in string_tokens {
            add(Field::StringLit, t.as_ref());
        }
        for t in tokenize(code_text) {
            add(Field::Code, t);
        }

        self.node_to_doc.insert(node_id.clone(), doc_id);
        self.docs.push(DocStats {
            node_id,
            len_by_field: lens,
            text: code_text.to_string(),
        });
    }

    /// Finalize the index (compute statistics). Must be called after the
    /// last `add_document` and before `search`.
    pub fn finalize(&mut self) {
        let n_docs = self.docs.len().max(1) as f32;

        let mut sum = [0u64; 5];
        for doc in &self.docs {
            for (s, &len) in sum.iter_mut().zip(doc.len_by_field.iter()) {
                *s += len as u64;
            }
        }
        for (avg, &s) in self.avg_len_by_field.iter_mut().zip(sum.iter()) {
            *avg = s as f32 / n_docs;
        }

        self.df.clear();
        for (term, postings) in &self.inv {
            self.df.insert(term.clone(), postings.len() as u32);
        }
    }

    /// Search the index, returning the top `top_k` scoring documents.
    pub fn search(
        &self,
        query: &str,
        weights: &FieldWeights,
        params: Bm25Params,
        top_k: usize,
    ) -> Vec<Bm25SearchResult> {
        let mut scores: HashMap<u32, f32> = HashMap::new();
        let n_docs = self.docs.len().max(1) as f32;
        let field_weights = [
            weights.path,
            weights.ident,
            weights.doc,
            weights.string_lit,
            weights.code,
        ];

        for term in tokenize(query) {
            let term_lower = term.to_ascii_lowercase();
            let Some(postings) = self.inv.get(&term_lower) else {
                continue;
            };

            let df = *self.df.get(&term_lower).unwrap_or(&1) as f32;
            // BM25 IDF: ln((N - df + 0.5) / (df + 0.5) + 1)
            let idf = ((n_docs - df + 0.5) / (df + 0.5) + 1.0).ln();

            for posting in postings {
                let doc = &self.docs[posting.doc_id as usize];

                let mut tf_weighted = 0.0f32;
                for (i, &weight) in field_weights.iter().enumerate() {
                    if posting.tf_by_field[i] > 0 {
                        tf_weighted += weight * posting.tf_by_field[i] as f32;
                    }
                }

                let mut len = 0.0f32;
                let mut avg_len = 0.0f32;
                for (i, &weight) in field_weights.iter().enumerate() {
                    len += weight * doc.len_by_field[i] as f32;
                    avg_len += weight * self.avg_len_by_field[i];
                }

                let norm = 1.0 - params.b + params.b * (len / avg_len.max(1e-6));
                let denom = tf_weighted + params.k1 * norm;
                let score = idf * (tf_weighted * (params.k1 + 1.0)) / denom.max(1e-6);

                *scores.entry(posting.doc_id).or_default() += score;
            }
        }

        let mut results: Vec<_> = scores
            .into_iter()
            .map(|(doc_id, score)| Bm25SearchResult {
                node_id: self.docs[doc_id as usize].node_id.clone(),
                score,
                doc_id,
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.node_id.cmp(&b.node_id))
        });
        results.truncate(top_k);
        results
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Document text for a node id, if indexed.
    pub fn get_text(&self, node_id: &str) -> Option<&str> {
        self.node_to_doc
            .get(node_id)
            .map(|&doc_id| self.docs[doc_id as usize].text.as_str())
    }
}

/// Simple tokenizer for code.
///
/// Splits on non-word characters and handles camelCase/snake_case.
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .filter(|s| !s.is_empty())
        .flat_map(split_identifier)
}

/// Split an identifier into sub-tokens (camelCase, snake_case).
fn split_identifier(s: &str) -> Vec<&str> {
    if s.is_empty() {
        return Vec::new();
    }

    let mut tokens = Vec::new();
    let bytes = s.as_bytes();
    let mut start = 0;

    for i in 1..bytes.len() {
        let prev = bytes[i - 1] as char;
        let curr = bytes[i] as char;

        let boundary = curr == '_' || (prev.is_ascii_lowercase() && curr.is_ascii_uppercase());

        if boundary {
            if start < i && bytes[start] != b'_' {
                tokens.push(&s[start..i]);
            }
            start = if curr == '_' { i + 1 } else { i };
        }
    }

    if start < s.len() && bytes[start] != b'_' {
        tokens.push(&s[start..]);
    }

    if tokens.len() > 1 {
        tokens.push(s);
    }

    tokens
}

/// Extract tokens from a file path.
pub fn path_tokens(path: &Path) -> Vec<String> {
    path.iter()
        .filter_map(|c| c.to_str())
        .flat_map(|s| {
            let base = s.rsplit_once('.').map(|(a, _)| a).unwrap_or(s);
            tokenize(base).map(|t| t.to_lowercase()).collect::<Vec<_>>()
        })
        .collect()
}
