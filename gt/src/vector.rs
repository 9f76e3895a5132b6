//! Optional semantic index over frontier tasks
//!
//! Consumed interface only: when no index is wired in, everything that
//! would use it degrades to priority/difficulty ordering. The in-memory
//! implementation exists for tests and single-process use; it embeds text
//! with a deterministic hashed bag-of-words so results are reproducible.

use async_trait::async_trait;
use eyre::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Dimensionality of the toy hashed embedding
const EMBED_DIM: usize = 64;

/// One unit of indexable text
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: String,
    pub text: String,
    pub metadata: Value,
}

/// One query hit
#[derive(Debug, Clone)]
pub struct IndexMatch {
    pub metadata: Value,
    pub score: f32,
}

/// Semantic index over per-project entries
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Replace the indexed entries for a project/path
    async fn index(&self, project: &str, path: &str, entries: Vec<IndexEntry>) -> Result<()>;

    /// Nearest entries to an embedding, best first
    async fn query(&self, project: &str, embedding: &[f32], top_k: usize, min_score: f32) -> Result<Vec<IndexMatch>>;
}

/// Deterministic hashed bag-of-words embedding
pub fn embed(text: &str) -> Vec<f32> {
    let mut dims = vec![0.0f32; EMBED_DIM];
    for word in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        // FNV-1a
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in word.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        dims[(hash % EMBED_DIM as u64) as usize] += 1.0;
    }

    let norm = dims.iter().map(|d| d * d).sum::<f32>().sqrt();
    if norm > 0.0 {
        for d in dims.iter_mut() {
            *d /= norm;
        }
    }
    dims
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// In-memory vector index
#[derive(Default)]
pub struct InMemoryVectorIndex {
    entries: Mutex<HashMap<String, Vec<(IndexEntry, Vec<f32>)>>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(project: &str, path: &str) -> String {
        format!("{}/{}", project, path)
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn index(&self, project: &str, path: &str, entries: Vec<IndexEntry>) -> Result<()> {
        debug!(project, path, count = entries.len(), "index: called");
        let embedded = entries.into_iter().map(|e| {
            let embedding = embed(&e.text);
            (e, embedding)
        });
        self.entries
            .lock()
            .expect("vector index lock poisoned")
            .insert(Self::key(project, path), embedded.collect());
        Ok(())
    }

    async fn query(&self, project: &str, embedding: &[f32], top_k: usize, min_score: f32) -> Result<Vec<IndexMatch>> {
        let entries = self.entries.lock().expect("vector index lock poisoned");

        let mut matches: Vec<IndexMatch> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(&format!("{}/", project)))
            .flat_map(|(_, items)| items.iter())
            .map(|(entry, stored)| IndexMatch {
                metadata: entry.metadata.clone(),
                score: cosine(embedding, stored),
            })
            .filter(|m| m.score >= min_score)
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);
        Ok(matches)
    }
}
