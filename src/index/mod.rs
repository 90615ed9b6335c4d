//! Similarity-search contracts and backends
//!
//! The pipeline core only depends on the [`SimilaritySearch`] trait; any
//! vector store that can return the `k` nearest stored texts for a query
//! plugs in. Two backends ship here: a Qdrant adapter for real corpora and
//! an in-memory lexical index for tests and small corpora.

pub mod memory;
pub mod qdrant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// One nearest-neighbor hit: the stored text plus its similarity score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleHit {
    pub content: String,
    pub score: f32,
}

/// Nearest-neighbor retrieval over embedded text
///
/// Implementations must return hits ordered best-first and never more than
/// `k` of them.
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ExampleHit>>;
}

// Re-export key types
pub use memory::InMemoryIndex;
pub use qdrant::QdrantIndex;
