//! In-memory lexical similarity index
//!
//! Scores stored texts by case-folded token overlap with the query. Not a
//! substitute for a real embedding index on large corpora, but deterministic
//! and dependency-free, which is exactly what tests and small pilot studies
//! need.

use async_trait::async_trait;

use crate::errors::Result;
use crate::index::{ExampleHit, SimilaritySearch};

/// Lexical nearest-neighbor index over a fixed set of documents
#[derive(Debug, Clone, Default)]
pub struct InMemoryIndex {
    documents: Vec<String>,
}

impl InMemoryIndex {
    pub fn new(documents: Vec<String>) -> Self {
        Self { documents }
    }

    /// Fraction of query tokens that occur in the document, ignoring case
    fn overlap_score(document: &str, query: &str) -> f32 {
        let document_lower = document.to_lowercase();
        let query_lower = query.to_lowercase();

        let query_words: Vec<&str> = query_lower.split_whitespace().collect();
        if query_words.is_empty() {
            return 0.0;
        }

        let matches = query_words
            .iter()
            .filter(|word| document_lower.contains(*word))
            .count();

        matches as f32 / query_words.len() as f32
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl SimilaritySearch for InMemoryIndex {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ExampleHit>> {
        let mut hits: Vec<ExampleHit> = self
            .documents
            .iter()
            .map(|doc| ExampleHit {
                content: doc.clone(),
                score: Self::overlap_score(doc, query),
            })
            .collect();

        // Stable sort keeps insertion order among equal scores, so results
        // are deterministic for a fixed document list
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        Ok(hits)
    }
}
