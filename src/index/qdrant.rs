//! Qdrant-backed similarity index
//!
//! Stores document texts alongside their embeddings in a Qdrant collection
//! and answers nearest-neighbor queries by embedding the query text through
//! an [`EmbeddingProvider`] and searching with cosine similarity.

use std::sync::Arc;

use async_trait::async_trait;
use qdrant_client::{
    client::QdrantClient,
    qdrant::{
        vectors_config::Config, with_payload_selector::SelectorOptions, CreateCollection,
        Distance, PointStruct, SearchPoints, Value as QdrantValue, VectorParams, VectorsConfig,
        WithPayloadSelector,
    },
};
use uuid::Uuid;

use crate::errors::{Result, TaggerError};
use crate::index::{ExampleHit, SimilaritySearch};
use crate::model::EmbeddingProvider;

const DEFAULT_EMBEDDING_DIM: u64 = 768;

/// Similarity index over one Qdrant collection
pub struct QdrantIndex {
    client: QdrantClient,
    collection: String,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl QdrantIndex {
    /// Connect to Qdrant and ensure the collection exists
    ///
    /// # Arguments
    /// * `url` - Qdrant endpoint (e.g. "http://localhost:6334")
    /// * `collection` - Collection name, created with cosine distance if absent
    /// * `embedder` - Provider used to embed both documents and queries
    pub async fn connect(
        url: &str,
        collection: impl Into<String>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        Self::connect_with_dim(url, collection, embedder, DEFAULT_EMBEDDING_DIM).await
    }

    /// Connect with an explicit embedding dimensionality
    pub async fn connect_with_dim(
        url: &str,
        collection: impl Into<String>,
        embedder: Arc<dyn EmbeddingProvider>,
        embedding_dim: u64,
    ) -> Result<Self> {
        let client = QdrantClient::from_url(url)
            .build()
            .map_err(|e| TaggerError::VectorStore(format!("Failed to create client: {}", e)))?;

        let index = Self {
            client,
            collection: collection.into(),
            embedder,
        };
        index.ensure_collection(embedding_dim).await?;

        Ok(index)
    }

    async fn ensure_collection(&self, embedding_dim: u64) -> Result<()> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| TaggerError::VectorStore(format!("Failed to list collections: {}", e)))?;

        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.collection);

        if !exists {
            self.client
                .create_collection(&CreateCollection {
                    collection_name: self.collection.clone(),
                    vectors_config: Some(VectorsConfig {
                        config: Some(Config::Params(VectorParams {
                            size: embedding_dim,
                            distance: Distance::Cosine.into(),
                            ..Default::default()
                        })),
                    }),
                    ..Default::default()
                })
                .await
                .map_err(|e| {
                    TaggerError::VectorStore(format!(
                        "Failed to create collection {}: {}",
                        self.collection, e
                    ))
                })?;
        }

        Ok(())
    }

    /// Embed and upsert a batch of document texts
    pub async fn add_documents(&self, documents: &[String]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let mut points = Vec::with_capacity(documents.len());
        for document in documents {
            let embedding = self.embedder.embed(document).await?;
            let payload: std::collections::HashMap<String, QdrantValue> = [(
                "document".to_string(),
                QdrantValue::from(document.clone()),
            )]
            .into_iter()
            .collect();

            points.push(PointStruct::new(
                Uuid::new_v4().to_string(),
                embedding,
                payload,
            ));
        }

        self.client
            .upsert_points_blocking(&self.collection, None, points, None)
            .await
            .map_err(|e| TaggerError::VectorStore(format!("Failed to upsert points: {}", e)))?;

        Ok(())
    }

    /// Number of stored points
    pub async fn count(&self) -> Result<u64> {
        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(|e| TaggerError::VectorStore(format!("Failed to get collection info: {}", e)))?;

        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0))
    }
}

#[async_trait]
impl SimilaritySearch for QdrantIndex {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ExampleHit>> {
        let embedding = self.embedder.embed(query).await?;

        let search_result = self
            .client
            .search_points(&SearchPoints {
                collection_name: self.collection.clone(),
                vector: embedding,
                limit: k as u64,
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                ..Default::default()
            })
            .await
            .map_err(|e| TaggerError::VectorStore(format!("Failed to search points: {}", e)))?;

        let hits = search_result
            .result
            .into_iter()
            .map(|point| {
                let content = point
                    .payload
                    .get("document")
                    .and_then(qdrant_value_to_string)
                    .unwrap_or_default();

                ExampleHit {
                    content,
                    score: point.score,
                }
            })
            .collect();

        Ok(hits)
    }
}

fn qdrant_value_to_string(value: &QdrantValue) -> Option<String> {
    use qdrant_client::qdrant::value::Kind;
    value.kind.as_ref().and_then(|kind| match kind {
        Kind::StringValue(s) => Some(s.clone()),
        _ => None,
    })
}
