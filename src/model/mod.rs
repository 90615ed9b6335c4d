//! Generative model and embedding contracts
//!
//! The pipeline depends only on these narrow traits; the shipped
//! [`client::OllamaClient`] implements both over HTTP, and tests substitute
//! scripted fakes.

pub mod client;

use async_trait::async_trait;

use crate::errors::Result;

/// A generative language model consumed as a black box
///
/// One prompt in, raw text out. No retry or backoff lives behind this
/// trait; the pipeline applies its own per-call timeout.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<String>;
}

/// Text embedding service backing the vector indexes
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

// Re-export key types
pub use client::OllamaClient;
