//! Ollama API client
//!
//! This module provides a low-level HTTP client for the Ollama generate and
//! embeddings endpoints, implementing both pipeline contracts.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::errors::{Result, TaggerError};
use crate::model::{EmbeddingProvider, GenerativeModel};

/// HTTP client for the Ollama API
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

impl OllamaClient {
    /// Create a new Ollama client
    ///
    /// # Arguments
    /// * `base_url` - Base URL for the Ollama API (default: http://127.0.0.1:11434)
    /// * `model` - Model name (e.g. "llama3.1:8b" or "nomic-embed-text")
    pub fn new(base_url: Option<String>, model: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.unwrap_or_else(|| "http://127.0.0.1:11434".to_string()),
            model,
        }
    }

    /// Run a single non-streaming completion
    ///
    /// Calls POST /api/generate with stream disabled and returns the full
    /// response text.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TaggerError::ModelApi(format!(
                "generate returned {}",
                response.status()
            )));
        }

        let body: GenerateResponse = response.json().await?;
        Ok(body.response)
    }

    /// Check if the Ollama server is reachable
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        self.client
            .get(&url)
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .is_ok()
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl GenerativeModel for OllamaClient {
    async fn invoke(&self, prompt: &str) -> Result<String> {
        self.generate(prompt).await
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    /// Calls POST /api/embeddings with the configured model
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "model": self.model,
                "prompt": text,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TaggerError::Embedding(format!(
                "embeddings returned {}",
                response.status()
            )));
        }

        let body: EmbeddingsResponse = response.json().await?;
        Ok(body.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_default_url() {
        let client = OllamaClient::new(None, "llama3.1:8b".to_string());
        assert_eq!(client.base_url, "http://127.0.0.1:11434");
        assert_eq!(client.model(), "llama3.1:8b");
    }

    #[test]
    fn test_client_custom_url() {
        let client = OllamaClient::new(
            Some("http://localhost:8080".to_string()),
            "llama3.1:8b".to_string(),
        );
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[tokio::test]
    #[ignore] // Requires Ollama running
    async fn test_generate_integration() {
        let client = OllamaClient::new(None, "llama3.1:8b".to_string());
        let text = client.generate("Say hello.").await.unwrap();
        assert!(!text.is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires Ollama running
    async fn test_embed_integration() {
        let client = OllamaClient::new(None, "nomic-embed-text".to_string());
        let embedding = client.embed("we set a curfew").await.unwrap();
        assert!(!embedding.is_empty());
    }
}
