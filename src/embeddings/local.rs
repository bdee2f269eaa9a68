use crate::embeddings::EmbeddingProvider;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Local embedding provider using Ollama API
pub struct LocalEmbeddingProvider {
    base_url: String,
    model: String,
    dimension: usize,
    client: reqwest::Client,
}

impl LocalEmbeddingProvider {
    /// Determine embedding dimension from model name
    pub(crate) fn get_dimension_for_model(model: &str) -> usize {
        match model {
            m if m.contains("mxbai-embed") => 1024,
            m if m.contains("nomic-embed") => 768,
            m if m.contains("all-minilm") => 384,
            _ => 768,
        }
    }

    /// Create a new local embedding provider using Ollama
    /// Uses provided dimension, or derives it from the model name if not provided
    pub fn new(base_url: Option<&str>, model: Option<&str>, dimension: Option<usize>) -> Self {
        let model_name = model.unwrap_or("nomic-embed-text").to_string();
        let dimension = dimension.unwrap_or_else(|| Self::get_dimension_for_model(&model_name));

        Self {
            base_url: base_url
                .unwrap_or("http://127.0.0.1:11434")
                .trim_end_matches('/')
                .to_string(),
            model: model_name,
            dimension,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

#[async_trait::async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    async fn compute_embedding(&self, content: &str) -> Result<Vec<f32>> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::Embedding(
                "Cannot generate embedding for empty content".to_string(),
            ));
        }

        let url = format!("{}/api/embeddings", self.base_url);
        let request = OllamaEmbeddingRequest {
            model: &self.model,
            prompt: content,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to connect to Ollama: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Embedding(format!(
                "Ollama API returned error: {}",
                response.status()
            )));
        }

        let embedding_response: OllamaEmbeddingResponse = response.json().await.map_err(|e| {
            Error::Embedding(format!("Failed to parse Ollama embedding response: {}", e))
        })?;

        if embedding_response.embedding.is_empty() {
            return Err(Error::Embedding(
                "Ollama returned empty embedding (dimension 0)".to_string(),
            ));
        }

        Ok(embedding_response.embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
