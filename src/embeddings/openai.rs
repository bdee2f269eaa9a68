use crate::embeddings::EmbeddingProvider;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Embedding provider for OpenAI-compatible `/embeddings` endpoints
pub struct OpenAiEmbeddingProvider {
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
    client: reqwest::Client,
}

impl OpenAiEmbeddingProvider {
    /// Create a new provider
    /// Default URL: https://api.openai.com/v1, default model: text-embedding-3-small
    pub fn new(
        base_url: Option<&str>,
        api_key: Option<String>,
        model: Option<&str>,
        dimension: Option<usize>,
    ) -> Self {
        Self {
            base_url: base_url
                .unwrap_or("https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: model.unwrap_or("text-embedding-3-small").to_string(),
            dimension: dimension.unwrap_or(1536),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn compute_embedding(&self, content: &str) -> Result<Vec<f32>> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::Embedding(
                "Cannot generate embedding for empty content".to_string(),
            ));
        }

        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            input: [content],
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to connect to {}: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "Embeddings API returned error {}: {}",
                status, error_text
            )));
        }

        let embedding_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse embedding response: {}", e)))?;

        let embedding = embedding_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .unwrap_or_default();

        if embedding.is_empty() {
            return Err(Error::Embedding(
                "Embeddings API returned an empty vector".to_string(),
            ));
        }

        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
