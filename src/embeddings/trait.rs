use crate::error::{Error, Result};

/// Trait for embedding providers that can compute semantic vectors from text
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute embedding vector from text content
    async fn compute_embedding(&self, content: &str) -> Result<Vec<f32>>;

    /// Get the dimension of embeddings produced by this provider
    fn dimension(&self) -> usize;

    /// Compute an embedding and reject vectors of the wrong dimension or
    /// containing NaN or infinite components
    ///
    /// The index only accepts finite vectors of one fixed dimension, so both
    /// the indexer and the router go through this method rather than trusting
    /// the provider's output.
    async fn compute_checked_embedding(&self, content: &str) -> Result<Vec<f32>> {
        let embedding = self.compute_embedding(content).await?;
        let expected = self.dimension();
        if embedding.len() != expected {
            return Err(Error::DimensionMismatch {
                got: embedding.len(),
                expected,
            });
        }
        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(Error::Embedding(
                "provider returned a non-finite embedding component".to_string(),
            ));
        }
        Ok(embedding)
    }
}
