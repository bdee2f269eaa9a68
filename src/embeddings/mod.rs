pub mod r#trait;
pub mod local;
pub mod openai;

pub use local::LocalEmbeddingProvider;
pub use openai::OpenAiEmbeddingProvider;
pub use r#trait::EmbeddingProvider;

use crate::config::{Config, ProviderKind};
use std::sync::Arc;

/// Build the embedding provider selected in the configuration
pub fn from_config(config: &Config) -> Arc<dyn EmbeddingProvider> {
    let settings = &config.embeddings;
    match settings.provider {
        ProviderKind::Openai => Arc::new(OpenAiEmbeddingProvider::new(
            Some(&settings.url),
            config.embeddings_api_key(),
            Some(&settings.model),
            Some(settings.dims),
        )),
        ProviderKind::Ollama => Arc::new(LocalEmbeddingProvider::new(
            Some(&settings.url),
            Some(&settings.model),
            Some(settings.dims),
        )),
    }
}
