pub mod r#trait;
pub mod local;
pub mod openai;

pub use local::LocalCompletionProvider;
pub use openai::OpenAiCompletionProvider;
pub use r#trait::{CompletionOptions, CompletionProvider};

use crate::config::{Config, ProviderKind};
use std::sync::Arc;

/// Build the completion provider selected in the configuration
pub fn from_config(config: &Config) -> Arc<dyn CompletionProvider> {
    let settings = &config.llm;
    match settings.provider {
        ProviderKind::Openai => Arc::new(
            OpenAiCompletionProvider::new(Some(&settings.url), config.llm_api_key(), Some(&settings.model))
                .with_sampling(settings.temperature, settings.max_tokens),
        ),
        ProviderKind::Ollama => Arc::new(
            LocalCompletionProvider::new(Some(&settings.url), Some(&settings.model))
                .with_sampling(settings.temperature, settings.max_tokens),
        ),
    }
}
