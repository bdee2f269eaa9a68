use crate::error::Result;

/// Per-call sampling overrides; `None` keeps the provider's configured value
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Trait for language-model providers that turn a prompt into text
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Complete `prompt`, with `context` supplied as system instructions
    async fn complete(&self, prompt: &str, context: Option<&str>) -> Result<String>;

    /// Complete with sampling overrides
    ///
    /// Providers without sampling controls ignore `options`.
    async fn complete_with(
        &self,
        prompt: &str,
        context: Option<&str>,
        _options: CompletionOptions,
    ) -> Result<String> {
        self.complete(prompt, context).await
    }
}
