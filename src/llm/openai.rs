use crate::error::{Error, Result};
use crate::llm::{CompletionOptions, CompletionProvider};
use serde::{Deserialize, Serialize};

/// Completion provider for OpenAI-compatible chat-completions APIs
pub struct OpenAiCompletionProvider {
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiCompletionProvider {
    /// Create a new provider
    /// Default URL: https://api.openai.com/v1, default model: gpt-4o-mini
    pub fn new(base_url: Option<&str>, api_key: Option<String>, model: Option<&str>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or("https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: model.unwrap_or("gpt-4o-mini").to_string(),
            temperature: 0.3,
            max_tokens: 1000,
            client: reqwest::Client::new(),
        }
    }

    /// Override sampling temperature and output budget
    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    fn build_request<'a>(
        &'a self,
        prompt: &'a str,
        context: Option<&'a str>,
        options: CompletionOptions,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: Self::build_messages(prompt, context),
            temperature: options.temperature.unwrap_or(self.temperature),
            max_tokens: options.max_tokens.unwrap_or(self.max_tokens),
        }
    }

    fn build_messages<'a>(prompt: &'a str, context: Option<&'a str>) -> Vec<ChatMessage<'a>> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = context {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });
        messages
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait::async_trait]
impl CompletionProvider for OpenAiCompletionProvider {
    async fn complete(&self, prompt: &str, context: Option<&str>) -> Result<String> {
        self.complete_with(prompt, context, CompletionOptions::default())
            .await
    }

    async fn complete_with(
        &self,
        prompt: &str,
        context: Option<&str>,
        options: CompletionOptions,
    ) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = self.build_request(prompt, context, options);

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Completion(format!("Failed to connect to {}: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Completion(format!(
                "Chat API returned error {}: {}",
                status, error_text
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Completion(format!("Failed to parse chat response: {}", e)))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| Error::Completion("Chat API returned no content".to_string()))
    }
}
