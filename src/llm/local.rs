use crate::error::{Error, Result};
use crate::llm::{CompletionOptions, CompletionProvider};
use serde::{Deserialize, Serialize};

/// Local completion provider using the Ollama generate API
pub struct LocalCompletionProvider {
    base_url: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    client: reqwest::Client,
}

impl LocalCompletionProvider {
    /// Create a new local provider
    /// Default URL: http://127.0.0.1:11434, default model: llama3.1
    pub fn new(base_url: Option<&str>, model: Option<&str>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or("http://127.0.0.1:11434")
                .trim_end_matches('/')
                .to_string(),
            model: model.unwrap_or("llama3.1").to_string(),
            temperature: None,
            max_tokens: None,
            client: reqwest::Client::new(),
        }
    }

    /// Set sampling temperature and output budget (`num_predict`)
    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = Some(temperature);
        self.max_tokens = Some(max_tokens);
        self
    }

    fn build_request<'a>(
        &'a self,
        prompt: &'a str,
        context: Option<&'a str>,
        options: CompletionOptions,
    ) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.model,
            prompt,
            system: context,
            stream: false,
            options: GenerateOptions {
                temperature: options.temperature.or(self.temperature),
                num_predict: options.max_tokens.or(self.max_tokens),
            },
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait::async_trait]
impl CompletionProvider for LocalCompletionProvider {
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
        let url = format!("{}/api/generate", self.base_url);
        let request = self.build_request(prompt, context, options);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Completion(format!("Failed to connect to Ollama: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Completion(format!(
                "Ollama API returned error: {}",
                response.status()
            )));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Completion(format!("Failed to parse Ollama response: {}", e)))?;

        if generated.response.trim().is_empty() {
            return Err(Error::Completion("Ollama returned an empty response".to_string()));
        }

        Ok(generated.response)
    }
}
